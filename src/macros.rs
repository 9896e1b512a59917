//! The macro table and `#define` parsing.

use crate::error::ResolveError;
use crate::lexer::{render_tokens, Token, TokenType};
use crate::source::{SourceId, SourceMap};
use log::{debug, warn};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MacroDefinition {
    pub name: String,
    /// `Some` for parameterized macros, even when the list is empty (`F()`).
    pub params: Option<Vec<String>>,
    pub body: Vec<Token>,
    pub source: SourceId,
    pub line: usize,
}

impl MacroDefinition {
    /// An object-like macro, as created by `-D NAME=VALUE`.
    pub fn object(name: impl Into<String>, body: Vec<Token>) -> Self {
        let (source, line) = body.first().map_or((SourceId::default(), 1), |t| (t.source, t.line));
        MacroDefinition {
            name: name.into(),
            params: None,
            body,
            source,
            line,
        }
    }

    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.as_ref()?.iter().position(|p| p == name)
    }

    pub fn replacement_text(&self) -> String {
        render_tokens(&self.body)
    }

    fn same_as(&self, other: &MacroDefinition) -> bool {
        self.params == other.params
            && self.body.len() == other.body.len()
            && self
                .body
                .iter()
                .zip(&other.body)
                .all(|(a, b)| a.text == b.text && (a.space_before == b.space_before))
    }
}

/// Name → definition, scoped to one resolution.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroDefinition>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a definition. A redefinition silently replaces the previous one; it is only
    /// logged when the replacement text actually changes.
    pub fn define(&mut self, definition: MacroDefinition) -> Option<MacroDefinition> {
        debug!(
            "define {} = `{}`",
            definition.name,
            definition.replacement_text()
        );
        let previous = self.macros.insert(definition.name.clone(), definition);
        if let Some(prev) = &previous {
            if let Some(current) = self.macros.get(&prev.name) {
                if !prev.same_as(current) {
                    warn!(
                        "macro `{}` redefined (was `{}`, now `{}`)",
                        prev.name,
                        prev.replacement_text(),
                        current.replacement_text()
                    );
                }
            }
        }
        previous
    }

    /// Removes a definition; undefining an unknown name is a no-op.
    pub fn undefine(&mut self, name: &str) -> Option<MacroDefinition> {
        debug!("undef {}", name);
        self.macros.remove(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.macros.get(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Defined names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parses the tokens of a `#define` line (everything after the `define` keyword).
///
/// `directive` is the `define` keyword itself and is used to report a missing name.
///
/// # Errors
/// Returns `ResolveError::Directive` for a missing or non-identifier name, a malformed
/// parameter list, a `#` not followed by a parameter, or a `##` at either end of the body.
pub fn parse_define(
    line: &[Token],
    directive: &Token,
    sources: &SourceMap,
) -> Result<MacroDefinition, ResolveError> {
    let Some(name_token) = line.first() else {
        return Err(ResolveError::directive(
            sources.snippet(directive),
            "#define needs a macro name",
        ));
    };
    let Some(name) = name_token.ident() else {
        return Err(ResolveError::directive(
            sources.snippet(name_token),
            "macro name must be an identifier",
        ));
    };
    if name == "defined" {
        return Err(ResolveError::directive(
            sources.snippet(name_token),
            "`defined` cannot be used as a macro name",
        ));
    }

    let mut rest = &line[1..];
    let mut params = None;
    // Only a parenthesis glued to the name starts a parameter list.
    if let Some(open) = rest.first() {
        if open.ttype == TokenType::LParen && !open.space_before {
            let (list, consumed) = parse_params(rest, open, sources)?;
            params = Some(list);
            rest = &rest[consumed..];
        }
    }

    let mut body: Vec<Token> = rest.to_vec();
    if let Some(first) = body.first_mut() {
        first.space_before = false;
        first.line_start = false;
    }

    let definition = MacroDefinition {
        name: name.to_string(),
        params,
        body,
        source: name_token.source,
        line: name_token.line,
    };
    check_operators(&definition, sources)?;
    Ok(definition)
}

fn parse_params(
    tokens: &[Token],
    open: &Token,
    sources: &SourceMap,
) -> Result<(Vec<String>, usize), ResolveError> {
    let mut params: Vec<String> = Vec::new();
    let mut i = 1;
    if tokens.get(i).map(|t| &t.ttype) == Some(&TokenType::RParen) {
        return Ok((params, i + 1));
    }
    loop {
        let Some(token) = tokens.get(i) else {
            return Err(ResolveError::directive(
                sources.snippet(open),
                "unterminated macro parameter list",
            ));
        };
        let Some(param) = token.ident() else {
            return Err(ResolveError::directive(
                sources.snippet(token),
                "expected a parameter name",
            ));
        };
        if params.iter().any(|p| p == param) {
            return Err(ResolveError::directive(
                sources.snippet(token),
                format!("duplicate macro parameter `{}`", param),
            ));
        }
        params.push(param.to_string());
        i += 1;
        match tokens.get(i).map(|t| &t.ttype) {
            Some(TokenType::Comma) => i += 1,
            Some(TokenType::RParen) => return Ok((params, i + 1)),
            Some(_) => {
                return Err(ResolveError::directive(
                    sources.snippet(&tokens[i]),
                    "expected `,` or `)` in macro parameter list",
                ))
            }
            None => {
                return Err(ResolveError::directive(
                    sources.snippet(open),
                    "unterminated macro parameter list",
                ))
            }
        }
    }
}

fn check_operators(definition: &MacroDefinition, sources: &SourceMap) -> Result<(), ResolveError> {
    let body = &definition.body;
    if let Some(first) = body.first() {
        if first.ttype == TokenType::HashHash {
            return Err(ResolveError::directive(
                sources.snippet(first),
                "`##` cannot appear at the start of a macro body",
            ));
        }
    }
    if let Some(last) = body.last() {
        if last.ttype == TokenType::HashHash {
            return Err(ResolveError::directive(
                sources.snippet(last),
                "`##` cannot appear at the end of a macro body",
            ));
        }
    }
    if definition.is_function_like() {
        for (i, token) in body.iter().enumerate() {
            if token.ttype != TokenType::Hash {
                continue;
            }
            let operand = body
                .get(i + 1)
                .and_then(|t| t.ident())
                .and_then(|name| definition.param_index(name));
            if operand.is_none() {
                return Err(ResolveError::directive(
                    sources.snippet(token),
                    "`#` must be followed by a macro parameter",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn define(text: &str) -> Result<MacroDefinition, ResolveError> {
        let mut sources = SourceMap::new();
        let id = sources.add("test.js", None, text.to_string());
        let tokens: Vec<Token> = Lexer::new_with_name(text, id, "test.js")
            .lex()
            .unwrap()
            .into_iter()
            .filter(|t| !t.is_comment() && !t.is_eof())
            .collect();
        parse_define(&tokens[1..], &tokens[0], &sources)
    }

    #[test]
    fn test_object_like() {
        let def = define("define FMT clm").unwrap();
        assert_eq!(def.name, "FMT");
        assert!(!def.is_function_like());
        assert_eq!(def.replacement_text(), "clm");
    }

    #[test]
    fn test_function_like_requires_glued_paren() {
        let def = define("define mkstr(s) xstr(s)").unwrap();
        assert_eq!(def.params, Some(vec!["s".to_string()]));
        assert_eq!(def.replacement_text(), "xstr(s)");

        let def = define("define PAIR (a, b)").unwrap();
        assert!(!def.is_function_like());
        assert_eq!(def.replacement_text(), "(a, b)");
    }

    #[test]
    fn test_empty_parameter_list_and_body() {
        let def = define("define F()").unwrap();
        assert_eq!(def.params, Some(vec![]));
        assert!(def.body.is_empty());
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(matches!(define("define"), Err(ResolveError::Directive { .. })));
        assert!(matches!(define("define 12 x"), Err(ResolveError::Directive { .. })));
        assert!(matches!(define("define F(a, a) a"), Err(ResolveError::Directive { .. })));
        assert!(matches!(define("define F(a b) a"), Err(ResolveError::Directive { .. })));
        assert!(matches!(define("define F(a"), Err(ResolveError::Directive { .. })));
        assert!(matches!(define("define F(a) #b"), Err(ResolveError::Directive { .. })));
        assert!(matches!(define("define A ## b"), Err(ResolveError::Directive { .. })));
        assert!(matches!(define("define A b ##"), Err(ResolveError::Directive { .. })));
    }

    #[test]
    fn test_table_last_definition_wins() {
        let mut table = MacroTable::new();
        table.define(define("define A 1").unwrap());
        let previous = table.define(define("define A 2").unwrap());
        assert_eq!(previous.unwrap().replacement_text(), "1");
        assert_eq!(table.get("A").unwrap().replacement_text(), "2");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_undefine_unknown_is_noop() {
        let mut table = MacroTable::new();
        assert!(table.undefine("MISSING").is_none());
        table.define(define("define B x").unwrap());
        table.define(define("define A y").unwrap());
        assert_eq!(table.names(), vec!["A", "B"]);
        assert!(table.undefine("A").is_some());
        assert!(!table.is_defined("A"));
    }
}

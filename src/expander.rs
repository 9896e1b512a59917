//! Directive execution and macro expansion.
//!
//! The expander walks one file's tokens, runs the directives it meets, drops inactive
//! branches, splices included files in place and expands macro invocations in the text
//! that remains. Expansion follows the C model: every produced token carries the names
//! of the macros it came from (its hide set), the result of an invocation is rescanned
//! together with the rest of the input, and meeting a name from its own hide set is an
//! error instead of a silent stop.

use crate::conditional::{evaluate, replace_defined, ConditionalStack};
use crate::config::{PreDefinition, ResolveOptions};
use crate::error::ResolveError;
use crate::include::{tokenize, IncludeSpec, IncludedFile, InclusionContext};
use crate::lexer::{quote_string, render_tokens, Lexer, Token, TokenType};
use crate::macros::{parse_define, MacroDefinition, MacroTable};
use crate::source::{SourceId, SourceMap};
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::path::Path;

pub const MAX_INCLUDE_DEPTH: usize = 200;

pub struct Expander {
    pub sources: SourceMap,
    pub macros: MacroTable,
    pub includes: InclusionContext,
    max_depth: usize,
}

impl Expander {
    pub fn new(options: &ResolveOptions) -> Self {
        Expander {
            sources: SourceMap::new(),
            macros: MacroTable::new(),
            includes: InclusionContext::new(options.search_dirs.clone()),
            max_depth: options.max_expansion_depth,
        }
    }

    /// Installs `-D` style definitions before any file is read.
    pub fn predefine(&mut self, definitions: &[PreDefinition]) -> Result<(), ResolveError> {
        for definition in definitions {
            let id = self.sources.add("<command line>", None, definition.value.clone());
            let body: Vec<Token> = tokenize(id, &self.sources)?
                .into_iter()
                .filter(|t| !t.is_comment() && !t.is_eof())
                .collect();
            self.macros.define(MacroDefinition::object(&definition.name, body));
        }
        Ok(())
    }

    /// Expands the root template at `path` into a directive-free stream ending in `Eof`.
    pub fn expand_root(&mut self, path: &Path) -> Result<Vec<Token>, ResolveError> {
        let root = self.includes.open_root(path, &mut self.sources)?;
        self.expand_file(root)
    }

    /// Same as [`Expander::expand_root`] for in-memory text. Relative includes are looked
    /// up from the current directory.
    pub fn expand_str(&mut self, name: &str, text: &str) -> Result<Vec<Token>, ResolveError> {
        let id = self.sources.add(name, None, text.to_string());
        let tokens = tokenize(id, &self.sources)?;
        self.expand_file(IncludedFile {
            id,
            path: name.into(),
            tokens,
        })
    }

    fn expand_file(&mut self, root: IncludedFile) -> Result<Vec<Token>, ResolveError> {
        let id = root.id;
        let mut out = Vec::new();
        self.includes.enter(root.path, self.sources.name(id).to_string());
        let result = self.process_file(root.tokens, &mut out);
        self.includes.leave();
        result?;
        out.push(self.end_of(id));
        Ok(out)
    }

    fn end_of(&self, id: SourceId) -> Token {
        let end = self.sources.text(id).len();
        let mut eof = Token::new(TokenType::Eof, "", id);
        eof.pos_start = end;
        eof.pos_end = end;
        eof.line = crate::utils::get_line_and_column(self.sources.text(id), end).0;
        eof
    }

    fn process_file(&mut self, tokens: Vec<Token>, out: &mut Vec<Token>) -> Result<(), ResolveError> {
        let tokens: Vec<Token> = tokens.into_iter().filter(|t| !t.is_comment()).collect();
        let mut stack = ConditionalStack::new();
        let mut pending: Vec<Token> = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if token.is_eof() {
                break;
            }
            if token.ttype == TokenType::Hash && token.line_start {
                let end = tokens[i + 1..]
                    .iter()
                    .position(|t| t.line_start || t.is_eof())
                    .map_or(tokens.len(), |p| i + 1 + p);
                if !pending.is_empty() {
                    out.extend(self.expand(&pending, 0)?);
                    pending.clear();
                }
                self.handle_directive(token, &tokens[i + 1..end], &mut stack, out)?;
                i = end;
                continue;
            }
            if stack.is_active() {
                pending.push(token.clone());
            }
            i += 1;
        }
        if !pending.is_empty() {
            out.extend(self.expand(&pending, 0)?);
        }
        stack.finish(&self.sources)
    }

    fn handle_directive(
        &mut self,
        hash: &Token,
        line: &[Token],
        stack: &mut ConditionalStack,
        out: &mut Vec<Token>,
    ) -> Result<(), ResolveError> {
        // The null directive.
        let Some(keyword) = line.first() else {
            return Ok(());
        };
        let args = &line[1..];
        let Some(name) = keyword.ident() else {
            if stack.is_active() {
                return Err(ResolveError::directive(
                    self.sources.snippet(keyword),
                    "expected a directive name after `#`",
                ));
            }
            return Ok(());
        };

        match name {
            "ifdef" | "ifndef" => {
                let negate = name == "ifndef";
                stack.push(keyword.clone(), || {
                    let target = self.directive_identifier(keyword, args)?;
                    Ok(self.macros.is_defined(target) != negate)
                })
            }
            "if" => stack.push(keyword.clone(), || self.evaluate_condition(args, keyword)),
            "elif" => stack.enter_elif(keyword, &self.sources, || {
                self.evaluate_condition(args, keyword)
            }),
            "else" => {
                self.warn_extra(keyword, args);
                stack.enter_else(keyword, &self.sources)
            }
            "endif" => {
                self.warn_extra(keyword, args);
                stack.pop(keyword, &self.sources).map(|_| ())
            }
            _ if !stack.is_active() => Ok(()),
            "define" => {
                let definition = parse_define(args, keyword, &self.sources)?;
                self.macros.define(definition);
                Ok(())
            }
            "undef" => {
                let target = self.directive_identifier(keyword, args)?.to_string();
                self.warn_extra(keyword, &args[1..]);
                self.macros.undefine(&target);
                Ok(())
            }
            "include" => self.include(hash, keyword, args, out),
            other => Err(ResolveError::directive(
                self.sources.snippet(keyword),
                format!("unknown directive `#{}`", other),
            )),
        }
    }

    fn directive_identifier<'t>(&self, keyword: &Token, args: &'t [Token]) -> Result<&'t str, ResolveError> {
        match args.first() {
            Some(token) => token.ident().ok_or_else(|| {
                ResolveError::directive(self.sources.snippet(token), "macro name must be an identifier")
            }),
            None => Err(ResolveError::directive(
                self.sources.snippet(keyword),
                format!("#{} needs a macro name", keyword.text),
            )),
        }
    }

    fn warn_extra(&self, keyword: &Token, extra: &[Token]) {
        if let Some(first) = extra.first() {
            warn!(
                "{}:{}: extra tokens after #{} ignored",
                self.sources.name(first.source),
                first.line,
                keyword.text
            );
        }
    }

    fn include(
        &mut self,
        hash: &Token,
        keyword: &Token,
        args: &[Token],
        out: &mut Vec<Token>,
    ) -> Result<(), ResolveError> {
        let spec = match parse_include_operand(args) {
            Some(spec) => spec,
            None => {
                // Computed include: the operand is macro-expanded once and must then
                // take one of the two literal forms.
                let expanded = self.expand(args, 0)?;
                parse_include_operand(&expanded).ok_or_else(|| {
                    ResolveError::directive(
                        self.sources.snippet(args.first().unwrap_or(keyword)),
                        "#include expects \"FILE\" or <FILE>",
                    )
                })?
            }
        };
        if self.includes.depth() >= MAX_INCLUDE_DEPTH {
            return Err(ResolveError::directive(
                self.sources.snippet(keyword),
                "#include nested too deeply",
            ));
        }

        let file = self.includes.resolve(&spec, hash, &mut self.sources)?;
        let name = self.sources.name(file.id).to_string();
        self.includes.enter(file.path, name);
        let result = self.process_file(file.tokens, out);
        self.includes.leave();
        result
    }

    /// Evaluates the expression of `#if`/`#elif`.
    pub fn evaluate_condition(&self, expr: &[Token], at: &Token) -> Result<bool, ResolveError> {
        let replaced = replace_defined(expr, &self.macros, &self.sources)?;
        let mut input: VecDeque<Token> = replaced.into();
        let mut flat = Vec::new();

        while let Some(token) = input.pop_front() {
            let definition = token.ident().and_then(|name| self.macros.get(name));
            let Some(definition) = definition else {
                flat.push(token);
                continue;
            };
            let invoked = !definition.is_function_like()
                || input.front().is_some_and(|t| t.ttype == TokenType::LParen);
            if !invoked {
                flat.push(token);
                continue;
            }

            let mut call = vec![token.clone()];
            if definition.is_function_like() {
                call.extend(take_parenthesized(&mut input));
            }
            let expansion = self.expand(&call, 0)?;
            let integral = !expansion.is_empty() && expansion.iter().all(is_integer_expression_token);
            if !integral {
                return Err(ResolveError::non_integer(
                    self.sources.snippet(&token),
                    definition.name.clone(),
                    render_tokens(&expansion),
                ));
            }
            flat.extend(expansion);
        }

        let value = evaluate(&flat, at, &self.sources)?;
        debug!(
            "{}:{}: #{} {} => {}",
            self.sources.name(at.source),
            at.line,
            at.text,
            render_tokens(expr),
            value
        );
        Ok(value != 0)
    }

    /// Fully macro-expands a token sequence with the table as it currently stands.
    pub fn expand(&self, tokens: &[Token], depth: usize) -> Result<Vec<Token>, ResolveError> {
        let mut input: VecDeque<Token> = tokens.iter().cloned().collect();
        let mut out = Vec::with_capacity(tokens.len());

        while let Some(mut token) = input.pop_front() {
            if token.painted {
                out.push(token);
                continue;
            }
            let definition = token.ident().and_then(|name| self.macros.get(name));
            let Some(definition) = definition else {
                out.push(token);
                continue;
            };
            // A parameterized macro without an argument list is a plain identifier.
            if definition.is_function_like()
                && !input.front().is_some_and(|t| t.ttype == TokenType::LParen)
            {
                out.push(token);
                continue;
            }
            if token.is_hidden(&definition.name) {
                // An object-like macro naming itself in its own body stays an identifier.
                if !definition.is_function_like() && token.hide_set.last() == Some(&definition.name) {
                    token.painted = true;
                    out.push(token);
                    continue;
                }
                let mut chain = token.hide_set.clone();
                chain.push(definition.name.clone());
                return Err(ResolveError::recursive(
                    self.sources.snippet(&token),
                    definition.name.clone(),
                    chain,
                ));
            }
            if token.hide_set.len() >= self.max_depth || depth >= self.max_depth {
                return Err(ResolveError::macro_error(
                    self.sources.snippet(&token),
                    format!("expansion of `{}` exceeds the maximum depth of {}", definition.name, self.max_depth),
                ));
            }

            let args = if definition.is_function_like() {
                Some(self.collect_arguments(definition, &token, &mut input)?)
            } else {
                None
            };
            let expansion = self.instantiate(definition, &token, args, depth)?;
            trace!(
                "expand {} -> `{}`",
                definition.name,
                render_tokens(&expansion)
            );
            for t in expansion.into_iter().rev() {
                input.push_front(t);
            }
        }
        Ok(out)
    }

    /// Consumes `( ... )` after a macro name and splits it at top-level commas.
    fn collect_arguments(
        &self,
        definition: &MacroDefinition,
        invocation: &Token,
        input: &mut VecDeque<Token>,
    ) -> Result<Vec<Vec<Token>>, ResolveError> {
        input.pop_front(); // '('
        let mut args: Vec<Vec<Token>> = vec![Vec::new()];
        let mut level = 0usize;
        loop {
            let Some(token) = input.pop_front() else {
                return Err(ResolveError::macro_error(
                    self.sources.snippet(invocation),
                    format!("unterminated argument list invoking macro `{}`", definition.name),
                ));
            };
            match token.ttype {
                TokenType::LParen => level += 1,
                TokenType::RParen if level == 0 => break,
                TokenType::RParen => level -= 1,
                TokenType::Comma if level == 0 => {
                    args.push(Vec::new());
                    continue;
                }
                _ => {}
            }
            if let Some(current) = args.last_mut() {
                current.push(token);
            }
        }

        let expected = definition.params.as_ref().map_or(0, Vec::len);
        if expected == 0 && args.len() == 1 && args[0].is_empty() {
            return Ok(Vec::new());
        }
        if args.len() != expected {
            return Err(ResolveError::macro_error(
                self.sources.snippet(invocation),
                format!(
                    "macro `{}` expects {} argument(s), got {}",
                    definition.name,
                    expected,
                    args.len()
                ),
            ));
        }
        Ok(args)
    }

    /// Builds the replacement list of one invocation: parameters substituted, `#` and `##`
    /// applied, every token marked with the invocation's hide set plus the macro name.
    fn instantiate(
        &self,
        definition: &MacroDefinition,
        invocation: &Token,
        args: Option<Vec<Vec<Token>>>,
        depth: usize,
    ) -> Result<Vec<Token>, ResolveError> {
        let args = args.unwrap_or_default();
        let body = &definition.body;
        let param_of = |t: &Token| t.ident().and_then(|n| definition.param_index(n));
        let mut result: Vec<Token> = Vec::with_capacity(body.len());
        // Set when the left operand of a following `##` was an empty argument.
        let mut placemarker = false;

        let mut i = 0;
        while i < body.len() {
            let token = &body[i];

            if definition.is_function_like() && token.ttype == TokenType::Hash {
                if let Some(p) = body.get(i + 1).and_then(|t| param_of(t)) {
                    let expanded = self.expand(&args[p], depth + 1)?;
                    let mut string = stringify(&expanded, invocation);
                    string.space_before = token.space_before;
                    result.push(string);
                    i += 2;
                    continue;
                }
            }

            if token.ttype == TokenType::HashHash {
                let Some(right) = body.get(i + 1) else {
                    break;
                };
                let mut right_tokens: Vec<Token> = match param_of(right) {
                    Some(p) => args[p].clone(),
                    None => vec![right.clone().located_at(invocation)],
                };
                // `x ## <empty>` leaves x alone.
                if placemarker {
                    if let Some(first) = right_tokens.first_mut() {
                        first.space_before = body[i - 1].space_before;
                    }
                    result.extend(right_tokens);
                } else if !right_tokens.is_empty() {
                    let first = right_tokens.remove(0);
                    match result.pop() {
                        Some(left) => result.push(self.paste(&left, &first, invocation)?),
                        None => result.push(first),
                    }
                    result.extend(right_tokens);
                }
                placemarker = false;
                i += 2;
                continue;
            }

            if let Some(p) = param_of(token) {
                let next_is_paste = body.get(i + 1).is_some_and(|t| t.ttype == TokenType::HashHash);
                let pasted = next_is_paste || (i > 0 && body[i - 1].ttype == TokenType::HashHash);
                let mut substituted = if pasted {
                    args[p].clone()
                } else {
                    self.expand(&args[p], depth + 1)?
                };
                placemarker = next_is_paste && substituted.is_empty();
                if let Some(first) = substituted.first_mut() {
                    first.space_before = token.space_before;
                }
                result.extend(substituted);
                i += 1;
                continue;
            }

            result.push(token.clone().located_at(invocation));
            i += 1;
        }

        for (n, token) in result.iter_mut().enumerate() {
            for name in &invocation.hide_set {
                if !token.is_hidden(name) {
                    token.hide_set.push(name.clone());
                }
            }
            if !token.is_hidden(&definition.name) {
                token.hide_set.push(definition.name.clone());
            }
            token.line_start = false;
            if n == 0 {
                token.space_before = invocation.space_before;
            }
        }
        Ok(result)
    }

    fn paste(&self, left: &Token, right: &Token, invocation: &Token) -> Result<Token, ResolveError> {
        let text = format!("{}{}", left.text, right.text);
        let invalid = || {
            ResolveError::macro_error(
                self.sources.snippet(invocation),
                format!(
                    "pasting `{}` and `{}` does not give a valid token",
                    left.text, right.text
                ),
            )
        };
        let mut tokens = Lexer::new(&text).lex().map_err(|_| invalid())?;
        tokens.retain(|t| !t.is_eof());
        if tokens.len() != 1 || tokens[0].is_comment() {
            return Err(invalid());
        }
        let mut pasted = tokens.remove(0).located_at(invocation);
        pasted.space_before = left.space_before;
        pasted.hide_set = left.hide_set.clone();
        for name in &right.hide_set {
            if !pasted.is_hidden(name) {
                pasted.hide_set.push(name.clone());
            }
        }
        Ok(pasted)
    }
}

/// `#arg`: the expanded argument rendered as a single string literal.
pub fn stringify(tokens: &[Token], at: &Token) -> Token {
    let value = render_tokens(tokens);
    Token::new(TokenType::String(value.clone()), quote_string(&value), at.source).located_at(at)
}

/// Recognizes `"file"` and `<file>` operands.
fn parse_include_operand(args: &[Token]) -> Option<IncludeSpec> {
    let first = args.first()?;
    match &first.ttype {
        TokenType::String(path) => Some(IncludeSpec {
            path: path.clone(),
            angled: false,
        }),
        TokenType::Lt => {
            let close = args.iter().position(|t| t.ttype == TokenType::Gt)?;
            let path = render_tokens(&args[1..close]);
            if path.is_empty() {
                return None;
            }
            Some(IncludeSpec { path, angled: true })
        }
        _ => None,
    }
}

/// Removes a balanced `( ... )` group from the front of `input`.
fn take_parenthesized(input: &mut VecDeque<Token>) -> Vec<Token> {
    let mut taken = Vec::new();
    let mut level = 0usize;
    while let Some(token) = input.pop_front() {
        match token.ttype {
            TokenType::LParen => level += 1,
            TokenType::RParen => level = level.saturating_sub(1),
            _ => {}
        }
        taken.push(token);
        if level == 0 {
            break;
        }
    }
    taken
}

fn is_integer_expression_token(token: &Token) -> bool {
    match &token.ttype {
        TokenType::Number(spelling) => crate::conditional::parse_integer(spelling).is_some(),
        TokenType::LParen
        | TokenType::RParen
        | TokenType::Plus
        | TokenType::Minus
        | TokenType::Star
        | TokenType::Slash
        | TokenType::Percent
        | TokenType::Bang
        | TokenType::EqEq
        | TokenType::NotEq
        | TokenType::AndAnd
        | TokenType::OrOr
        | TokenType::Lt
        | TokenType::LtEq
        | TokenType::Gt
        | TokenType::GtEq => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(text: &str) -> Result<String, ResolveError> {
        let mut expander = Expander::new(&ResolveOptions::default());
        let tokens = expander.expand_str("test.js", text)?;
        Ok(render_tokens(&tokens[..tokens.len() - 1]))
    }

    #[test]
    fn test_object_like_macro() {
        assert_eq!(expand("#define FMT clm\n\"fmt\": FMT").unwrap(), "\"fmt\": clm");
    }

    #[test]
    fn test_define_only_affects_later_text() {
        assert_eq!(expand("A\n#define A 1\nA").unwrap(), "A 1");
    }

    #[test]
    fn test_undef() {
        assert_eq!(expand("#define A 1\n#undef A\nA\n#undef NEVER").unwrap(), "A");
    }

    #[test]
    fn test_function_like_macro() {
        let out = expand("#define PAIR(k, v) k: v\n{ PAIR(\"a\", (1, 2)) }").unwrap();
        assert_eq!(out, "{ \"a\": (1, 2) }");
    }

    #[test]
    fn test_function_like_without_parens_stays() {
        assert_eq!(expand("#define F(x) x\nF, F(1)").unwrap(), "F, 1");
    }

    #[test]
    fn test_object_macro_naming_function_macro() {
        let out = expand("#define G(x) [x]\n#define H G\nH(3)").unwrap();
        assert_eq!(out, "[3]");
    }

    #[test]
    fn test_stringify_uses_expanded_argument() {
        let text = "#define xstr(s) #s\n#define mkstr(s) xstr(s)\n#define P a/b\nmkstr(P) xstr(P)";
        assert_eq!(expand(text).unwrap(), "\"a/b\" \"a/b\"");
    }

    #[test]
    fn test_stringify_keeps_spacing() {
        let text = "#define S(x) #x\nS(output / pft_harvest.grid.bin) S(\"q\")";
        assert_eq!(
            expand(text).unwrap(),
            r#""output / pft_harvest.grid.bin" "\"q\"""#
        );
    }

    #[test]
    fn test_token_paste() {
        let text = "#define CAT(a, b) a ## b\n#define V 1\nCAT(CLM, 2) CAT(V, 2) CAT(, x)";
        assert_eq!(expand(text).unwrap(), "CLM2 V2 x");

        let text = "#define WRAP(a, b) [a ## b]\nWRAP(, y)";
        assert_eq!(expand(text).unwrap(), "[y]");
    }

    #[test]
    fn test_invalid_paste() {
        let err = expand("#define CAT(a, b) a ## b\nCAT(+, {)").unwrap_err();
        assert!(matches!(err, ResolveError::Macro { .. }));
    }

    #[test]
    fn test_self_reference_stays_identifier() {
        assert_eq!(expand("#define A A\n1").unwrap(), "1");
        assert_eq!(expand("#define A A\nA").unwrap(), "A");
        assert_eq!(expand("#define A x A y\nA").unwrap(), "x A y");
    }

    #[test]
    fn test_self_reference_through_arguments_stays_identifier() {
        let text = expand("#define ID(x) x\n#define A A\nID(ID(A))").unwrap();
        assert_eq!(text, "A");
    }

    #[test]
    fn test_function_like_self_reference_errors() {
        let err = expand("#define F(x) F(x)\nF(1)").unwrap_err();
        assert!(matches!(err, ResolveError::RecursiveMacro { .. }));
    }

    #[test]
    fn test_mutual_recursion_errors() {
        let err = expand("#define A B\n#define B A\nA").unwrap_err();
        match err {
            ResolveError::RecursiveMacro { name, chain, line, .. } => {
                assert_eq!(name, "A");
                assert_eq!(chain, vec!["A", "B", "A"]);
                assert_eq!(line, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_redefinition_uses_latest() {
        assert_eq!(expand("#define A 1\nA\n#define A 2\nA").unwrap(), "1 2");
    }

    #[test]
    fn test_arity_and_unterminated_arguments() {
        let err = expand("#define F(a, b) a\nF(1)").unwrap_err();
        assert!(matches!(err, ResolveError::Macro { .. }));
        let err = expand("#define F(a) a\nF(1, 2").unwrap_err();
        assert!(matches!(err, ResolveError::Macro { .. }));
        assert_eq!(expand("#define Z() z\n#define O(a) [a]\nZ() O()").unwrap(), "z []");
    }

    #[test]
    fn test_arguments_span_lines() {
        assert_eq!(expand("#define F(a, b) a b\nF(1,\n  2)").unwrap(), "1 2");
    }

    #[test]
    fn test_conditionals() {
        let text = "#ifdef X\n\"a\": 1\n#else\n\"a\": 2\n#endif";
        assert_eq!(expand(text).unwrap(), "\"a\": 2");

        let text = "#define CLM 1\n#define DCLM CLM\n#if DCLM == 1\none\n#elif defined(DCLM)\ntwo\n#else\nthree\n#endif";
        assert_eq!(expand(text).unwrap(), "one");
    }

    #[test]
    fn test_nested_inactive_directives_are_ignored() {
        let text = "#if 0\n#include \"missing.js\"\n#bogus\n#if 1\nx\n#endif\n#else\ny\n#endif";
        assert_eq!(expand(text).unwrap(), "y");
    }

    #[test]
    fn test_non_integer_condition() {
        let err = expand("#define FMT clm\n#if FMT == 1\n#endif").unwrap_err();
        match err {
            ResolveError::NonIntegerCondition { name, expansion, .. } => {
                assert_eq!(name, "FMT");
                assert_eq!(expansion, "clm");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_undefined_name_in_condition_is_zero() {
        assert_eq!(expand("#if UNDEFINED\na\n#else\nb\n#endif").unwrap(), "b");
    }

    #[test]
    fn test_unbalanced_conditionals() {
        let err = expand("#ifdef A\nx").unwrap_err();
        assert!(matches!(err, ResolveError::UnbalancedConditional { line: 1, .. }));
        let err = expand("#endif").unwrap_err();
        assert!(matches!(err, ResolveError::UnbalancedConditional { .. }));
    }

    #[test]
    fn test_unknown_directive() {
        let err = expand("#pragma once").unwrap_err();
        assert!(matches!(err, ResolveError::Directive { .. }));
        assert_eq!(expand("#\nx").unwrap(), "x");
    }

    #[test]
    fn test_hash_inside_line_is_not_a_directive() {
        assert_eq!(expand("a # b").unwrap(), "a # b");
    }

    #[test]
    fn test_predefinitions() {
        let mut expander = Expander::new(&ResolveOptions::default());
        expander
            .predefine(&[
                PreDefinition::new("WITH_LANDUSE", "1"),
                PreDefinition::new("SUFFIX", "grid.bin"),
            ])
            .unwrap();
        let tokens = expander
            .expand_str("t.js", "#if WITH_LANDUSE\nSUFFIX\n#endif")
            .unwrap();
        assert_eq!(render_tokens(&tokens[..tokens.len() - 1]), "grid.bin");
    }
}

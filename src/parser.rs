use crate::ast::{DocumentNode, Number, Scalar};
use crate::error::ResolveError;
use crate::lexer::{Token, TokenType};
use crate::source::SourceMap;
use indexmap::IndexMap;
use log::debug;

/// Deepest nesting of objects and arrays a document may have.
pub const MAX_NESTING: usize = 128;

/// A recursive descent parser for expanded documents.
///
/// The token stream must end with `Eof`. Errors point into whichever file a token came
/// from, so a syntax error inside an included fragment is reported there.
#[derive(Debug)]
pub struct Parser<'s> {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    sources: &'s SourceMap,
}

impl<'s> Parser<'s> {
    pub fn new(tokens: Vec<Token>, sources: &'s SourceMap) -> Self {
        let mut tokens: Vec<Token> = tokens.into_iter().filter(|t| !t.is_comment()).collect();
        if !tokens.last().is_some_and(Token::is_eof) {
            let mut eof = Token::new(TokenType::Eof, "", Default::default());
            if let Some(last) = tokens.last() {
                eof = eof.located_at(last);
                eof.pos_start = last.pos_end;
            }
            tokens.push(eof);
        }
        Self {
            tokens,
            position: 0,
            depth: 0,
            sources,
        }
    }

    // === Main Parsing Methods ===

    ///    Document ::= Object EOF
    pub fn parse_document(&mut self) -> Result<DocumentNode, ResolveError> {
        if self.check(TokenType::Eof) {
            return self.err_unexpected("a document starting with `{`");
        }
        let root = self.parse_object()?;
        if !self.check(TokenType::Eof) {
            return self.err_unexpected("end of input after the root object");
        }
        Ok(root)
    }

    /// Object ::= "{" [ MemberList ] "}"
    /// MemberList ::= Member { "," Member } [ "," ]
    fn parse_object(&mut self) -> Result<DocumentNode, ResolveError> {
        self.expect(TokenType::LBrace, "`{`")?;
        self.descend()?;
        let mut members: IndexMap<String, DocumentNode> = IndexMap::new();
        if !self.check(TokenType::RBrace) {
            loop {
                let (key, value) = self.parse_member()?;
                if members.contains_key(&key) {
                    debug!("duplicate key `{}`: later value replaces the earlier one", key);
                }
                // Replaces the value in place; the key keeps its first position.
                members.insert(key, value);

                if !self.match_token(TokenType::Comma) {
                    break;
                }
                // Trailing comma.
                if self.check(TokenType::RBrace) {
                    break;
                }
            }
        }
        self.expect(TokenType::RBrace, "`,` or `}`")?;
        self.depth -= 1;
        Ok(DocumentNode::Object(members))
    }

    /// Member ::= Key ":" Value
    fn parse_member(&mut self) -> Result<(String, DocumentNode), ResolveError> {
        let key = self.parse_key()?;
        self.expect(TokenType::Colon, "`:`")?;
        let value = self.parse_value()?;
        Ok((key, value))
    }

    /// Key ::= STRING | IDENTIFIER
    fn parse_key(&mut self) -> Result<String, ResolveError> {
        let token = self.current_token().clone();
        match token.ttype {
            TokenType::String(s) | TokenType::Identifier(s) => {
                self.advance();
                Ok(s)
            }
            _ => self.err_unexpected("a key"),
        }
    }

    /// Array ::= "[" [ ValueList ] "]"
    /// ValueList ::= Value { "," Value } [ "," ]
    fn parse_array(&mut self) -> Result<DocumentNode, ResolveError> {
        self.expect(TokenType::LBracket, "`[`")?;
        self.descend()?;
        let mut values = Vec::new();
        if !self.check(TokenType::RBracket) {
            loop {
                values.push(self.parse_value()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
                if self.check(TokenType::RBracket) {
                    break; // Allow trailing comma
                }
            }
        }
        self.expect(TokenType::RBracket, "`,` or `]`")?;
        self.depth -= 1;
        Ok(DocumentNode::Array(values))
    }

    /// Value ::= Object | Array | STRING | [ "-" ] NUMBER | IDENTIFIER
    fn parse_value(&mut self) -> Result<DocumentNode, ResolveError> {
        let token = self.current_token().clone();
        match &token.ttype {
            TokenType::LBrace => self.parse_object(),
            TokenType::LBracket => self.parse_array(),
            TokenType::String(s) => {
                self.advance();
                Ok(DocumentNode::Scalar(Scalar::String(s.clone())))
            }
            TokenType::Number(spelling) => {
                self.advance();
                self.parse_number(spelling, &token).map(scalar_number)
            }
            TokenType::Minus => {
                self.advance();
                let number_token = self.current_token().clone();
                match &number_token.ttype {
                    TokenType::Number(spelling) => {
                        self.advance();
                        let negative = format!("-{}", spelling);
                        self.parse_number(&negative, &number_token).map(scalar_number)
                    }
                    _ => self.err_unexpected("a number after `-`"),
                }
            }
            TokenType::Identifier(word) => {
                self.advance();
                let scalar = match word.as_str() {
                    "true" => Scalar::Boolean(true),
                    "false" => Scalar::Boolean(false),
                    "null" => Scalar::Null,
                    // Unexpanded names are kept as their spelling.
                    _ => Scalar::String(word.clone()),
                };
                Ok(DocumentNode::Scalar(scalar))
            }
            _ => self.err_unexpected("a value"),
        }
    }

    fn parse_number(&self, spelling: &str, token: &Token) -> Result<Number, ResolveError> {
        if let Ok(i) = spelling.parse::<i64>() {
            // `-0` is a float in JSON.
            if i == 0 && spelling.starts_with('-') {
                return Ok(Number::Float(-0.0));
            }
            return Ok(Number::Integer(i));
        }
        if let Ok(u) = spelling.parse::<u64>() {
            return Ok(Number::Unsigned(u));
        }
        let json_like = spelling
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
        match spelling.parse::<f64>() {
            Ok(f) if json_like && f.is_finite() => Ok(Number::Float(f)),
            _ => Err(ResolveError::syntax(
                self.sources.snippet(token),
                format!("invalid number literal `{}`", spelling),
            )),
        }
    }

    fn descend(&mut self) -> Result<(), ResolveError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let opener = &self.tokens[self.position.saturating_sub(1)];
            return Err(ResolveError::syntax(
                self.sources.snippet(opener),
                format!("objects and arrays nested deeper than {} levels", MAX_NESTING),
            ));
        }
        Ok(())
    }

    // === Tokenizer Helper Methods ===

    fn current_token(&self) -> &Token {
        // The stream always ends with Eof; stay on it once reached.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    #[track_caller]
    fn expect(&mut self, expected: TokenType, description: &str) -> Result<(), ResolveError> {
        if self.check(expected) {
            self.advance();
            Ok(())
        } else {
            self.err_unexpected(description)
        }
    }

    fn match_token(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, ttype: TokenType) -> bool {
        std::mem::discriminant(&self.current_token().ttype) == std::mem::discriminant(&ttype)
    }

    fn err_unexpected<T>(&self, expected: &str) -> Result<T, ResolveError> {
        let token = self.current_token();
        let message = if token.is_eof() {
            format!("unexpected end of input, expected {}", expected)
        } else {
            format!("expected {}, found `{}`", expected, token.text)
        };
        Err(ResolveError::syntax(self.sources.snippet(token), message))
    }
}

fn scalar_number(number: Number) -> DocumentNode {
    DocumentNode::Scalar(Scalar::Number(number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use miette::Report;

    fn parse(source: &str) -> Result<DocumentNode, ResolveError> {
        let mut sources = SourceMap::new();
        let id = sources.add("test.js", None, source.to_string());
        let tokens = Lexer::new_with_name(source, id, "test.js").lex()?;
        Parser::new(tokens, &sources).parse_document()
    }

    fn parse_ok(source: &str) -> DocumentNode {
        match parse(source) {
            Ok(doc) => doc,
            Err(err) => {
                let report = Report::from(err);
                panic!("{:#}", report);
            }
        }
    }

    fn keys(node: &DocumentNode) -> Vec<&str> {
        node.as_object().unwrap().keys().map(String::as_str).collect()
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(parse_ok("{}"), DocumentNode::empty_object());
    }

    #[test]
    fn test_scalars() {
        let doc = parse_ok(r#"{ "s": "v", n: -3, f: 2.5e1, t: true, x: false, z: null, w: clm }"#);
        assert_eq!(doc.get("s"), Some(&DocumentNode::string("v")));
        assert_eq!(doc.get("n"), Some(&DocumentNode::integer(-3)));
        assert_eq!(
            doc.get("f"),
            Some(&DocumentNode::Scalar(Scalar::Number(Number::Float(25.0))))
        );
        assert_eq!(doc.get("t"), Some(&DocumentNode::Scalar(Scalar::Boolean(true))));
        assert_eq!(doc.get("x"), Some(&DocumentNode::Scalar(Scalar::Boolean(false))));
        assert_eq!(doc.get("z"), Some(&DocumentNode::Scalar(Scalar::Null)));
        assert_eq!(doc.get("w"), Some(&DocumentNode::string("clm")));
    }

    #[test]
    fn test_duplicate_key_last_wins_first_position() {
        let doc = parse_ok(r#"{ "a": 1, "b": 2, "a": 3 }"#);
        assert_eq!(keys(&doc), vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&DocumentNode::integer(3)));
    }

    #[test]
    fn test_trailing_commas() {
        let doc = parse_ok(r#"{ "a": [1, 2,], }"#);
        assert_eq!(doc.get("a").and_then(DocumentNode::as_array).map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_nested_structures() {
        let doc = parse_ok(r#"{ "input": { "soil": { "fmt": "meta", "name": "soil.js" } }, "output": [ { "id": "grid" } ] }"#);
        assert_eq!(
            doc.pointer("input.soil.fmt").and_then(DocumentNode::as_str),
            Some("meta")
        );
        assert_eq!(doc.pointer("output.0.id").and_then(DocumentNode::as_str), Some("grid"));
    }

    #[test]
    fn test_unsigned_and_negative_zero() {
        let doc = parse_ok("{ big: 18446744073709551615, zero: -0, plain: 0 }");
        assert_eq!(
            doc.get("big"),
            Some(&DocumentNode::Scalar(Scalar::Number(Number::Unsigned(u64::MAX))))
        );
        match doc.get("zero") {
            Some(DocumentNode::Scalar(Scalar::Number(Number::Float(z)))) => {
                assert!(*z == 0.0 && z.is_sign_negative())
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(doc.get("plain"), Some(&DocumentNode::integer(0)));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |levels: usize| format!("{{ \"a\": {}1{} }}", "[".repeat(levels), "]".repeat(levels));
        assert!(parse(&nested(MAX_NESTING - 1)).is_ok());
        let err = parse(&nested(MAX_NESTING)).unwrap_err();
        match err {
            ResolveError::Syntax { message, .. } => assert!(message.contains("nested deeper")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_input() {
        let err = parse("  // only a comment\n").unwrap_err();
        assert!(matches!(err, ResolveError::Syntax { .. }));
    }

    #[test]
    fn test_trailing_tokens() {
        let err = parse("{} {}").unwrap_err();
        match err {
            ResolveError::Syntax { message, .. } => assert!(message.contains("end of input")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_object() {
        let err = parse("{ \"a\": 1,\n \"b\": 2\n").unwrap_err();
        match err {
            ResolveError::Syntax { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("unexpected end of input"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_members() {
        assert!(parse("{ \"a\" 1 }").is_err());
        assert!(parse("{ 1: 2 }").is_err());
        assert!(parse("{ \"a\": }").is_err());
        assert!(parse("{ \"a\": 1 \"b\": 2 }").is_err());
        assert!(parse("{ \"a\": - x }").is_err());
        assert!(parse("[1]").is_err());
    }

    #[test]
    fn test_invalid_number() {
        let err = parse("{ \"v\": 3.23.1901 }").unwrap_err();
        match err {
            ResolveError::Syntax { message, .. } => assert!(message.contains("3.23.1901")),
            other => panic!("unexpected {other:?}"),
        }
    }
}

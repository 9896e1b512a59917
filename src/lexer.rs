use crate::error::ResolveError;
use crate::source::SourceId;
use crate::utils::get_line_and_column;
use miette::NamedSource;

/// Represents the different kinds of tokens that the lexer can produce.
/// The set covers both the preprocessing directives and the JSON-like document syntax.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// Represents the end of the input file.
    Eof,
    /// A `//` line comment or a `/* */` block comment.
    /// The associated `String` contains the comment body without its delimiters.
    Comment(String),

    // == Literals ==
    /// An identifier: keys, macro names, directive names and bare words like `true`.
    Identifier(String),
    /// A string literal, enclosed in double quotes.
    /// The associated `String` holds the decoded content; the raw spelling lives in `Token::text`.
    String(String),
    /// A preprocessing number such as `42`, `0x1F`, `1.5e-3` or `3.23.1901`. A leading `-` is
    /// a separate token. The parser decides whether the spelling is a valid number.
    Number(String),

    // == Punctuation & Operators ==
    /// Left Brace: `{`
    LBrace,
    /// Right Brace: `}`
    RBrace,
    /// Left Bracket: `[`
    LBracket,
    /// Right Bracket: `]`
    RBracket,
    /// Left Parenthesis: `(`
    LParen,
    /// Right Parenthesis: `)`
    RParen,
    /// Comma: `,`
    Comma,
    /// Colon: `:`
    Colon,
    /// Hash: `#` (directive marker, stringify operator)
    Hash,
    /// Double hash: `##` (token paste operator)
    HashHash,
    /// Dot: `.`
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Equals,
    /// Any other single character; only meaningful inside stringified or pasted text.
    Other(char),
}

/// A token with its type, spelling and location.
#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    /// Spelling as it appeared in the source (strings keep their quotes and escapes).
    pub text: String,
    pub source: SourceId,
    /// 1-based line of the first character.
    pub line: usize,
    pub pos_start: usize,
    pub pos_end: usize,
    /// First token on its logical line.
    pub line_start: bool,
    /// Whitespace or a comment preceded the token.
    pub space_before: bool,
    /// Names of the macros whose expansion produced this token.
    pub hide_set: Vec<String>,
    /// A macro's own name found in its replacement list; never expanded again.
    pub painted: bool,
}

impl Token {
    pub fn new(ttype: TokenType, text: impl Into<String>, source: SourceId) -> Token {
        Token {
            ttype,
            text: text.into(),
            source,
            line: 1,
            pos_start: 0,
            pos_end: 0,
            line_start: false,
            space_before: false,
            hide_set: Vec::new(),
            painted: false,
        }
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.ttype {
            TokenType::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.ident() == Some(name)
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.ttype, TokenType::Comment(_))
    }

    pub fn is_eof(&self) -> bool {
        self.ttype == TokenType::Eof
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.hide_set.iter().any(|n| n == name)
    }

    /// Moves the token to another location, keeping its type and spelling.
    pub fn located_at(mut self, at: &Token) -> Token {
        self.source = at.source;
        self.line = at.line;
        self.pos_start = at.pos_start;
        self.pos_end = at.pos_end;
        self
    }
}

/// Renders a sequence of tokens back to text, one space wherever the source had whitespace.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 && token.space_before {
            out.push(' ');
        }
        out.push_str(&token.text);
    }
    out
}

/// Produces the quoted, escaped spelling of a string value.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub struct Lexer<'a> {
    input: &'a str,
    name: String,
    source: SourceId,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    position: usize,
    line: usize,
    at_line_start: bool,
    saw_space: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::new_with_name(input, SourceId::default(), "<input>")
    }

    pub fn new_with_name(input: &'a str, source: SourceId, name: impl Into<String>) -> Self {
        Self {
            input,
            name: name.into(),
            source,
            chars: input.char_indices().peekable(),
            position: 0,
            line: 1,
            at_line_start: true,
            saw_space: false,
        }
    }

    /// Tokenizes the whole input. The returned stream always ends with an `Eof` token.
    ///
    /// # Errors
    /// Returns `ResolveError::Lex` when the input ends inside a string literal or a block
    /// comment, or when a string literal runs into the end of its line.
    pub fn lex(&mut self) -> Result<Vec<Token>, ResolveError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token.is_eof() {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    pub fn next_token(&mut self) -> Result<Token, ResolveError> {
        self.skip_whitespace();
        let start_pos = self.position;
        let start_line = self.line;

        let ttype = if let Some(c) = self.advance() {
            match c {
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                '(' => TokenType::LParen,
                ')' => TokenType::RParen,
                ',' => TokenType::Comma,
                ':' => TokenType::Colon,
                '+' => TokenType::Plus,
                '-' => TokenType::Minus,
                '*' => TokenType::Star,
                '%' => TokenType::Percent,
                '#' => self.either('#', TokenType::HashHash, TokenType::Hash),
                '!' => self.either('=', TokenType::NotEq, TokenType::Bang),
                '=' => self.either('=', TokenType::EqEq, TokenType::Equals),
                '<' => self.either('=', TokenType::LtEq, TokenType::Lt),
                '>' => self.either('=', TokenType::GtEq, TokenType::Gt),
                '&' => self.either('&', TokenType::AndAnd, TokenType::Other('&')),
                '|' => self.either('|', TokenType::OrOr, TokenType::Other('|')),
                '/' => match self.peek() {
                    Some('/') => self.read_line_comment(),
                    Some('*') => self.read_block_comment(start_pos)?,
                    _ => TokenType::Slash,
                },
                '.' => {
                    if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.read_number()
                    } else {
                        TokenType::Dot
                    }
                }
                '"' => self.read_string(start_pos)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(start_pos),
                c if c.is_ascii_digit() => self.read_number(),
                c => TokenType::Other(c),
            }
        } else {
            TokenType::Eof
        };

        let mut token = Token::new(
            ttype,
            &self.input[start_pos..self.position],
            self.source,
        );
        token.line = start_line;
        token.pos_start = start_pos;
        token.pos_end = self.position;
        token.line_start = self.at_line_start;
        token.space_before = self.saw_space;

        if token.is_comment() {
            // A comment separates tokens but never ends a directive line.
            self.saw_space = true;
        } else {
            self.at_line_start = false;
            self.saw_space = false;
        }
        Ok(token)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_second(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    fn either(&mut self, next: char, double: TokenType, single: TokenType) -> TokenType {
        if self.peek() == Some(next) {
            self.advance();
            double
        } else {
            single
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                self.advance();
                self.at_line_start = true;
                self.saw_space = true;
            } else if c.is_whitespace() {
                self.advance();
                self.saw_space = true;
            } else if c == '\\' && matches!(self.peek_second(), Some('\n') | Some('\r')) {
                // Line continuation: the logical line goes on.
                self.advance();
                if self.peek() == Some('\r') {
                    self.advance();
                }
                if self.peek() == Some('\n') {
                    self.advance();
                }
                self.saw_space = true;
            } else {
                break;
            }
        }
    }

    fn read_line_comment(&mut self) -> TokenType {
        self.advance(); // Consume the second '/'
        let mut comment_text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
            comment_text.push(c);
        }
        TokenType::Comment(comment_text.trim().to_string())
    }

    fn read_block_comment(&mut self, start_pos: usize) -> Result<TokenType, ResolveError> {
        self.advance(); // Consume the '*'
        let mut comment_text = String::new();
        loop {
            match self.advance() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    return Ok(TokenType::Comment(comment_text.trim().to_string()));
                }
                Some(c) => comment_text.push(c),
                None => return Err(self.error(start_pos, "unterminated block comment")),
            }
        }
    }

    fn read_string(&mut self, start_pos: usize) -> Result<TokenType, ResolveError> {
        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error(start_pos, "unterminated string literal"));
            };
            match c {
                '"' => {
                    self.advance(); // Consume the closing quote
                    return Ok(TokenType::String(value));
                }
                '\n' => return Err(self.error(start_pos, "unterminated string literal")),
                '\\' => {
                    self.advance(); // Consume the backslash
                    let Some(escaped_char) = self.advance() else {
                        return Err(self.error(start_pos, "unterminated string literal"));
                    };
                    match escaped_char {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        '/' => value.push('/'),
                        'b' => value.push('\u{8}'),
                        'f' => value.push('\u{c}'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '\n' => {}
                        'u' => value.push(self.read_unicode_escape()?),
                        _ => {
                            value.push('\\');
                            value.push(escaped_char);
                        }
                    }
                }
                _ => {
                    self.advance();
                    value.push(c);
                }
            }
        }
    }

    /// Decodes the four hex digits after `\u`, joining a UTF-16 surrogate pair.
    fn read_unicode_escape(&mut self) -> Result<char, ResolveError> {
        let escape_pos = self.position - 2;
        let high = self
            .read_hex4()
            .ok_or_else(|| self.error(escape_pos, "invalid \\u escape, expected four hex digits"))?;
        if !(0xD800..0xE000).contains(&high) {
            return char::from_u32(high).ok_or_else(|| self.error(escape_pos, "invalid \\u escape"));
        }
        if high >= 0xDC00 || !self.input[self.position..].starts_with("\\u") {
            return Err(self.error(escape_pos, "unpaired surrogate in \\u escape"));
        }
        self.advance();
        self.advance();
        let low = self
            .read_hex4()
            .filter(|low| (0xDC00..0xE000).contains(low))
            .ok_or_else(|| self.error(escape_pos, "unpaired surrogate in \\u escape"))?;
        let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(code).ok_or_else(|| self.error(escape_pos, "invalid \\u escape"))
    }

    fn read_hex4(&mut self) -> Option<u32> {
        let hex = self.input.get(self.position..self.position + 4)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(hex, 16).ok()?;
        for _ in 0..4 {
            self.advance();
        }
        Some(value)
    }

    fn read_identifier(&mut self, start_pos: usize) -> TokenType {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Identifier(self.input[start_pos..self.position].to_string())
    }

    /// Preprocessing number: digits, letters, `_`, `.` and signed exponents.
    fn read_number(&mut self) -> TokenType {
        let start_pos = self.position - 1;
        while let Some(c) = self.peek() {
            if matches!(c, 'e' | 'E' | 'p' | 'P') && matches!(self.peek_second(), Some('+' | '-')) {
                self.advance();
                self.advance();
            } else if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Number(self.input[start_pos..self.position].to_string())
    }

    fn error(&self, start_pos: usize, message: &str) -> ResolveError {
        let (line, _) = get_line_and_column(self.input, start_pos);
        ResolveError::Lex {
            file: self.name.clone(),
            line,
            message: message.to_string(),
            src: NamedSource::new(self.name.clone(), self.input.to_string()),
            span: (start_pos, self.position.saturating_sub(start_pos).max(1)).into(),
        }
    }
}

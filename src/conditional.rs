//! Conditional compilation: the frame stack for `#if` chains and the integer expression
//! evaluator behind `#if`/`#elif`.

use crate::error::ResolveError;
use crate::lexer::{Token, TokenType};
use crate::macros::MacroTable;
use crate::source::SourceMap;
use log::debug;

#[derive(Debug, Clone)]
pub struct ConditionalFrame {
    /// Text in the current branch is kept.
    pub active: bool,
    /// The enclosing region was active when the frame was opened.
    pub parent_active: bool,
    /// Some branch of this chain has already been taken.
    pub matched: bool,
    pub seen_else: bool,
    /// The `#if`/`#ifdef`/`#ifndef` directive that opened the frame.
    pub opener: Token,
}

/// Open conditional frames of one file. Each file gets its own stack so a conditional can
/// never be opened in one file and closed in another.
#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<ConditionalFrame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.frames.last().map_or(true, |f| f.active)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a frame. The guard is only evaluated when the enclosing region is active.
    pub fn push<F>(&mut self, opener: Token, guard: F) -> Result<(), ResolveError>
    where
        F: FnOnce() -> Result<bool, ResolveError>,
    {
        let parent_active = self.is_active();
        let active = parent_active && guard()?;
        debug!(
            "line {}: conditional opened, branch {}",
            opener.line,
            if active { "taken" } else { "skipped" }
        );
        self.frames.push(ConditionalFrame {
            active,
            parent_active,
            matched: active,
            seen_else: false,
            opener,
        });
        Ok(())
    }

    /// `#elif`: the guard is only evaluated when no earlier branch of the chain matched.
    pub fn enter_elif<F>(&mut self, directive: &Token, sources: &SourceMap, guard: F) -> Result<(), ResolveError>
    where
        F: FnOnce() -> Result<bool, ResolveError>,
    {
        let Some(frame) = self.frames.last_mut() else {
            return Err(ResolveError::unbalanced(
                sources.snippet(directive),
                "#elif without matching #if",
            ));
        };
        if frame.seen_else {
            return Err(ResolveError::unbalanced(
                sources.snippet(directive),
                "#elif after #else",
            ));
        }
        if frame.parent_active && !frame.matched {
            let taken = guard()?;
            frame.active = taken;
            frame.matched = taken;
        } else {
            frame.active = false;
        }
        Ok(())
    }

    pub fn enter_else(&mut self, directive: &Token, sources: &SourceMap) -> Result<(), ResolveError> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(ResolveError::unbalanced(
                sources.snippet(directive),
                "#else without matching #if",
            ));
        };
        if frame.seen_else {
            return Err(ResolveError::unbalanced(
                sources.snippet(directive),
                "#else after #else",
            ));
        }
        frame.seen_else = true;
        frame.active = frame.parent_active && !frame.matched;
        frame.matched = true;
        Ok(())
    }

    pub fn pop(&mut self, directive: &Token, sources: &SourceMap) -> Result<ConditionalFrame, ResolveError> {
        self.frames.pop().ok_or_else(|| {
            ResolveError::unbalanced(sources.snippet(directive), "#endif without matching #if")
        })
    }

    /// Called at the end of a file: every frame must have been closed.
    pub fn finish(&self, sources: &SourceMap) -> Result<(), ResolveError> {
        match self.frames.last() {
            Some(frame) => Err(ResolveError::unbalanced(
                sources.snippet(&frame.opener),
                "conditional block is never closed with #endif",
            )),
            None => Ok(()),
        }
    }
}

/// Replaces `defined NAME` and `defined(NAME)` with `1` or `0`.
pub fn replace_defined(
    tokens: &[Token],
    macros: &MacroTable,
    sources: &SourceMap,
) -> Result<Vec<Token>, ResolveError> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if !token.is_ident("defined") {
            out.push(token.clone());
            i += 1;
            continue;
        }
        let (name, consumed) = match tokens.get(i + 1) {
            Some(next) if next.ident().is_some() => (next.ident(), 2),
            Some(next) if next.ttype == TokenType::LParen => {
                let name = tokens.get(i + 2).and_then(|t| t.ident());
                let closed = tokens.get(i + 3).map(|t| &t.ttype) == Some(&TokenType::RParen);
                (if closed { name } else { None }, 4)
            }
            _ => (None, 1),
        };
        let Some(name) = name else {
            return Err(ResolveError::directive(
                sources.snippet(token),
                "`defined` must be followed by a macro name",
            ));
        };
        let value = if macros.is_defined(name) { "1" } else { "0" };
        let mut replaced = Token::new(TokenType::Number(value.to_string()), value, token.source)
            .located_at(token);
        replaced.space_before = token.space_before;
        out.push(replaced);
        i += consumed;
    }
    Ok(out)
}

/// Parses a C integer literal: decimal, `0x` hex or leading-zero octal, with optional
/// `u`/`l` suffixes. Values wrap into `i64`.
pub fn parse_integer(spelling: &str) -> Option<i64> {
    let digits = spelling.trim_end_matches(['u', 'U', 'l', 'L']);
    if digits.is_empty() {
        return None;
    }
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<u64>().ok()?
    };
    Some(value as i64)
}

/// Evaluates a fully expanded condition. `at` is the directive, used when the expression
/// ends early. Identifiers still present evaluate to 0.
pub fn evaluate(tokens: &[Token], at: &Token, sources: &SourceMap) -> Result<i64, ResolveError> {
    let mut evaluator = ExprEvaluator {
        tokens,
        pos: 0,
        at,
        sources,
    };
    if tokens.is_empty() {
        return Err(evaluator.error_at(at, "#if with no expression"));
    }
    let value = evaluator.parse_or(true)?;
    if let Some(extra) = evaluator.peek() {
        return Err(evaluator.error_at(extra, "unexpected token in condition"));
    }
    Ok(value)
}

struct ExprEvaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    at: &'a Token,
    sources: &'a SourceMap,
}

impl<'a> ExprEvaluator<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn check(&self, ttype: &TokenType) -> bool {
        self.peek().is_some_and(|t| &t.ttype == ttype)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn error_at(&self, token: &Token, message: &str) -> ResolveError {
        ResolveError::directive(self.sources.snippet(token), message)
    }

    // `eval` is false on the skipped side of `&&`/`||`: the operand is still parsed but
    // division by zero is not reported there.
    fn parse_or(&mut self, eval: bool) -> Result<i64, ResolveError> {
        let mut left = self.parse_and(eval)?;
        while self.check(&TokenType::OrOr) {
            self.advance();
            let right = self.parse_and(eval && left == 0)?;
            left = i64::from(left != 0 || right != 0);
        }
        Ok(left)
    }

    fn parse_and(&mut self, eval: bool) -> Result<i64, ResolveError> {
        let mut left = self.parse_equality(eval)?;
        while self.check(&TokenType::AndAnd) {
            self.advance();
            let right = self.parse_equality(eval && left != 0)?;
            left = i64::from(left != 0 && right != 0);
        }
        Ok(left)
    }

    fn parse_equality(&mut self, eval: bool) -> Result<i64, ResolveError> {
        let mut left = self.parse_relational(eval)?;
        loop {
            if self.check(&TokenType::EqEq) {
                self.advance();
                left = i64::from(left == self.parse_relational(eval)?);
            } else if self.check(&TokenType::NotEq) {
                self.advance();
                left = i64::from(left != self.parse_relational(eval)?);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_relational(&mut self, eval: bool) -> Result<i64, ResolveError> {
        let mut left = self.parse_additive(eval)?;
        loop {
            let op = match self.peek().map(|t| &t.ttype) {
                Some(TokenType::Lt) => TokenType::Lt,
                Some(TokenType::LtEq) => TokenType::LtEq,
                Some(TokenType::Gt) => TokenType::Gt,
                Some(TokenType::GtEq) => TokenType::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive(eval)?;
            left = i64::from(match op {
                TokenType::Lt => left < right,
                TokenType::LtEq => left <= right,
                TokenType::Gt => left > right,
                _ => left >= right,
            });
        }
    }

    fn parse_additive(&mut self, eval: bool) -> Result<i64, ResolveError> {
        let mut left = self.parse_multiplicative(eval)?;
        loop {
            if self.check(&TokenType::Plus) {
                self.advance();
                left = left.wrapping_add(self.parse_multiplicative(eval)?);
            } else if self.check(&TokenType::Minus) {
                self.advance();
                left = left.wrapping_sub(self.parse_multiplicative(eval)?);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_multiplicative(&mut self, eval: bool) -> Result<i64, ResolveError> {
        let mut left = self.parse_unary(eval)?;
        loop {
            let op = match self.peek() {
                Some(t) if matches!(t.ttype, TokenType::Star | TokenType::Slash | TokenType::Percent) => t,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary(eval)?;
            left = match op.ttype {
                TokenType::Star => left.wrapping_mul(right),
                _ if right == 0 => {
                    if eval {
                        return Err(self.error_at(op, "division by zero in condition"));
                    }
                    0
                }
                TokenType::Slash => left.wrapping_div(right),
                _ => left.wrapping_rem(right),
            };
        }
    }

    fn parse_unary(&mut self, eval: bool) -> Result<i64, ResolveError> {
        match self.peek().map(|t| &t.ttype) {
            Some(TokenType::Bang) => {
                self.advance();
                Ok(i64::from(self.parse_unary(eval)? == 0))
            }
            Some(TokenType::Minus) => {
                self.advance();
                Ok(self.parse_unary(eval)?.wrapping_neg())
            }
            Some(TokenType::Plus) => {
                self.advance();
                self.parse_unary(eval)
            }
            _ => self.parse_primary(eval),
        }
    }

    fn parse_primary(&mut self, eval: bool) -> Result<i64, ResolveError> {
        let Some(token) = self.advance() else {
            return Err(self.error_at(self.at, "condition ends unexpectedly"));
        };
        match &token.ttype {
            TokenType::Number(spelling) => parse_integer(spelling)
                .ok_or_else(|| self.error_at(token, "invalid integer constant in condition")),
            TokenType::Identifier(_) => Ok(0),
            TokenType::LParen => {
                let value = self.parse_or(eval)?;
                if !self.check(&TokenType::RParen) {
                    let at = self.peek().unwrap_or(token);
                    return Err(self.error_at(at, "missing `)` in condition"));
                }
                self.advance();
                Ok(value)
            }
            _ => Err(self.error_at(token, "expected a value in condition")),
        }
    }
}

//! Token stream wrapper for the hand-written parser.

use crate::lexer::Token;
use cslint_foundation::{Position, Range};

/// Token stream with lookahead and range tracking.
pub(crate) struct TokenStream<'a> {
    tokens: &'a [(Token, Range)],
    pos: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(tokens: &'a [(Token, Range)]) -> Self {
        TokenStream { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n).map(|(token, _)| token)
    }

    pub fn advance(&mut self) -> Option<&'a (Token, Range)> {
        let entry = self.tokens.get(self.pos);
        if entry.is_some() {
            self.pos += 1;
        }
        entry
    }

    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(token) if std::mem::discriminant(token) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it matches `expected`.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            return true;
        }
        false
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Range of the current token; at end of input, a zero-width range
    /// past the last token.
    pub fn current_range(&self) -> Range {
        if let Some((_, range)) = self.tokens.get(self.pos) {
            *range
        } else {
            Range::at(self.end_position())
        }
    }

    /// Zero-width position at the end of the last consumed token.
    ///
    /// "Expected newline" anchors here rather than at the offending
    /// token.
    pub fn previous_end(&self) -> Range {
        if self.pos == 0 {
            return Range::at(Position::default());
        }
        match self.tokens.get(self.pos - 1) {
            Some((_, range)) => Range::at(range.end),
            None => Range::at(self.end_position()),
        }
    }

    fn end_position(&self) -> Position {
        self.tokens
            .last()
            .map(|(_, range)| range.end)
            .unwrap_or_default()
    }

    /// Skip forward past the next newline (statement-boundary
    /// resynchronization).
    pub fn skip_past_newline(&mut self) {
        while let Some((token, _)) = self.advance() {
            if matches!(token, Token::Newline) {
                break;
            }
        }
    }

    /// Skip to just past the `endif` matching an already-consumed `if`,
    /// tracking nested if-statements.
    pub fn skip_past_endif(&mut self) {
        let mut depth = 0usize;
        while let Some((token, _)) = self.advance() {
            match token {
                Token::If => depth += 1,
                Token::Endif if depth == 0 => {
                    self.eat(&Token::Newline);
                    break;
                }
                Token::Endif => depth -= 1,
                _ => {}
            }
        }
    }
}

//! Token definitions.

use rust_decimal::Decimal;

use crate::error::SourcePos;

/// Classified token payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    LParen,
    RParen,
    /// Bare identifier that did not match a numeric shape.
    Ident,
    Number(Decimal),
    Text(String),
    /// Seconds.
    Time(u32),
    Binary(Vec<u8>),
    /// `#name rest-of-line`. Removed by the preprocessor.
    Directive { name: String, rest: String },
}

/// A token with its source text and position.
///
/// `text` is the raw source slice; macro pasting works on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: SourcePos,
}

impl Token {
    /// Create a token.
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            kind,
            text: text.into(),
            pos,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.kind == TokenKind::LParen
    }

    #[must_use]
    pub fn is_close(&self) -> bool {
        self.kind == TokenKind::RParen
    }

    /// Identifier text, if this is an identifier.
    #[must_use]
    pub fn ident(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Ident => Some(&self.text),
            _ => None,
        }
    }
}

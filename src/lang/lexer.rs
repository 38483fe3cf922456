//! Tokenizer.
//!
//! Source text is scanned with an ordered table of anchored recognizers.
//! At each position the recognizers are tried in priority order and the
//! first match wins:
//!
//! | # | Recognizer | Shape |
//! |---|------------|-------|
//! | 1 | skip | whitespace, `; comment` |
//! | 2 | directive | `#name rest-of-line` |
//! | 3 | text | `"..."` with `\"` `\\` `\n` `\t` escapes |
//! | 4 | binary | `{0A1F}` |
//! | 5 | time | `h:mm` or `h:mm:ss` |
//! | 6 | paren | `(` `)` |
//! | 7 | identifier | anything else up to a delimiter |
//!
//! Identifiers are then post-classified into decimal or `0x` hex numbers.
//! Malformed input produces a bad token: it is recorded, reported and
//! skipped so that one scan surfaces every lexical error.

use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use rust_decimal::Decimal;

use super::token::{Token, TokenKind};
use crate::error::{LexDiagnostic, SourcePos};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Recognizer {
    Skip,
    Directive,
    Text,
    UnterminatedText,
    Binary,
    UnterminatedBinary,
    Time,
    Paren,
    Ident,
}

static RECOGNIZERS: LazyLock<Vec<(Recognizer, Regex)>> = LazyLock::new(|| {
    [
        (Recognizer::Skip, r"^(?:\s+|;[^\n]*)"),
        (Recognizer::Directive, r"^#([A-Za-z_]+)[ \t]*([^\n]*)"),
        (Recognizer::Text, r#"^"((?:[^"\\\n]|\\.)*)""#),
        (Recognizer::UnterminatedText, r#"^"[^\n]*"#),
        (Recognizer::Binary, r"^\{([^}\n]*)\}"),
        (Recognizer::UnterminatedBinary, r"^\{[^\n]*"),
        (Recognizer::Time, r"^(\d{1,2}):(\d{2})(?::(\d{2}))?"),
        (Recognizer::Paren, r"^[()]"),
        (Recognizer::Ident, r#"^[^\s()";{}]+"#),
    ]
    .into_iter()
    .map(|(r, pattern)| (r, Regex::new(pattern).expect("recognizer pattern")))
    .collect()
});

static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("decimal pattern"));

/// Output of one scan.
#[derive(Clone, Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexDiagnostic>,
}

/// Tokenize `source`, attributing positions to `file`.
pub fn tokenize(source: &str, file: &Arc<str>) -> Lexed {
    let mut out = Lexed::default();
    let mut offset = 0;
    let mut line = 1u32;

    while offset < source.len() {
        let rest = &source[offset..];
        let pos = SourcePos::new(file.clone(), line);

        let Some((recognizer, caps)) = RECOGNIZERS
            .iter()
            .find_map(|(r, re)| re.captures(rest).map(|c| (*r, c)))
            .filter(|(r, c)| *r != Recognizer::Time || ends_at_delimiter(rest, c[0].len()))
            .or_else(|| {
                // A time shape glued to identifier characters is an identifier.
                RECOGNIZERS
                    .iter()
                    .filter(|(r, _)| !matches!(r, Recognizer::Time))
                    .find_map(|(r, re)| re.captures(rest).map(|c| (*r, c)))
            })
        else {
            let width = rest.chars().next().map_or(1, char::len_utf8);
            bad(&mut out, pos, format!("unexpected character {:?}", &rest[..width]));
            offset += width;
            continue;
        };

        let matched = caps.get(0).map_or("", |m| m.as_str());
        let consumed = matched.len().max(1);

        match recognizer {
            Recognizer::Skip => {}
            Recognizer::Directive => out.tokens.push(Token::new(
                TokenKind::Directive {
                    name: caps[1].to_string(),
                    rest: caps[2].trim().to_string(),
                },
                matched,
                pos,
            )),
            Recognizer::Text => out.tokens.push(Token::new(
                TokenKind::Text(unescape(&caps[1])),
                matched,
                pos,
            )),
            Recognizer::UnterminatedText => {
                bad(&mut out, pos, "unterminated string".to_string());
            }
            Recognizer::Binary => match parse_binary(&caps[1]) {
                Some(bytes) => out.tokens.push(Token::new(TokenKind::Binary(bytes), matched, pos)),
                None => bad(&mut out, pos, format!("invalid binary literal {matched}")),
            },
            Recognizer::UnterminatedBinary => {
                bad(&mut out, pos, "unterminated binary literal".to_string());
            }
            Recognizer::Time => match parse_time(&caps) {
                Some(seconds) => out.tokens.push(Token::new(TokenKind::Time(seconds), matched, pos)),
                None => bad(&mut out, pos, format!("invalid time literal {matched}")),
            },
            Recognizer::Paren => {
                let kind = if matched == "(" {
                    TokenKind::LParen
                } else {
                    TokenKind::RParen
                };
                out.tokens.push(Token::new(kind, matched, pos));
            }
            Recognizer::Ident => match classify_ident(matched) {
                Ok(kind) => out.tokens.push(Token::new(kind, matched, pos)),
                Err(message) => bad(&mut out, pos, message),
            },
        }

        line += matched.matches('\n').count() as u32;
        offset += consumed;
    }

    out
}

/// Classify a bare identifier as a number, hex number or plain identifier.
///
/// Also used after macro token pasting.
pub fn classify_ident(text: &str) -> Result<TokenKind, String> {
    if DECIMAL.is_match(text) {
        return Decimal::from_str(text)
            .map(TokenKind::Number)
            .map_err(|e| format!("invalid number {text}: {e}"));
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16)
            .map(|n| TokenKind::Number(Decimal::from(n)))
            .map_err(|_| format!("invalid hex literal {text}"));
    }
    Ok(TokenKind::Ident)
}

fn bad(out: &mut Lexed, pos: SourcePos, message: String) {
    tracing::warn!(%pos, %message, "bad token");
    out.errors.push(LexDiagnostic { pos, message });
}

fn ends_at_delimiter(rest: &str, len: usize) -> bool {
    rest[len..]
        .chars()
        .next()
        .map_or(true, |c| c.is_whitespace() || matches!(c, '(' | ')' | ';' | '"'))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn parse_binary(digits: &str) -> Option<Vec<u8>> {
    let digits: String = digits.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}

fn parse_time(caps: &regex::Captures<'_>) -> Option<u32> {
    let hours: u32 = caps[1].parse().ok()?;
    let minutes: u32 = caps[2].parse().ok()?;
    let seconds: u32 = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
    (minutes < 60 && seconds < 60).then_some(hours * 3600 + minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Lexed {
        tokenize(source, &Arc::from("test"))
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_basic_forms() {
        let lexed = lex("(piece (name man)) ; trailing comment\n(title \"Tic\")");
        assert!(lexed.errors.is_empty());
        let texts: Vec<_> = lexed.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["(", "piece", "(", "name", "man", ")", ")", "(", "title", "\"Tic\"", ")"]
        );
        assert_eq!(lexed.tokens[7].pos.line, 2);
    }

    #[test]
    fn test_numbers_are_post_classified() {
        assert_eq!(
            kinds("12 -3 1.5 0x1F a1 -"),
            vec![
                TokenKind::Number(Decimal::from(12)),
                TokenKind::Number(Decimal::from(-3)),
                TokenKind::Number(Decimal::from_str("1.5").unwrap()),
                TokenKind::Number(Decimal::from(31)),
                TokenKind::Ident,
                TokenKind::Ident,
            ]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#""a \"b\"" {0AFF} 1:30 12:00:05"#),
            vec![
                TokenKind::Text("a \"b\"".into()),
                TokenKind::Binary(vec![0x0A, 0xFF]),
                TokenKind::Time(5400),
                TokenKind::Time(43205),
            ]
        );
    }

    #[test]
    fn test_time_shape_inside_identifier() {
        assert_eq!(kinds("1:30x"), vec![TokenKind::Ident]);
    }

    #[test]
    fn test_directive_line() {
        let lexed = lex("#include \"common.zrf\"\n(game)");
        assert_eq!(
            lexed.tokens[0].kind,
            TokenKind::Directive {
                name: "include".into(),
                rest: "\"common.zrf\"".into()
            }
        );
        assert!(lexed.tokens[1].is_open());
    }

    #[test]
    fn test_bad_tokens_are_skipped_and_all_reported() {
        let lexed = lex("(a {ABC} b 0xZZ c)\n\"open");
        let texts: Vec<_> = lexed.tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["(", "a", "b", "c", ")"]);
        assert_eq!(lexed.errors.len(), 3);
        assert_eq!(lexed.errors[2].pos.line, 2);
        assert!(lexed.errors[2].message.contains("unterminated"));
    }

    #[test]
    fn test_invalid_time_is_bad() {
        let lexed = lex("1:75");
        assert!(lexed.tokens.is_empty());
        assert_eq!(lexed.errors.len(), 1);
    }
}

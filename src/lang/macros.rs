//! Macro table and expansion.
//!
//! `(define name body...)` stores the balanced token span `body`. An
//! invocation `(name arg1 ... argn)` is replaced by the body with `$k`
//! substituted by argument k, where each argument is one token or one
//! balanced parenthesised group.
//!
//! A placeholder embedded in a longer identifier (`$1-pawn`, `zone-$2`)
//! pastes the argument's text in place; the pasted identifier is classified
//! again so `$1$2` with `1` and `0` becomes the number `10`. Placeholders
//! without a matching argument expand to nothing.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use rustc_hash::FxHashMap;

use super::lexer::classify_ident;
use super::token::{Token, TokenKind};
use crate::core::Sym;
use crate::error::{LoadError, SourcePos};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("placeholder pattern"));

/// Stored macro definitions with an expansion budget.
#[derive(Clone, Debug)]
pub struct MacroTable {
    bodies: FxHashMap<Sym, Vec<Token>>,
    expansions: usize,
    limit: usize,
}

impl MacroTable {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            bodies: FxHashMap::default(),
            expansions: 0,
            limit,
        }
    }

    /// Store or replace a definition.
    pub fn define(&mut self, name: Sym, body: Vec<Token>) {
        self.bodies.insert(name, body);
    }

    #[must_use]
    pub fn contains(&self, name: Sym) -> bool {
        self.bodies.contains_key(&name)
    }

    /// Number of expansions performed so far.
    #[must_use]
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    /// Expand one invocation.
    pub fn expand(
        &mut self,
        name: Sym,
        args: &[Vec<Token>],
        pos: &SourcePos,
    ) -> Result<Vec<Token>, LoadError> {
        self.expansions += 1;
        if self.expansions > self.limit {
            return Err(LoadError::syntax(
                pos,
                format!("macro expansion limit of {} exceeded", self.limit),
            ));
        }
        let body = self
            .bodies
            .get(&name)
            .ok_or_else(|| LoadError::syntax(pos, "call of undefined macro"))?;

        let mut out = Vec::with_capacity(body.len());
        for token in body {
            if token.kind != TokenKind::Ident || !token.text.contains('$') {
                out.push(token.clone());
                continue;
            }
            if let Some(index) = whole_placeholder(&token.text) {
                if let Some(arg) = index.checked_sub(1).and_then(|i| args.get(i)) {
                    out.extend(arg.iter().cloned());
                }
                continue;
            }
            out.push(paste(token, args)?);
        }
        Ok(out)
    }
}

fn whole_placeholder(text: &str) -> Option<usize> {
    let caps = PLACEHOLDER.captures(text)?;
    if caps[0].len() == text.len() {
        caps[1].parse().ok()
    } else {
        None
    }
}

fn paste(token: &Token, args: &[Vec<Token>]) -> Result<Token, LoadError> {
    let text = PLACEHOLDER.replace_all(&token.text, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|k| k.checked_sub(1))
            .and_then(|i| args.get(i))
            .map(|arg| arg.iter().map(|t| t.text.as_str()).collect::<String>())
            .unwrap_or_default()
    });
    let kind = classify_ident(&text).map_err(|message| LoadError::syntax(&token.pos, message))?;
    Ok(Token::new(kind, text.into_owned(), token.pos.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::lexer::tokenize;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn toks(text: &str) -> Vec<Token> {
        tokenize(text, &Arc::from("test")).tokens
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_single_token_substitution() {
        let mut table = MacroTable::new(10);
        table.define(Sym(0), toks("$1"));
        let out = table.expand(Sym(0), &[toks("xxx")], &toks("x")[0].pos).unwrap();
        assert_eq!(texts(&out), vec!["xxx"]);
    }

    #[test]
    fn test_group_argument() {
        let mut table = MacroTable::new(10);
        table.define(Sym(0), toks("(verify $1) add"));
        let out = table.expand(Sym(0), &[toks("(empty? n)")], &toks("x")[0].pos).unwrap();
        assert_eq!(texts(&out), vec!["(", "verify", "(", "empty?", "n", ")", ")", "add"]);
    }

    #[test]
    fn test_paste_reclassifies() {
        let mut table = MacroTable::new(10);
        table.define(Sym(0), toks("$1$2 zone-$1"));
        let out = table
            .expand(Sym(0), &[toks("1"), toks("0")], &toks("x")[0].pos)
            .unwrap();
        assert_eq!(out[0].kind, TokenKind::Number(Decimal::from(10)));
        assert_eq!(out[1].text, "zone-1");
        assert_eq!(out[1].kind, TokenKind::Ident);
    }

    #[test]
    fn test_missing_argument_expands_to_nothing() {
        let mut table = MacroTable::new(10);
        table.define(Sym(0), toks("(a $2)"));
        let out = table.expand(Sym(0), &[toks("b")], &toks("x")[0].pos).unwrap();
        assert_eq!(texts(&out), vec!["(", "a", ")"]);
    }

    #[test]
    fn test_expansion_limit() {
        let mut table = MacroTable::new(1);
        table.define(Sym(0), toks("a"));
        let pos = toks("x")[0].pos.clone();
        assert!(table.expand(Sym(0), &[], &pos).is_ok());
        assert!(matches!(table.expand(Sym(0), &[], &pos), Err(LoadError::Syntax { .. })));
    }
}

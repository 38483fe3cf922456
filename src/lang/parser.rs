//! Generic node tree builder.
//!
//! The parser knows nothing about the DSL vocabulary. It turns tokens into
//! `Node`s, captures `(define ...)` forms as macros and expands macro calls
//! as their lists are entered: the expansion is pushed back onto the front
//! of the token stream and parsing simply continues, so an expansion may
//! produce zero, one or several nodes.

use std::collections::VecDeque;

use super::macros::MacroTable;
use super::symbols::SymbolTable;
use super::token::{Token, TokenKind};
use crate::core::diag::LEVEL_SUMMARY;
use crate::core::{Diagnostics, EngineConfig, Interner, Sym, Value};
use crate::error::{LoadError, SourcePos};

/// Parse-tree element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Ident { sym: Sym, pos: SourcePos },
    Literal { value: Value, pos: SourcePos },
    List { items: Vec<Node>, pos: SourcePos },
}

impl Node {
    #[must_use]
    pub fn pos(&self) -> &SourcePos {
        match self {
            Node::Ident { pos, .. } | Node::Literal { pos, .. } | Node::List { pos, .. } => pos,
        }
    }

    /// Symbol of an identifier node.
    #[must_use]
    pub fn ident(&self) -> Option<Sym> {
        match self {
            Node::Ident { sym, .. } => Some(*sym),
            _ => None,
        }
    }

    /// Items of a list node.
    #[must_use]
    pub fn items(&self) -> Option<&[Node]> {
        match self {
            Node::List { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Head identifier of a list node.
    #[must_use]
    pub fn head(&self) -> Option<Sym> {
        self.items().and_then(|items| items.first()).and_then(Node::ident)
    }
}

/// Parse a preprocessed token stream into top-level nodes.
pub fn parse(
    tokens: Vec<Token>,
    symbols: &mut SymbolTable,
    interner: &mut Interner,
    config: &EngineConfig,
    diag: Diagnostics,
) -> Result<Vec<Node>, LoadError> {
    let mut parser = Parser {
        tokens: tokens.into(),
        macros: MacroTable::new(config.max_macro_expansions),
        symbols,
        interner,
    };
    let mut nodes = Vec::new();
    while let Some(token) = parser.tokens.front() {
        if token.is_close() {
            return Err(LoadError::syntax(&token.pos, "unexpected ')'"));
        }
        if let Some(node) = parser.item()? {
            nodes.push(node);
        }
    }
    if diag.enabled(LEVEL_SUMMARY) {
        tracing::debug!(
            forms = nodes.len(),
            expansions = parser.macros.expansions(),
            "parsed program"
        );
    }
    Ok(nodes)
}

struct Parser<'a> {
    tokens: VecDeque<Token>,
    macros: MacroTable,
    symbols: &'a mut SymbolTable,
    interner: &'a mut Interner,
}

impl Parser<'_> {
    /// Parse one item. `None` when the item was a definition or a macro
    /// call whose expansion is now at the front of the stream.
    fn item(&mut self) -> Result<Option<Node>, LoadError> {
        let Some(token) = self.tokens.pop_front() else {
            return Ok(None);
        };
        let pos = token.pos;
        let node = match token.kind {
            TokenKind::LParen => return self.list(pos),
            TokenKind::RParen => return Err(LoadError::syntax(&pos, "unexpected ')'")),
            TokenKind::Ident => Node::Ident {
                sym: self.interner.intern(&token.text),
                pos,
            },
            TokenKind::Number(n) => Node::Literal {
                value: Value::Number(n),
                pos,
            },
            TokenKind::Text(text) => Node::Literal {
                value: Value::Text(text),
                pos,
            },
            TokenKind::Time(seconds) => Node::Literal {
                value: Value::Time(seconds),
                pos,
            },
            TokenKind::Binary(bytes) => Node::Literal {
                value: Value::Binary(bytes),
                pos,
            },
            TokenKind::Directive { name, .. } => {
                return Err(LoadError::syntax(&pos, format!("misplaced directive #{name}")));
            }
        };
        Ok(Some(node))
    }

    fn list(&mut self, open: SourcePos) -> Result<Option<Node>, LoadError> {
        if let Some(head) = self.tokens.front().and_then(Token::ident) {
            if head == "define" {
                self.tokens.pop_front();
                self.definition(&open)?;
                return Ok(None);
            }
            let sym = self.interner.intern(head);
            if self.symbols.is_macro(sym) {
                self.tokens.pop_front();
                self.invocation(sym, &open)?;
                return Ok(None);
            }
        }

        let mut items = Vec::new();
        loop {
            match self.tokens.front() {
                None => {
                    return Err(LoadError::syntax(&open, "end of input inside list"));
                }
                Some(token) if token.is_close() => {
                    self.tokens.pop_front();
                    return Ok(Some(Node::List { items, pos: open }));
                }
                Some(_) => {
                    if let Some(node) = self.item()? {
                        items.push(node);
                    }
                }
            }
        }
    }

    fn definition(&mut self, open: &SourcePos) -> Result<(), LoadError> {
        let name = match self.tokens.pop_front() {
            Some(token) if token.kind == TokenKind::Ident => self.interner.intern(&token.text),
            Some(token) => return Err(LoadError::syntax(&token.pos, "macro name expected")),
            None => return Err(LoadError::syntax(open, "end of input inside define")),
        };
        let mut body = Vec::new();
        let mut depth = 0usize;
        loop {
            let token = self
                .tokens
                .pop_front()
                .ok_or_else(|| LoadError::syntax(open, "end of input inside define"))?;
            if token.is_close() {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if token.is_open() {
                depth += 1;
            }
            body.push(token);
        }
        self.symbols.define_macro(name);
        self.macros.define(name, body);
        Ok(())
    }

    fn invocation(&mut self, name: Sym, open: &SourcePos) -> Result<(), LoadError> {
        let mut args = Vec::new();
        loop {
            let token = self
                .tokens
                .pop_front()
                .ok_or_else(|| LoadError::syntax(open, "end of input inside macro call"))?;
            if token.is_close() {
                break;
            }
            if !token.is_open() {
                args.push(vec![token]);
                continue;
            }
            let mut group = vec![token];
            let mut depth = 1usize;
            while depth > 0 {
                let token = self
                    .tokens
                    .pop_front()
                    .ok_or_else(|| LoadError::syntax(open, "end of input inside macro call"))?;
                if token.is_open() {
                    depth += 1;
                } else if token.is_close() {
                    depth -= 1;
                }
                group.push(token);
            }
            args.push(group);
        }

        let expansion = self.macros.expand(name, &args, open)?;
        for token in expansion.into_iter().rev() {
            self.tokens.push_front(token);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::lexer::tokenize;
    use std::sync::Arc;

    fn parse_text(text: &str) -> Result<(Vec<Node>, Interner), LoadError> {
        let mut interner = Interner::new();
        let mut symbols = SymbolTable::new(&mut interner);
        let tokens = tokenize(text, &Arc::from("test")).tokens;
        let nodes = parse(
            tokens,
            &mut symbols,
            &mut interner,
            &EngineConfig::default(),
            Diagnostics::quiet(),
        )?;
        Ok((nodes, interner))
    }

    fn render(node: &Node, interner: &Interner) -> String {
        match node {
            Node::Ident { sym, .. } => interner.name(*sym).to_string(),
            Node::Literal { value, .. } => value.display(interner),
            Node::List { items, .. } => {
                let inner: Vec<_> = items.iter().map(|n| render(n, interner)).collect();
                format!("({})", inner.join(" "))
            }
        }
    }

    #[test]
    fn test_nested_lists() {
        let (nodes, interner) = parse_text("(game (title \"T\") (players X O)) 5").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(render(&nodes[0], &interner), "(game (title \"T\") (players X O))");
        assert_eq!(nodes[1], Node::Literal {
            value: Value::from(5i64),
            pos: nodes[1].pos().clone(),
        });
    }

    #[test]
    fn test_single_token_macro() {
        let (nodes, interner) = parse_text("(define macx $1) (macx xxx)").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(render(&nodes[0], &interner), "xxx");
        assert!(nodes[0].ident().is_some());
    }

    #[test]
    fn test_full_form_macro() {
        let (nodes, interner) = parse_text("(define macb (piece (name sub1))) (macb)").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(render(&nodes[0], &interner), "(piece (name sub1))");
    }

    #[test]
    fn test_macro_inside_list_and_nested_macros() {
        let (nodes, interner) = parse_text(
            "(define step ($1 (verify empty?) add))\n\
             (define both (step n) (step s))\n\
             (moves (both))",
        )
        .unwrap();
        assert_eq!(
            render(&nodes[0], &interner),
            "(moves (n (verify empty?) add) (s (verify empty?) add))"
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse_text(")"), Err(LoadError::Syntax { .. })));
        assert!(matches!(parse_text("(a (b)"), Err(LoadError::Syntax { .. })));
        assert!(matches!(parse_text("(define)"), Err(LoadError::Syntax { .. })));
        let err = parse_text("(a\n(b))\n)").unwrap_err();
        assert!(err.to_string().contains("test:3"));
    }

    #[test]
    fn test_runaway_recursion_is_bounded() {
        let err = parse_text("(define loop (loop)) (loop)").unwrap_err();
        assert!(err.to_string().contains("expansion limit"));
    }
}

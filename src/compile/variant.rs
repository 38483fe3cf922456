//! Variant inheritance at node level.
//!
//! A `(variant ...)` form inherits every clause of the closest preceding
//! `(game ...)`. A variant clause replaces all base clauses with the same
//! head name. If the variant states any win, loss or draw condition, none of
//! the base game's conditions are inherited.

use rustc_hash::FxHashSet;

use crate::core::{Interner, Sym};
use crate::error::LoadError;
use crate::lang::parser::Node;

const CONDITIONS: [&str; 3] = ["win-condition", "loss-condition", "draw-condition"];

/// Rewrite every variant into a complete game definition.
pub fn merge_variants(nodes: Vec<Node>, interner: &Interner) -> Result<Vec<Node>, LoadError> {
    let mut base: Option<Vec<Node>> = None;
    let mut merged = Vec::with_capacity(nodes.len());

    for node in nodes {
        match (node.head().map(|h| interner.name(h)), node) {
            (Some("game"), node) => {
                if let Some(items) = node.items() {
                    base = Some(items[1..].to_vec());
                }
                merged.push(node);
            }
            (Some("variant"), Node::List { items, pos }) => {
                let Some(base_clauses) = &base else {
                    return Err(LoadError::syntax(&pos, "variant without a preceding game"));
                };
                let (head, clauses) = items.split_at(1);
                let mut combined = head.to_vec();
                combined.extend(inherit(base_clauses, clauses, interner));
                combined.extend_from_slice(clauses);
                merged.push(Node::List { items: combined, pos });
            }
            (_, node) => merged.push(node),
        }
    }
    Ok(merged)
}

fn inherit<'b>(
    base: &'b [Node],
    variant: &[Node],
    interner: &'b Interner,
) -> impl Iterator<Item = Node> + 'b {
    let replaced: FxHashSet<Sym> = variant.iter().filter_map(Node::head).collect();
    let drops_conditions = replaced
        .iter()
        .any(|h| CONDITIONS.contains(&interner.name(*h)));

    base.iter()
        .filter(move |clause| match clause.head() {
            Some(head) => {
                !replaced.contains(&head)
                    && !(drops_conditions && CONDITIONS.contains(&interner.name(head)))
            }
            None => true,
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::error::SourcePos;
    use std::sync::Arc;

    fn pos() -> SourcePos {
        SourcePos::new(Arc::from("test"), 1)
    }

    fn ident(interner: &mut Interner, name: &str) -> Node {
        Node::Ident {
            sym: interner.intern(name),
            pos: pos(),
        }
    }

    fn clause(interner: &mut Interner, head: &str, text: &str) -> Node {
        Node::List {
            items: vec![
                ident(interner, head),
                Node::Literal {
                    value: Value::Text(text.to_string()),
                    pos: pos(),
                },
            ],
            pos: pos(),
        }
    }

    fn form(interner: &mut Interner, head: &str, clauses: Vec<Node>) -> Node {
        let mut items = vec![ident(interner, head)];
        items.extend(clauses);
        Node::List { items, pos: pos() }
    }

    fn heads(node: &Node, interner: &Interner) -> Vec<String> {
        node.items().unwrap()[1..]
            .iter()
            .map(|c| interner.name(c.head().unwrap()).to_string())
            .collect()
    }

    #[test]
    fn test_variant_replaces_same_named_clauses() {
        let mut interner = Interner::new();
        let game = vec![
            clause(&mut interner, "title", "Base"),
            clause(&mut interner, "description", "d"),
            clause(&mut interner, "win-condition", "w"),
        ];
        let game = form(&mut interner, "game", game);
        let variant = vec![clause(&mut interner, "title", "Variant")];
        let variant = form(&mut interner, "variant", variant);

        let merged = merge_variants(vec![game, variant], &interner).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(heads(&merged[1], &interner), vec!["description", "win-condition", "title"]);
    }

    #[test]
    fn test_variant_condition_drops_all_base_conditions() {
        let mut interner = Interner::new();
        let game = vec![
            clause(&mut interner, "win-condition", "w"),
            clause(&mut interner, "draw-condition", "d"),
        ];
        let game = form(&mut interner, "game", game);
        let variant = vec![clause(&mut interner, "loss-condition", "l")];
        let variant = form(&mut interner, "variant", variant);

        let merged = merge_variants(vec![game, variant], &interner).unwrap();
        assert_eq!(heads(&merged[1], &interner), vec!["loss-condition"]);
    }

    #[test]
    fn test_variant_without_game() {
        let mut interner = Interner::new();
        let variant = form(&mut interner, "variant", vec![]);
        assert!(matches!(
            merge_variants(vec![variant], &interner),
            Err(LoadError::Syntax { .. })
        ));
    }
}

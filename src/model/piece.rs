//! A piece on the board.

use im::OrdMap;

use crate::core::{PlayerId, Sym};
use crate::defs::PieceDef;

/// Played piece: type, owner and attribute values.
///
/// Cheap to clone; the attribute map is persistent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PieceModel {
    pub piece: Sym,
    pub owner: PlayerId,
    pub attributes: OrdMap<Sym, bool>,
}

impl PieceModel {
    /// A fresh piece with its declared attribute defaults.
    #[must_use]
    pub fn new(def: &PieceDef, owner: PlayerId) -> Self {
        Self {
            piece: def.name,
            owner,
            attributes: def.attributes.iter().copied().collect(),
        }
    }

    /// A piece whose type has no definition. Only reachable from moves that
    /// name undeclared pieces, which the builder rejects for setup.
    #[must_use]
    pub fn bare(piece: Sym, owner: PlayerId) -> Self {
        Self {
            piece,
            owner,
            attributes: OrdMap::new(),
        }
    }

    /// Attribute value; undeclared attributes read `false`.
    #[must_use]
    pub fn attribute(&self, attribute: Sym) -> bool {
        self.attributes.get(&attribute).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn with_attribute(&self, attribute: Sym, value: bool) -> Self {
        let mut next = self.clone();
        next.attributes.insert(attribute, value);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_definition() {
        let mut def = PieceDef::new(Sym(1));
        def.attributes.push((Sym(7), true));
        let piece = PieceModel::new(&def, PlayerId::new(1));
        assert!(piece.attribute(Sym(7)));
        assert!(!piece.attribute(Sym(8)));

        let changed = piece.with_attribute(Sym(7), false);
        assert!(!changed.attribute(Sym(7)));
        assert!(piece.attribute(Sym(7)));
    }
}

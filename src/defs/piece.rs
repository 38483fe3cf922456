//! Piece definitions.

use crate::compile::bytecode::BlockId;
use crate::core::Sym;

/// Where a move program may start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartRestriction {
    Position(Sym),
    Zone(Sym),
}

/// One compiled drop or move program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveProgram {
    pub block: BlockId,
    pub move_type: Option<Sym>,
    pub restrict: Option<StartRestriction>,
}

impl MoveProgram {
    /// Whether the program runs on a turn restricted to `turn_type`.
    /// An unrestricted turn runs every program.
    #[must_use]
    pub fn allowed_on(&self, turn_type: Option<Sym>) -> bool {
        turn_type.is_none() || self.move_type == turn_type
    }
}

/// Static description of a piece type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PieceDef {
    pub name: Sym,
    pub help: Vec<String>,
    pub description: Option<String>,
    pub notation: Option<String>,
    /// Image file names per player.
    pub images: Vec<(Sym, Vec<String>)>,
    /// Attributes with their initial values, in declaration order.
    pub attributes: Vec<(Sym, bool)>,
    /// Never placed on the board by setup or drops.
    pub dummy: bool,
    pub drops: Vec<MoveProgram>,
    pub moves: Vec<MoveProgram>,
}

impl PieceDef {
    #[must_use]
    pub fn new(name: Sym) -> Self {
        Self {
            name,
            help: Vec::new(),
            description: None,
            notation: None,
            images: Vec::new(),
            attributes: Vec::new(),
            dummy: false,
            drops: Vec::new(),
            moves: Vec::new(),
        }
    }

    /// Initial value of an attribute; undeclared attributes read `false`.
    #[must_use]
    pub fn default_attribute(&self, attribute: Sym) -> bool {
        self.attributes
            .iter()
            .find(|(a, _)| *a == attribute)
            .is_some_and(|(_, v)| *v)
    }

    #[must_use]
    pub fn images_for(&self, player: Sym) -> &[String] {
        self.images
            .iter()
            .find(|(p, _)| *p == player)
            .map_or(&[], |(_, images)| images.as_slice())
    }
}

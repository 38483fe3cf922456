//! Moves as ordered lists of atomic parts.

use smallvec::SmallVec;

use crate::core::{PlayerId, Sym};

/// One atomic effect of a move. Parts apply in order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MovePart {
    /// Place a new piece. `from_store` names the store entry that pays for
    /// it; `None` for pieces created out of nothing.
    Drop {
        to: Sym,
        player: PlayerId,
        piece: Sym,
        from_store: Option<(PlayerId, Sym)>,
    },
    /// Relocate a piece, giving it the resulting owner and type.
    Move {
        from: Sym,
        to: Sym,
        player: PlayerId,
        piece: Sym,
    },
    /// Like `Move`, but the original stays.
    Copy {
        from: Sym,
        to: Sym,
        player: PlayerId,
        piece: Sym,
    },
    /// Remove a piece. `player` and `piece` describe what was taken.
    Take {
        at: Sym,
        player: PlayerId,
        piece: Sym,
    },
    ChangeOwner {
        at: Sym,
        player: PlayerId,
        piece: Sym,
    },
    ChangePiece {
        at: Sym,
        player: PlayerId,
        piece: Sym,
    },
    SetAttribute {
        at: Sym,
        attribute: Sym,
        value: bool,
    },
}

impl MovePart {
    /// Destination of a placing part.
    #[must_use]
    pub fn placement(&self) -> Option<(Sym, Sym)> {
        match self {
            MovePart::Drop { to, piece, .. }
            | MovePart::Move { to, piece, .. }
            | MovePart::Copy { to, piece, .. } => Some((*to, *piece)),
            _ => None,
        }
    }
}

/// What produced a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Drop,
    Move,
    Pass,
}

/// One legal move.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MoveModel {
    /// Player on turn.
    pub player: PlayerId,
    pub kind: MoveKind,
    /// Piece type the program ran for.
    pub piece: Option<Sym>,
    /// Start position of the program (the drop square for drops).
    pub position: Option<Sym>,
    pub parts: SmallVec<[MovePart; 4]>,
    pub move_type: Option<Sym>,
    /// The same piece moves again before the turn passes.
    pub partial: bool,
    /// Move type of the continuation.
    pub partial_type: Option<Sym>,
}

impl MoveModel {
    /// The empty move.
    #[must_use]
    pub fn pass(player: PlayerId) -> Self {
        Self {
            player,
            kind: MoveKind::Pass,
            piece: None,
            position: None,
            parts: SmallVec::new(),
            move_type: None,
            partial: false,
            partial_type: None,
        }
    }

    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.parts.is_empty()
    }

    /// Where the last placing part puts a piece, with the placed type.
    #[must_use]
    pub fn destination(&self) -> Option<(Sym, Sym)> {
        self.parts.iter().rev().find_map(MovePart::placement)
    }

    /// Square the move leaves, for `last-from?`.
    #[must_use]
    pub fn last_from(&self) -> Option<Sym> {
        match self.kind {
            MoveKind::Move => self.position,
            MoveKind::Drop | MoveKind::Pass => None,
        }
    }

    /// Square the move ends on, for `last-to?`.
    #[must_use]
    pub fn last_to(&self) -> Option<Sym> {
        self.destination().map(|(to, _)| to).or(self.position)
    }

    /// Up to two position/piece pairs describing the move: origin, then
    /// destination. Drops report only the destination.
    #[must_use]
    pub fn summary(&self) -> SmallVec<[(Sym, Sym); 2]> {
        let mut pairs = SmallVec::new();
        if self.kind == MoveKind::Move {
            if let (Some(position), Some(piece)) = (self.position, self.piece) {
                pairs.push((position, piece));
            }
        }
        let target = self.destination().or_else(|| {
            self.parts.iter().find_map(|part| match part {
                MovePart::Take { at, piece, .. } => Some((*at, *piece)),
                _ => None,
            })
        });
        if let Some(target) = target {
            if pairs.first() != Some(&target) {
                pairs.push(target);
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn step(from: u32, to: u32) -> MoveModel {
        MoveModel {
            player: PlayerId::new(0),
            kind: MoveKind::Move,
            piece: Some(Sym(1)),
            position: Some(Sym(from)),
            parts: smallvec![MovePart::Move {
                from: Sym(from),
                to: Sym(to),
                player: PlayerId::new(0),
                piece: Sym(1),
            }],
            move_type: None,
            partial: false,
            partial_type: None,
        }
    }

    #[test]
    fn test_summary_of_move() {
        let mv = step(10, 11);
        assert_eq!(mv.summary().as_slice(), &[(Sym(10), Sym(1)), (Sym(11), Sym(1))]);
        assert_eq!(mv.last_from(), Some(Sym(10)));
        assert_eq!(mv.last_to(), Some(Sym(11)));
    }

    #[test]
    fn test_summary_of_drop() {
        let mv = MoveModel {
            kind: MoveKind::Drop,
            parts: smallvec![MovePart::Drop {
                to: Sym(5),
                player: PlayerId::new(1),
                piece: Sym(2),
                from_store: Some((PlayerId::new(1), Sym(2))),
            }],
            position: Some(Sym(5)),
            piece: Some(Sym(2)),
            ..MoveModel::pass(PlayerId::new(1))
        };
        assert_eq!(mv.summary().as_slice(), &[(Sym(5), Sym(2))]);
        assert_eq!(mv.last_from(), None);
        assert!(!mv.is_pass());
    }

    #[test]
    fn test_pass() {
        let pass = MoveModel::pass(PlayerId::new(0));
        assert!(pass.is_pass());
        assert!(pass.summary().is_empty());
        assert_eq!(pass.last_to(), None);
    }
}

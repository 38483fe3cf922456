//! Game definition: everything static about one menu entry.
//!
//! Built once by running the game's compiled block, then shared read-only
//! through `Arc<GameDef>` by every board of every session playing it.

use std::sync::Arc;

use super::board::BoardDef;
use super::piece::PieceDef;
use crate::compile::bytecode::{BlockId, Program};
use crate::core::{PlayerId, Sym, Value};

/// One turn-order entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TurnDef {
    /// Player on turn.
    pub player: PlayerId,
    /// Player whose pieces move.
    pub mover: PlayerId,
    /// Restricts the turn to programs of this type.
    pub move_type: Option<Sym>,
}

/// Turn order with its cycling point.
///
/// Turns `0..len` play in order; afterwards play cycles over
/// `turns[repeat..]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOrder {
    turns: Vec<TurnDef>,
    repeat: usize,
}

impl TurnOrder {
    /// `repeat` must be a valid index into `turns`.
    #[must_use]
    pub fn new(turns: Vec<TurnDef>, repeat: usize) -> Self {
        Self { turns, repeat }
    }

    /// One turn per player, in declaration order.
    #[must_use]
    pub fn round_robin(player_count: usize) -> Self {
        let turns = PlayerId::all(player_count)
            .map(|p| TurnDef {
                player: p,
                mover: p,
                move_type: None,
            })
            .collect();
        Self { turns, repeat: 0 }
    }

    #[must_use]
    pub fn turns(&self) -> &[TurnDef] {
        &self.turns
    }

    #[must_use]
    pub fn repeat_start(&self) -> usize {
        self.repeat
    }

    /// Turn number `i`, applying the repeat rule.
    ///
    /// ```
    /// use rust_abg::core::PlayerId;
    /// use rust_abg::defs::{TurnDef, TurnOrder};
    ///
    /// let turn = |p| TurnDef { player: PlayerId::new(p), mover: PlayerId::new(p), move_type: None };
    /// let order = TurnOrder::new(vec![turn(0), turn(1), turn(2)], 1);
    /// let players: Vec<u8> = (0..6).map(|i| order.turn(i).unwrap().player.0).collect();
    /// assert_eq!(players, vec![0, 1, 2, 1, 2, 1]);
    /// ```
    #[must_use]
    pub fn turn(&self, i: usize) -> Option<&TurnDef> {
        let len = self.turns.len();
        if i < len {
            return self.turns.get(i);
        }
        let cycle = len.checked_sub(self.repeat).filter(|&c| c > 0)?;
        self.turns.get(self.repeat + (i - self.repeat) % cycle)
    }

    /// Whether `player` is ever on turn.
    #[must_use]
    pub fn has_turn(&self, player: PlayerId) -> bool {
        self.turns.iter().any(|t| t.player == player)
    }
}

/// `"pass turn"` option.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PassTurn {
    #[default]
    Never,
    Always,
    /// Only when no other move exists.
    Forced,
}

/// Game options; unrecognised options are kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameOptions {
    pub pass_turn: PassTurn,
    pub recycle_captures: bool,
    pub other: Vec<(String, Value)>,
}

/// Initial placement of one piece type for one player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupDef {
    pub player: PlayerId,
    pub piece: Sym,
    pub positions: Vec<Sym>,
    /// Count placed in the off-board store.
    pub off: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GoalKind {
    Win,
    Loss,
    Draw,
}

/// A win, loss or draw condition for a list of players.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoalDef {
    pub kind: GoalKind,
    pub players: Vec<PlayerId>,
    pub block: BlockId,
}

/// Static definition of one game.
#[derive(Clone, Debug)]
pub struct GameDef {
    pub title: String,
    pub description: Option<String>,
    pub history: Option<String>,
    pub strategy: Option<String>,
    pub thumbnail: Option<String>,
    pub default: bool,
    pub variant: bool,
    /// Player names; `PlayerId(i)` is `players[i]`.
    pub players: Vec<Sym>,
    pub turn_order: TurnOrder,
    pub options: GameOptions,
    pub board: BoardDef,
    pub setup: Vec<SetupDef>,
    pub pieces: Vec<PieceDef>,
    pub goals: Vec<GoalDef>,
    pub move_priorities: Vec<Sym>,
    pub program: Arc<Program>,
}

impl GameDef {
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub fn player_id(&self, name: Sym) -> Option<PlayerId> {
        self.players
            .iter()
            .position(|p| *p == name)
            .and_then(PlayerId::from_index)
    }

    /// Name symbol of a player. Out-of-range ids map to a symbol that no
    /// program defines.
    #[must_use]
    pub fn player_sym(&self, player: PlayerId) -> Sym {
        self.players
            .get(player.index())
            .copied()
            .unwrap_or(Sym(u32::MAX))
    }

    #[must_use]
    pub fn piece(&self, name: Sym) -> Option<&PieceDef> {
        self.pieces.iter().find(|p| p.name == name)
    }

    /// Never on turn.
    #[must_use]
    pub fn is_neutral(&self, player: PlayerId) -> bool {
        !self.turn_order.has_turn(player)
    }

    /// Name of any symbol in this game's program.
    #[must_use]
    pub fn name(&self, sym: Sym) -> &str {
        self.program.interner().name(sym)
    }

    /// Rank of a move type in `move-priorities`; unlisted types rank last.
    #[must_use]
    pub fn priority(&self, move_type: Option<Sym>) -> usize {
        move_type
            .and_then(|t| self.move_priorities.iter().position(|p| *p == t))
            .unwrap_or(self.move_priorities.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn turn(p: u8) -> TurnDef {
        TurnDef {
            player: PlayerId::new(p),
            mover: PlayerId::new(p),
            move_type: None,
        }
    }

    #[test]
    fn test_round_robin() {
        let order = TurnOrder::round_robin(2);
        assert_eq!(order.turn(0).unwrap().player, PlayerId::new(0));
        assert_eq!(order.turn(3).unwrap().player, PlayerId::new(1));
    }

    #[test]
    fn test_empty_order_has_no_turns() {
        assert!(TurnOrder::new(vec![], 0).turn(0).is_none());
        assert!(TurnOrder::new(vec![], 0).turn(5).is_none());
    }

    #[test]
    fn test_has_turn() {
        let order = TurnOrder::new(vec![turn(0), turn(2)], 0);
        assert!(order.has_turn(PlayerId::new(2)));
        assert!(!order.has_turn(PlayerId::new(1)));
    }

    proptest! {
        #[test]
        fn prop_turn_cycles_from_repeat(len in 1usize..8, repeat_seed in 0usize..8, i in 0usize..200) {
            let repeat = repeat_seed % len;
            let turns: Vec<TurnDef> = (0..len as u8).map(turn).collect();
            let order = TurnOrder::new(turns.clone(), repeat);
            let got = order.turn(i).unwrap();
            let expected = if i < len {
                turns[i]
            } else {
                turns[repeat + (i - repeat) % (len - repeat)]
            };
            prop_assert_eq!(*got, expected);
            if i >= len {
                prop_assert!(order.turn(i).unwrap().player.index() >= repeat);
            }
        }
    }
}

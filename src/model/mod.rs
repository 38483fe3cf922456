//! Runtime models: boards, pieces, moves.
//!
//! Boards are immutable once stored in a `BoardArena`; their legal moves
//! and result are computed on first request and cached.
//!
//! - `piece`: a played piece with its attribute values
//! - `moves`: moves as ordered lists of parts
//! - `board`: board snapshots and the arena that owns them
//! - `movegen`: running piece programs to produce legal moves
//! - `goals`: the two-phase goal evaluator

pub mod board;
pub mod goals;
pub mod movegen;
pub mod moves;
pub mod piece;

pub use board::{ArenaMark, BoardArena, BoardId, BoardModel, Continuation};
pub use goals::Phase;
pub use movegen::{generate, legal_moves, MoveGenState};
pub use moves::{MoveKind, MoveModel, MovePart};
pub use piece::PieceModel;

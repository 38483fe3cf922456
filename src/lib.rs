//! # rust-abg
//!
//! A rule compiler and runtime for declaratively described abstract board
//! games.
//!
//! ## Design Principles
//!
//! 1. **Game-Agnostic**: No hardcoded boards, pieces or win conditions.
//!    Programs describe these and the engine runs them.
//!
//! 2. **N-Player First**: Turn orders, zones and goals name players; no API
//!    assumes two.
//!
//! 3. **No Move Selection**: The engine answers "what is legal", "what
//!    happens after move N" and "is the game over". Choosing moves belongs
//!    to collaborators behind `SearchHost`.
//!
//! ## Architecture
//!
//! - **Compile once**: program text is tokenized, preprocessed, macro
//!   expanded, parsed and compiled into a block arena of bytecode.
//!
//! - **Definitions by execution**: running the menu and definition blocks
//!   against builder hosts yields immutable `GameDef`s.
//!
//! - **Persistent Data Structures**: boards share structure through
//!   `im-rs` maps and live in an append-only arena; legal moves and results
//!   are computed once per board.
//!
//! ## Modules
//!
//! - `core`: values and interning, players, RNG, configuration, diagnostics
//! - `error`: load, execution and engine errors
//! - `lang`: tokenizer, preprocessor, macros, parser, symbol table
//! - `compile`: built-in table, bytecode and the compiler
//! - `vm`: the bytecode evaluator and its host interface
//! - `defs`: static board, piece and game definitions
//! - `model`: runtime boards, moves, move generation and goals
//! - `rules`: game results and the search collaborator contract
//! - `session`: the host-facing query and command surface

pub mod core;
pub mod error;
pub mod lang;
pub mod compile;
pub mod vm;
pub mod defs;
pub mod model;
pub mod rules;
pub mod session;

// Re-export commonly used types
pub use crate::core::{
    DataType, Diagnostics, EngineConfig, GameRng, GameRngState, Interner, PlayerId, Sym, Value,
};

pub use crate::error::{EngineError, ExecError, LoadError, SourcePos};

pub use crate::lang::{FsLoader, MemoryLoader, SourceLoader};

pub use crate::compile::{load_program, BlockId, Op, Program};

pub use crate::vm::{Flow, Host, Machine, Operand, Outcome};

pub use crate::defs::{
    build_menu, BoardDef, GameDef, GoalKind, Menu, MenuEntry, PassTurn, PieceDef, TurnDef,
    TurnOrder,
};

pub use crate::model::{
    ArenaMark, BoardArena, BoardId, BoardModel, MoveKind, MoveModel, MovePart, PieceModel,
};

pub use crate::rules::{GameResult, SearchHost};

pub use crate::session::{GameLoader, GameSession};

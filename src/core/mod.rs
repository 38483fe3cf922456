//! Core engine types: values, players, RNG, configuration, diagnostics.
//!
//! These are the leaf building blocks shared by the compiler, the
//! evaluator and the runtime models.

pub mod value;
pub mod player;
pub mod rng;
pub mod config;
pub mod diag;

pub use value::{DataType, Interner, Sym, Value};
pub use player::PlayerId;
pub use rng::{GameRng, GameRngState};
pub use config::EngineConfig;
pub use diag::Diagnostics;

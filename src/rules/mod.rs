//! Results and the search collaborator contract.
//!
//! Search collaborators implement nothing here; they call into a
//! `SearchHost` and never interpret game-specific concepts directly.

pub mod engine;

pub use engine::{GameResult, SearchHost};

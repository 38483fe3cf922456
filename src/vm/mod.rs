//! Bytecode evaluator.

pub mod args;
pub mod machine;

pub use args::Args;
pub use machine::{Flow, Host, Machine, Operand, Outcome};

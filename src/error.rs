//! Error types.
//!
//! # Error Tiers
//!
//! 1. **Load-time** ([`LoadError`]): lexical, syntactic and semantic failures.
//!    The whole program is rejected; no partially compiled game exists.
//! 2. **Internal consistency** ([`ExecError`]): a compiled program or the
//!    engine is defective (bad jump, stack underflow, a host asked to run an
//!    operation it does not implement, a move part that does not match the
//!    board). Processing stops.
//! 3. **Generation control flow**: a failed `verify` or an off-board step.
//!    This is `vm::Flow::Stop`, not an error.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Source location of a token or node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourcePos {
    /// File name (or `"<input>"` for in-memory text).
    pub file: Arc<str>,
    /// 1-based line.
    pub line: u32,
}

impl SourcePos {
    /// Create a position.
    #[must_use]
    pub fn new(file: Arc<str>, line: u32) -> Self {
        Self { file, line }
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One rejected token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexDiagnostic {
    pub pos: SourcePos,
    pub message: String,
}

impl std::fmt::Display for LexDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

/// Load-time failure. Aborts the whole program.
#[derive(Debug, Error)]
pub enum LoadError {
    /// One or more bad tokens. All of them are collected before failing.
    #[error("{} lexical error(s), first at {}", .errors.len(), first_lex(.errors))]
    Lexical { errors: Vec<LexDiagnostic> },

    /// Malformed program structure.
    #[error("syntax error at {pos}: {message}")]
    Syntax { pos: SourcePos, message: String },

    /// Type mismatch or incompatible redefinition.
    #[error("type error at {pos}: {message}")]
    Type { pos: SourcePos, message: String },

    /// An `#include` could not be read.
    #[error("cannot include {}: {source}", .path.display())]
    Include {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compiled program produced an inconsistent definition.
    #[error("invalid game definition: {message}")]
    Definition { message: String },

    /// Running top-level code failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

fn first_lex(errors: &[LexDiagnostic]) -> String {
    errors.first().map_or_else(String::new, ToString::to_string)
}

impl LoadError {
    pub(crate) fn syntax(pos: &SourcePos, message: impl Into<String>) -> Self {
        Self::Syntax {
            pos: pos.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn type_error(pos: &SourcePos, message: impl Into<String>) -> Self {
        Self::Type {
            pos: pos.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn definition(message: impl Into<String>) -> Self {
        Self::Definition {
            message: message.into(),
        }
    }
}

/// Internal-consistency failure while executing compiled code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("stack underflow in block {block} at {pc}")]
    StackUnderflow { block: u32, pc: usize },

    #[error("jump target {target} outside block {block} (len {len})")]
    BadJump { block: u32, target: usize, len: usize },

    #[error("unknown block {0}")]
    UnknownBlock(u32),

    #[error("operand mismatch for {op}: {message}")]
    Operand { op: &'static str, message: String },

    #[error("{op} is not supported in {context} code")]
    Unsupported { op: &'static str, context: &'static str },

    #[error("unknown {kind} '{name}'")]
    UnknownSymbol { kind: &'static str, name: String },

    #[error("inconsistent board: {0}")]
    Inconsistent(String),
}

impl ExecError {
    pub(crate) fn operand(op: &'static str, message: impl Into<String>) -> Self {
        Self::Operand {
            op,
            message: message.into(),
        }
    }
}

/// Failure of a host-facing command.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("move index {index} out of range ({count} legal moves)")]
    InvalidMove { index: usize, count: usize },

    #[error("no game variant {0}")]
    NoVariant(usize),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

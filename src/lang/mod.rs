//! Front end: tokens, directives, macros, the node tree and symbols.
//!
//! ```text
//! text ──tokenize──▶ tokens ──preprocess──▶ tokens ──parse/expand──▶ nodes
//! ```

pub mod token;
pub mod lexer;
pub mod preprocess;
pub mod macros;
pub mod parser;
pub mod symbols;

pub use lexer::{tokenize, Lexed};
pub use parser::{parse, Node};
pub use preprocess::{load_tokens, preprocess_source, FsLoader, MemoryLoader, SourceLoader};
pub use symbols::{Keyword, ScopeId, Symbol, SymbolKind, SymbolTable};
pub use token::{Token, TokenKind};

//! Compiler: built-in table, bytecode, aggregates and the load pipeline.
//!
//! ```text
//! source ──load_tokens──▶ tokens ──parse──▶ nodes ──merge_variants──▶ nodes
//!        ──Compiler──▶ Program
//! ```

pub mod builtins;
pub mod bytecode;
pub mod compiler;
pub mod aggregates;
pub mod variant;

pub use aggregates::{grid_indices, grid_position_names, Occupant};
pub use builtins::{BuiltinId, BuiltinSpec, Context, Op, Param, BUILTINS};
pub use bytecode::{BlockId, CodeBlock, Instr, Program, ProgramBuilder};
pub use compiler::Compiler;
pub use variant::merge_variants;

use crate::core::diag::{LEVEL_SUMMARY, LEVEL_TRACE};
use crate::core::{Diagnostics, EngineConfig, Interner};
use crate::error::LoadError;
use crate::lang::parser::parse;
use crate::lang::preprocess::{load_tokens, SourceLoader};
use crate::lang::symbols::SymbolTable;

/// Load, preprocess, parse and compile one program.
///
/// `diag` starts at the configured level and may be raised by `#noisy`.
pub fn load_program(
    loader: &dyn SourceLoader,
    path: &str,
    config: &EngineConfig,
    diag: &mut Diagnostics,
) -> Result<Program, LoadError> {
    let tokens = load_tokens(loader, path, config, diag)?;

    let mut interner = Interner::new();
    let mut symbols = SymbolTable::new(&mut interner);
    let nodes = parse(tokens, &mut symbols, &mut interner, config, *diag)?;
    let nodes = merge_variants(nodes, &interner)?;

    let mut compiler = Compiler::new(&mut symbols, &mut interner, *diag);
    let entry = compiler.compile_menu(&nodes)?;
    let builder = compiler.into_builder();
    let program = builder.finish(entry, interner)?;

    if diag.enabled(LEVEL_SUMMARY) {
        tracing::debug!(path, blocks = program.len(), symbols = program.interner().len(), "compiled");
    }
    if diag.enabled(LEVEL_TRACE) {
        for index in 0..program.len() {
            if let Ok(listing) = program.disassemble(BlockId(index as u32)) {
                tracing::trace!("{listing}");
            }
        }
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Value};
    use crate::lang::preprocess::MemoryLoader;

    fn compile(text: &str) -> Result<Program, LoadError> {
        let loader = MemoryLoader::new().with_file("main.zrf", text);
        let mut diag = Diagnostics::quiet();
        load_program(&loader, "main.zrf", &EngineConfig::default(), &mut diag)
    }

    fn listing(program: &Program) -> String {
        (0..program.len())
            .map(|i| program.disassemble(BlockId(i as u32)).unwrap())
            .collect()
    }

    const SMALL: &str = r#"
        (game
          (title "Small")
          (players A B)
          (turn-order A B)
          (board (grid (dimensions ("a/b" (1 0)) ("2/1" (0 1)))
                       (directions (e 1 0) (n 0 -1))))
          (piece (name Stone) (drops ((verify empty?) add)))
          (win-condition (A B) (relative-config Stone e Stone)))
    "#;

    #[test]
    fn test_compile_small_game() {
        let program = compile(SMALL).unwrap();
        let text = listing(&program);
        assert!(text.contains("call players 1"));
        assert!(text.contains("call empty? 0"));
        assert!(text.contains("call verify 1"));
        assert!(text.contains("call relative-config 1"));
    }

    #[test]
    fn test_board_compiled_before_pieces() {
        // setup and pieces come before players and board in source order
        let text = r#"
            (game
              (board-setup (A (P a1)))
              (piece (name P))
              (board (positions (a1 0 0 10 10)))
              (players A))
        "#;
        let program = compile(text).unwrap();
        let a1 = program.interner().get("a1").unwrap();
        assert!(listing(&program).contains("literal a1"));
        assert_eq!(Value::Position(a1).data_type(), DataType::Position);
    }

    #[test]
    fn test_type_conflict_is_reported_with_line() {
        let text = "(game\n (players A)\n (piece (name A)))";
        match compile(text) {
            Err(LoadError::Type { pos, message }) => {
                assert_eq!(pos.line, 3);
                assert!(message.contains("'A'"), "{message}");
            }
            other => panic!("expected type error, got {other:?}"),
        }
    }

    #[test]
    fn test_and_or_short_circuit_shape() {
        let text = r#"
            (game (players A) (board (positions (a1)))
              (piece (name P)
                (moves ((verify (and empty? (not friend?))) add))))
        "#;
        let program = compile(text).unwrap();
        let text = listing(&program);
        assert!(text.contains("jump-if-false"));
        assert!(text.contains("call friend? 0"));
    }

    #[test]
    fn test_if_else_and_while() {
        let text = r#"
            (game (players A)
              (board (grid (dimensions ("a/b/c" (1 0)) ("1" (0 1))) (directions (e 1 0))))
              (piece (name P)
                (moves ((while (on-board? e) e) (if empty? add else (verify false))))))
        "#;
        let program = compile(text).unwrap();
        let text = listing(&program);
        assert!(text.contains("call step 1"));
        assert!(text.contains("call on-board? 1"));
        assert!(text.contains("jump 0"));
    }

    #[test]
    fn test_flags_and_attributes() {
        let text = r#"
            (game (players A) (board (positions (a1)))
              (piece (name P) (attribute never-moved true)
                (moves ((set-flag seen never-moved?)
                        (verify (flag? seen))
                        (set-attribute never-moved false)
                        add))))
        "#;
        let program = compile(text).unwrap();
        let text = listing(&program);
        assert!(text.contains("store seen"));
        assert!(text.contains("load seen"));
        assert!(text.contains("call attribute? 1"));
    }

    #[test]
    fn test_unknown_statement() {
        let text = "(game (players A) (frobnicate 1))";
        assert!(matches!(compile(text), Err(LoadError::Syntax { .. })));
    }

    #[test]
    fn test_non_game_top_level() {
        assert!(matches!(compile("(title \"x\")"), Err(LoadError::Syntax { .. })));
    }
}

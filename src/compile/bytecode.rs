//! Instructions, code blocks and compiled programs.
//!
//! A `Program` is an arena of `CodeBlock`s. The entry block holds the menu
//! code; every nested body (a game, a board, a piece's move program, a goal
//! expression) is its own block referenced by `BlockId`, so a move program
//! can be stored in a definition and run once per start position.
//!
//! Jump targets are indices into the same block, in `0..=len`; `len`
//! means "fall off the end".

use serde::{Deserialize, Serialize};

use super::builtins::{Context, Op};
use crate::core::{Interner, Sym, Value};
use crate::error::ExecError;

/// Index of a block in its program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One instruction with typed operands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    /// Push a constant.
    Literal(Value),
    /// Push a flag; unset flags read as `false`.
    LoadVar(Sym),
    /// Pop a value into a flag.
    StoreVar(Sym),
    /// Pop `n` operands and push them as one list, in push order.
    MakeList(u16),
    /// Pop `argc` operands and hand them to the host.
    Call { op: Op, argc: u16 },
    /// Pop a boolean, push its negation.
    Not,
    Jump(usize),
    /// Pop a boolean; jump when it is false.
    JumpIfFalse(usize),
    /// Pop a boolean; jump when it is true.
    JumpIfTrue(usize),
    /// Push a handle to a nested block for the host to store or run.
    NewScope { context: Context, block: BlockId },
}

impl Instr {
    fn jump_target(&self) -> Option<usize> {
        match self {
            Instr::Jump(t) | Instr::JumpIfFalse(t) | Instr::JumpIfTrue(t) => Some(*t),
            _ => None,
        }
    }
}

/// A straight-line instruction stream for one context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeBlock {
    pub context: Context,
    pub code: Vec<Instr>,
}

/// A compiled program: block arena, entry block and the symbol names.
#[derive(Clone, Debug)]
pub struct Program {
    blocks: Vec<CodeBlock>,
    entry: BlockId,
    interner: Interner,
}

impl Program {
    /// The menu block.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Look up a block.
    pub fn block(&self, id: BlockId) -> Result<&CodeBlock, ExecError> {
        self.blocks.get(id.0 as usize).ok_or(ExecError::UnknownBlock(id.0))
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Names of every symbol the program mentions.
    #[must_use]
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Human-readable listing of one block.
    pub fn disassemble(&self, id: BlockId) -> Result<String, ExecError> {
        let block = self.block(id)?;
        let mut out = format!("block {id} ({})\n", block.context);
        for (pc, instr) in block.code.iter().enumerate() {
            let text = match instr {
                Instr::Literal(v) => format!("literal {}", v.display(&self.interner)),
                Instr::LoadVar(s) => format!("load {}", self.interner.name(*s)),
                Instr::StoreVar(s) => format!("store {}", self.interner.name(*s)),
                Instr::MakeList(n) => format!("list {n}"),
                Instr::Call { op, argc } => format!("call {} {argc}", op.name()),
                Instr::Not => "not".to_string(),
                Instr::Jump(t) => format!("jump {t}"),
                Instr::JumpIfFalse(t) => format!("jump-if-false {t}"),
                Instr::JumpIfTrue(t) => format!("jump-if-true {t}"),
                Instr::NewScope { context, block } => format!("scope {context} {block}"),
            };
            out.push_str(&format!("{pc:4} {text}\n"));
        }
        Ok(out)
    }

    /// Check that every jump lands inside its block and every scope handle
    /// names an existing block.
    pub fn validate(&self) -> Result<(), ExecError> {
        for (index, block) in self.blocks.iter().enumerate() {
            let len = block.code.len();
            for instr in &block.code {
                if let Some(target) = instr.jump_target() {
                    if target > len {
                        return Err(ExecError::BadJump {
                            block: index as u32,
                            target,
                            len,
                        });
                    }
                }
                if let Instr::NewScope { block: nested, .. } = instr {
                    self.block(*nested)?;
                }
            }
        }
        Ok(())
    }
}

/// Incrementally built block arena.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    blocks: Vec<CodeBlock>,
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty block.
    pub fn new_block(&mut self, context: Context) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(CodeBlock {
            context,
            code: Vec::new(),
        });
        id
    }

    /// Append an instruction, returning its index.
    pub fn emit(&mut self, block: BlockId, instr: Instr) -> usize {
        let code = &mut self.blocks[block.0 as usize].code;
        code.push(instr);
        code.len() - 1
    }

    /// Index the next emitted instruction will get.
    #[must_use]
    pub fn here(&self, block: BlockId) -> usize {
        self.blocks[block.0 as usize].code.len()
    }

    /// Point the jump at `at` to `target`.
    pub fn patch(&mut self, block: BlockId, at: usize, target: usize) {
        match &mut self.blocks[block.0 as usize].code[at] {
            Instr::Jump(t) | Instr::JumpIfFalse(t) | Instr::JumpIfTrue(t) => *t = target,
            other => debug_assert!(false, "patching non-jump {other:?}"),
        }
    }

    /// Seal the arena into a validated program.
    pub fn finish(self, entry: BlockId, interner: Interner) -> Result<Program, ExecError> {
        let program = Program {
            blocks: self.blocks,
            entry,
            interner,
        };
        program.validate()?;
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_forward_jump() {
        let mut builder = ProgramBuilder::new();
        let block = builder.new_block(Context::Move);
        builder.emit(block, Instr::Literal(Value::Bool(true)));
        let jump = builder.emit(block, Instr::JumpIfFalse(usize::MAX));
        builder.emit(block, Instr::Call { op: Op::Add, argc: 0 });
        let end = builder.here(block);
        builder.patch(block, jump, end);

        let program = builder.finish(block, Interner::new()).unwrap();
        assert_eq!(program.block(block).unwrap().code[1], Instr::JumpIfFalse(3));
        assert!(program.disassemble(block).unwrap().contains("jump-if-false 3"));
    }

    #[test]
    fn test_validate_rejects_bad_jump() {
        let mut builder = ProgramBuilder::new();
        let block = builder.new_block(Context::Move);
        builder.emit(block, Instr::Jump(7));
        let err = builder.finish(block, Interner::new()).unwrap_err();
        assert_eq!(err, ExecError::BadJump { block: 0, target: 7, len: 1 });
    }

    #[test]
    fn test_validate_rejects_unknown_block() {
        let mut builder = ProgramBuilder::new();
        let block = builder.new_block(Context::Menu);
        builder.emit(
            block,
            Instr::NewScope {
                context: Context::Game,
                block: BlockId(9),
            },
        );
        assert_eq!(
            builder.finish(block, Interner::new()).unwrap_err(),
            ExecError::UnknownBlock(9)
        );
    }
}

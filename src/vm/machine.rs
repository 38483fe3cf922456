//! Stack machine.
//!
//! Executes one block at a time against a `Host`. The machine owns the
//! operand stack and the flag variables; everything domain-specific is the
//! host's business.
//!
//! ## Control flow
//!
//! - Jumps are absolute indices into the running block.
//! - A host answering `Flow::Stop` ends the block run. This is how a failed
//!   `verify` or an off-board step abandons one move program without
//!   affecting anything else; it is not an error.
//! - Falling off the end of the block finishes the run; whatever is left on
//!   top of the stack is the block's result.

use rustc_hash::FxHashMap;

use crate::compile::builtins::Op;
use crate::compile::bytecode::{BlockId, Instr, Program};
use crate::core::diag::LEVEL_TRACE;
use crate::core::{Diagnostics, Sym, Value};
use crate::error::ExecError;

/// A stack entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Value(Value),
    List(Vec<Operand>),
    /// Deferred nested block.
    Block(BlockId),
}

impl Operand {
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Operand::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Operand]> {
        match self {
            Operand::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_block(&self) -> Option<BlockId> {
        match self {
            Operand::Block(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }

    /// Symbol of an identifier value.
    #[must_use]
    pub fn sym(&self) -> Option<Sym> {
        self.as_value().and_then(Value::sym)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

/// A host's answer to a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Push(Value),
    /// Abandon the current block run.
    Stop,
}

/// How a block run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Ran to the end; carries the top of the stack, if any.
    Finished(Option<Operand>),
    Stopped,
}

impl Outcome {
    /// Boolean result of an expression block. A stopped run is `false`.
    pub fn truth(&self, op: &'static str) -> Result<bool, ExecError> {
        match self {
            Outcome::Stopped => Ok(false),
            Outcome::Finished(Some(top)) => top
                .as_bool()
                .ok_or_else(|| ExecError::operand(op, "expression did not produce a boolean")),
            Outcome::Finished(None) => Err(ExecError::operand(op, "expression produced nothing")),
        }
    }
}

/// Implemented once per DSL context.
pub trait Host {
    /// Execute one built-in. `args` are in push order.
    fn call(&mut self, op: Op, args: Vec<Operand>) -> Result<Flow, ExecError>;
}

/// Bytecode interpreter bound to one program.
#[derive(Debug)]
pub struct Machine<'p> {
    program: &'p Program,
    vars: FxHashMap<Sym, Value>,
    diag: Diagnostics,
}

impl<'p> Machine<'p> {
    #[must_use]
    pub fn new(program: &'p Program, diag: Diagnostics) -> Self {
        Self {
            program,
            vars: FxHashMap::default(),
            diag,
        }
    }

    /// Current value of a flag.
    #[must_use]
    pub fn var(&self, name: Sym) -> Value {
        self.vars.get(&name).cloned().unwrap_or(Value::Bool(false))
    }

    /// Run `block` to completion or until the host stops it.
    pub fn run(&mut self, block: BlockId, host: &mut dyn Host) -> Result<Outcome, ExecError> {
        let program = self.program;
        let code = &program.block(block)?.code;
        let mut stack: Vec<Operand> = Vec::new();
        let mut pc = 0;

        while pc < code.len() {
            let instr = &code[pc];
            if self.diag.enabled(LEVEL_TRACE) {
                tracing::trace!(block = block.0, pc, depth = stack.len(), ?instr, "exec");
            }
            pc += 1;
            match instr {
                Instr::Literal(v) => stack.push(Operand::Value(v.clone())),
                Instr::LoadVar(name) => stack.push(Operand::Value(self.var(*name))),
                Instr::StoreVar(name) => {
                    let value = pop(&mut stack, block, pc)?;
                    let value = value
                        .as_value()
                        .cloned()
                        .ok_or_else(|| ExecError::operand("set-flag", "flag value must be scalar"))?;
                    self.vars.insert(*name, value);
                }
                Instr::MakeList(n) => {
                    let n = *n as usize;
                    if stack.len() < n {
                        return Err(ExecError::StackUnderflow { block: block.0, pc });
                    }
                    let items = stack.split_off(stack.len() - n);
                    stack.push(Operand::List(items));
                }
                Instr::Call { op, argc } => {
                    let argc = *argc as usize;
                    if stack.len() < argc {
                        return Err(ExecError::StackUnderflow { block: block.0, pc });
                    }
                    let args = stack.split_off(stack.len() - argc);
                    match host.call(*op, args)? {
                        Flow::Continue => {}
                        Flow::Push(v) => stack.push(Operand::Value(v)),
                        Flow::Stop => {
                            if self.diag.enabled(LEVEL_TRACE) {
                                tracing::trace!(block = block.0, pc, op = op.name(), "stop");
                            }
                            return Ok(Outcome::Stopped);
                        }
                    }
                }
                Instr::Not => {
                    let value = pop_bool(&mut stack, block, pc, "not")?;
                    stack.push(Operand::Value(Value::Bool(!value)));
                }
                Instr::Jump(target) => pc = checked(*target, code.len(), block)?,
                Instr::JumpIfFalse(target) => {
                    if !pop_bool(&mut stack, block, pc, "if")? {
                        pc = checked(*target, code.len(), block)?;
                    }
                }
                Instr::JumpIfTrue(target) => {
                    if pop_bool(&mut stack, block, pc, "or")? {
                        pc = checked(*target, code.len(), block)?;
                    }
                }
                Instr::NewScope { block: nested, .. } => stack.push(Operand::Block(*nested)),
            }
        }
        Ok(Outcome::Finished(stack.pop()))
    }
}

fn pop(stack: &mut Vec<Operand>, block: BlockId, pc: usize) -> Result<Operand, ExecError> {
    stack
        .pop()
        .ok_or(ExecError::StackUnderflow { block: block.0, pc })
}

fn pop_bool(
    stack: &mut Vec<Operand>,
    block: BlockId,
    pc: usize,
    op: &'static str,
) -> Result<bool, ExecError> {
    pop(stack, block, pc)?
        .as_bool()
        .ok_or_else(|| ExecError::operand(op, "expected a boolean"))
}

fn checked(target: usize, len: usize, block: BlockId) -> Result<usize, ExecError> {
    if target > len {
        Err(ExecError::BadJump {
            block: block.0,
            target,
            len,
        })
    } else {
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::builtins::Context;
    use crate::compile::bytecode::ProgramBuilder;
    use crate::core::Interner;

    /// Records calls; `Empty` answers from a script, `Verify` stops on false.
    struct Recorder {
        answers: Vec<bool>,
        calls: Vec<(Op, Vec<Operand>)>,
    }

    impl Host for Recorder {
        fn call(&mut self, op: Op, args: Vec<Operand>) -> Result<Flow, ExecError> {
            self.calls.push((op, args.clone()));
            match op {
                Op::Empty => Ok(Flow::Push(Value::Bool(self.answers.remove(0)))),
                Op::Verify if args[0].as_bool() == Some(false) => Ok(Flow::Stop),
                _ => Ok(Flow::Continue),
            }
        }
    }

    fn build(code: Vec<Instr>) -> (Program, BlockId) {
        let mut builder = ProgramBuilder::new();
        let block = builder.new_block(Context::Move);
        for instr in code {
            builder.emit(block, instr);
        }
        (builder.finish(block, Interner::new()).unwrap(), block)
    }

    #[test]
    fn test_unset_flag_reads_false() {
        let (program, block) = build(vec![Instr::LoadVar(Sym(4))]);
        let mut machine = Machine::new(&program, Diagnostics::quiet());
        let mut host = Recorder { answers: vec![], calls: vec![] };
        let outcome = machine.run(block, &mut host).unwrap();
        assert_eq!(outcome, Outcome::Finished(Some(Operand::Value(Value::Bool(false)))));
    }

    #[test]
    fn test_store_and_load_flag() {
        let (program, block) = build(vec![
            Instr::Literal(Value::Bool(true)),
            Instr::StoreVar(Sym(1)),
            Instr::LoadVar(Sym(1)),
            Instr::Not,
        ]);
        let mut machine = Machine::new(&program, Diagnostics::quiet());
        let mut host = Recorder { answers: vec![], calls: vec![] };
        let outcome = machine.run(block, &mut host).unwrap();
        assert_eq!(outcome.truth("test"), Ok(false));
        assert_eq!(machine.var(Sym(1)), Value::Bool(true));
    }

    #[test]
    fn test_stop_ends_block_without_error() {
        let (program, block) = build(vec![
            Instr::Literal(Value::Bool(false)),
            Instr::Call { op: Op::Verify, argc: 1 },
            Instr::Call { op: Op::Add, argc: 0 },
        ]);
        let mut machine = Machine::new(&program, Diagnostics::quiet());
        let mut host = Recorder { answers: vec![], calls: vec![] };
        assert_eq!(machine.run(block, &mut host).unwrap(), Outcome::Stopped);
        assert_eq!(host.calls.len(), 1);
    }

    #[test]
    fn test_while_loop_with_backward_jump() {
        // while (empty?) add
        let (program, block) = build(vec![
            Instr::Call { op: Op::Empty, argc: 0 },
            Instr::JumpIfFalse(4),
            Instr::Call { op: Op::Add, argc: 0 },
            Instr::Jump(0),
        ]);
        let mut machine = Machine::new(&program, Diagnostics::quiet());
        let mut host = Recorder {
            answers: vec![true, true, false],
            calls: vec![],
        };
        machine.run(block, &mut host).unwrap();
        let adds = host.calls.iter().filter(|(op, _)| *op == Op::Add).count();
        assert_eq!(adds, 2);
    }

    #[test]
    fn test_make_list_preserves_order() {
        let (program, block) = build(vec![
            Instr::Literal(Value::from(1i64)),
            Instr::Literal(Value::from(2i64)),
            Instr::MakeList(2),
            Instr::Call { op: Op::Add, argc: 1 },
        ]);
        let mut machine = Machine::new(&program, Diagnostics::quiet());
        let mut host = Recorder { answers: vec![], calls: vec![] };
        machine.run(block, &mut host).unwrap();
        assert_eq!(
            host.calls[0].1,
            vec![Operand::List(vec![
                Operand::Value(Value::from(1i64)),
                Operand::Value(Value::from(2i64)),
            ])]
        );
    }

    #[test]
    fn test_underflow_and_type_errors() {
        let (program, block) = build(vec![Instr::Call { op: Op::Add, argc: 2 }]);
        let mut machine = Machine::new(&program, Diagnostics::quiet());
        let mut host = Recorder { answers: vec![], calls: vec![] };
        assert!(matches!(
            machine.run(block, &mut host),
            Err(ExecError::StackUnderflow { .. })
        ));

        let (program, block) = build(vec![Instr::Literal(Value::from(1i64)), Instr::Not]);
        let mut machine = Machine::new(&program, Diagnostics::quiet());
        assert!(matches!(machine.run(block, &mut host), Err(ExecError::Operand { .. })));
    }
}

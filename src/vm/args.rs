//! Typed access to a call's operands.
//!
//! Hosts receive operands in push order. Optional parameters are matched by
//! tag at compile time, so a host inspects tags rather than positions when a
//! built-in has optional slots.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::machine::Operand;
use crate::compile::builtins::Op;
use crate::compile::bytecode::BlockId;
use crate::core::{DataType, Sym, Value};
use crate::error::ExecError;

/// Borrowed operand list of one call.
#[derive(Clone, Copy, Debug)]
pub struct Args<'a> {
    op: Op,
    items: &'a [Operand],
}

impl<'a> Args<'a> {
    #[must_use]
    pub fn new(op: Op, items: &'a [Operand]) -> Self {
        Self { op, items }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn error(&self, message: impl Into<String>) -> ExecError {
        ExecError::operand(self.op.name(), message)
    }

    pub fn operand(&self, i: usize) -> Result<&'a Operand, ExecError> {
        self.items
            .get(i)
            .ok_or_else(|| self.error(format!("missing operand {i}")))
    }

    pub fn value(&self, i: usize) -> Result<&'a Value, ExecError> {
        self.operand(i)?
            .as_value()
            .ok_or_else(|| self.error(format!("operand {i} is not a value")))
    }

    pub fn list(&self, i: usize) -> Result<&'a [Operand], ExecError> {
        self.operand(i)?
            .as_list()
            .ok_or_else(|| self.error(format!("operand {i} is not a list")))
    }

    pub fn block(&self, i: usize) -> Result<BlockId, ExecError> {
        self.operand(i)?
            .as_block()
            .ok_or_else(|| self.error(format!("operand {i} is not a block")))
    }

    pub fn text(&self, i: usize) -> Result<&'a str, ExecError> {
        self.value(i)?
            .as_text()
            .ok_or_else(|| self.error(format!("operand {i} is not text")))
    }

    pub fn number(&self, i: usize) -> Result<Decimal, ExecError> {
        self.value(i)?
            .as_number()
            .ok_or_else(|| self.error(format!("operand {i} is not a number")))
    }

    pub fn bool(&self, i: usize) -> Result<bool, ExecError> {
        self.value(i)?
            .as_bool()
            .ok_or_else(|| self.error(format!("operand {i} is not a boolean")))
    }

    /// Identifier operand of the given kind.
    pub fn sym(&self, i: usize, kind: DataType) -> Result<Sym, ExecError> {
        let value = self.value(i)?;
        match value.sym() {
            Some(sym) if kind.accepts(value.data_type()) => Ok(sym),
            _ => Err(self.error(format!("operand {i} is not a {kind}"))),
        }
    }

    /// First operand whose value has a type accepted by `kind`.
    #[must_use]
    pub fn find(&self, kind: DataType) -> Option<&'a Value> {
        self.find_after(0, kind)
    }

    /// Like [`Self::find`], ignoring the first `skip` operands.
    #[must_use]
    pub fn find_after(&self, skip: usize, kind: DataType) -> Option<&'a Value> {
        self.items
            .iter()
            .skip(skip)
            .filter_map(Operand::as_value)
            .find(|v| kind.accepts(v.data_type()))
    }
}

/// Read a numeric operand as a small integer.
pub fn to_i32(n: Decimal, op: Op) -> Result<i32, ExecError> {
    n.to_i32()
        .ok_or_else(|| ExecError::operand(op.name(), format!("{n} is out of range")))
}

/// Read a numeric operand as a count.
pub fn to_u32(n: Decimal, op: Op) -> Result<u32, ExecError> {
    n.to_u32()
        .ok_or_else(|| ExecError::operand(op.name(), format!("{n} is not a count")))
}

/// View a nested list operand as `Args` for the same op.
pub fn nested(op: Op, operand: &Operand) -> Result<Args<'_>, ExecError> {
    operand
        .as_list()
        .map(|items| Args::new(op, items))
        .ok_or_else(|| ExecError::operand(op.name(), "expected a list"))
}

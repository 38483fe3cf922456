//! Type-directed recursive-descent compiler.
//!
//! Walks the node tree once. Each list whose head names a built-in is
//! compiled against that built-in's static signature: every parameter kind
//! knows how many nodes it consumes and what it leaves on the stack. Typed
//! slots define unknown identifiers on first sight, so a position can be
//! mentioned before or after the grid that creates it as long as every use
//! agrees on its type.
//!
//! ## Control constructs
//!
//! ```text
//! (if c s... else e...)   c; JumpIfFalse E; s...; Jump END; E: e...; END:
//! (while c s...)          TOP: c; JumpIfFalse END; s...; Jump TOP; END:
//! (and a b)               a; JumpIfFalse F; b; JumpIfFalse F;
//!                         false; Jump END; F: true; END: Not
//! (or a b)                a; JumpIfTrue T; b; JumpIfTrue T;
//!                         true; Jump END; T: false; END: Not
//! ```

use super::builtins::{BuiltinId, Context, Op, Param};
use super::bytecode::{BlockId, Instr, ProgramBuilder};
use crate::core::diag::LEVEL_DETAIL;
use crate::core::{DataType, Diagnostics, Interner, Sym, Value};
use crate::error::{LoadError, SourcePos};
use crate::lang::parser::Node;
use crate::lang::symbols::{Keyword, SymbolKind, SymbolTable};

/// Compiler state for one program.
pub struct Compiler<'a> {
    pub(super) builder: ProgramBuilder,
    pub(super) symbols: &'a mut SymbolTable,
    pub(super) interner: &'a mut Interner,
    diag: Diagnostics,
}

/// What an identifier denotes at a use site.
enum Resolved {
    Literal(Value),
    Value(DataType),
    Variable,
    Builtin(BuiltinId),
    Keyword(Keyword),
    Unknown,
}

impl<'a> Compiler<'a> {
    pub fn new(symbols: &'a mut SymbolTable, interner: &'a mut Interner, diag: Diagnostics) -> Self {
        Self {
            builder: ProgramBuilder::new(),
            symbols,
            interner,
            diag,
        }
    }

    /// Compile the top-level forms into the menu block.
    pub fn compile_menu(&mut self, nodes: &[Node]) -> Result<BlockId, LoadError> {
        let block = self.builder.new_block(Context::Menu);
        self.symbols.push_context(Context::Menu);
        let result = nodes.iter().try_for_each(|node| {
            let is_entry = node
                .head()
                .map(|head| matches!(self.interner.name(head), "game" | "variant"))
                .unwrap_or(false);
            if !is_entry {
                return Err(LoadError::syntax(node.pos(), "expected (game ...) or (variant ...)"));
            }
            self.symbols.new_user_scope();
            self.statement(block, Context::Menu, node)
        });
        self.symbols.pop_context();
        result?;
        Ok(block)
    }

    /// Seal the block arena.
    pub fn into_builder(self) -> ProgramBuilder {
        self.builder
    }

    /// Compile `nodes` as the body of a nested block.
    pub(super) fn compile_block(
        &mut self,
        context: Context,
        nodes: &[Node],
        pos: &SourcePos,
    ) -> Result<BlockId, LoadError> {
        let block = self.builder.new_block(context);
        self.symbols.push_context(context);
        let result = match context {
            Context::Goal => self.goal_body(block, nodes, pos),
            Context::Game => {
                // Players and board first so later clauses see their names.
                let mut ordered: Vec<&Node> = nodes.iter().collect();
                ordered.sort_by_key(|node| {
                    match node.head().map(|h| self.interner.name(h)) {
                        Some("players") => 0,
                        Some("board") => 1,
                        _ => 2,
                    }
                });
                ordered
                    .into_iter()
                    .try_for_each(|node| self.statement(block, context, node))
            }
            _ => nodes
                .iter()
                .try_for_each(|node| self.statement(block, context, node)),
        };
        self.symbols.pop_context();
        result?;
        if self.diag.enabled(LEVEL_DETAIL) {
            tracing::debug!(block = block.0, %context, len = self.builder.here(block), "compiled block");
        }
        Ok(block)
    }

    fn goal_body(&mut self, block: BlockId, nodes: &[Node], pos: &SourcePos) -> Result<(), LoadError> {
        match nodes {
            [] => Err(LoadError::syntax(pos, "empty goal condition")),
            [single] => self.expr(block, single),
            many => self.and_or(block, many, true),
        }
    }

    fn resolve(&self, sym: Sym) -> Resolved {
        match self.symbols.lookup(sym) {
            None => Resolved::Unknown,
            Some(symbol) => match &symbol.kind {
                SymbolKind::Undefined => Resolved::Unknown,
                SymbolKind::Literal(v) => Resolved::Literal(v.clone()),
                SymbolKind::Value => Resolved::Value(symbol.data_type),
                SymbolKind::Variable => Resolved::Variable,
                SymbolKind::Builtin(id) => Resolved::Builtin(*id),
                SymbolKind::Keyword(k) => Resolved::Keyword(*k),
            },
        }
    }

    pub(super) fn keyword(&self, node: &Node) -> Option<Keyword> {
        match node.ident().map(|sym| self.resolve(sym)) {
            Some(Resolved::Keyword(k)) => Some(k),
            _ => None,
        }
    }

    pub(super) fn name(&self, sym: Sym) -> &str {
        self.interner.name(sym)
    }

    /// Declared type of a user identifier, if it has one.
    pub(super) fn value_type(&self, sym: Sym) -> Option<DataType> {
        match self.resolve(sym) {
            Resolved::Value(t) => Some(t),
            _ => None,
        }
    }

    /// Resolve an identifier in a slot of type `expected`, defining it on
    /// first sight when the slot type allows.
    pub(super) fn typed_ident(
        &mut self,
        sym: Sym,
        expected: DataType,
        pos: &SourcePos,
    ) -> Result<Value, LoadError> {
        match self.resolve(sym) {
            Resolved::Literal(v) if expected.accepts(v.data_type()) => Ok(v),
            Resolved::Value(t) if expected.accepts(t) => {
                Value::identifier(t, sym).ok_or_else(|| self.mismatch(sym, expected, t, pos))
            }
            Resolved::Value(t) => Err(self.mismatch(sym, expected, t, pos)),
            Resolved::Unknown if expected.is_definable() => {
                self.symbols
                    .define(sym, SymbolKind::Value, expected, self.interner, pos)?;
                Value::identifier(expected, sym)
                    .ok_or_else(|| LoadError::type_error(pos, "not an identifier type"))
            }
            Resolved::Unknown if matches!(expected, DataType::Any | DataType::Ident) => {
                Ok(Value::Ident(sym))
            }
            Resolved::Unknown => Err(LoadError::type_error(
                pos,
                format!("undefined identifier '{}' where {} expected", self.name(sym), expected),
            )),
            _ => Err(LoadError::type_error(
                pos,
                format!("'{}' cannot be used where {} expected", self.name(sym), expected),
            )),
        }
    }

    fn mismatch(&self, sym: Sym, expected: DataType, found: DataType, pos: &SourcePos) -> LoadError {
        LoadError::type_error(
            pos,
            format!(
                "'{}' redefined with incompatible type {} (declared {})",
                self.name(sym),
                expected,
                found
            ),
        )
    }

    pub(super) fn emit(&mut self, block: BlockId, instr: Instr) -> usize {
        self.builder.emit(block, instr)
    }

    pub(super) fn literal(&mut self, block: BlockId, value: Value) {
        self.builder.emit(block, Instr::Literal(value));
    }

    pub(super) fn make_list(&mut self, block: BlockId, len: usize, pos: &SourcePos) -> Result<(), LoadError> {
        let len = u16::try_from(len).map_err(|_| LoadError::syntax(pos, "list too long"))?;
        self.builder.emit(block, Instr::MakeList(len));
        Ok(())
    }

    // === Statements ===

    fn statement(&mut self, block: BlockId, context: Context, node: &Node) -> Result<(), LoadError> {
        let pos = node.pos();
        match node {
            Node::Literal { .. } => Err(LoadError::syntax(pos, format!("unexpected literal in {context} code"))),
            Node::Ident { sym, .. } => match self.resolve(*sym) {
                Resolved::Builtin(id) if id.spec().is_nullary() => {
                    let result = self.call(block, id, &[], pos)?;
                    self.after_statement_call(block, context, result, pos)
                }
                Resolved::Value(t @ (DataType::Direction | DataType::Position)) if context == Context::Move => {
                    let value = self.typed_ident(*sym, t, pos)?;
                    self.literal(block, value);
                    self.relocate(block, t)
                }
                _ => Err(LoadError::syntax(
                    pos,
                    format!("unexpected '{}' in {context} code", self.name(*sym)),
                )),
            },
            Node::List { items, .. } => {
                let Some(head) = items.first() else {
                    return Err(LoadError::syntax(pos, "empty statement"));
                };
                let Some(head_sym) = head.ident() else {
                    return self.group(block, context, items);
                };
                match self.resolve(head_sym) {
                    Resolved::Keyword(Keyword::If) if context == Context::Move => {
                        self.if_statement(block, items, pos)
                    }
                    Resolved::Keyword(Keyword::While) if context == Context::Move => {
                        self.while_statement(block, items, pos)
                    }
                    Resolved::Builtin(id) => {
                        let result = self.call(block, id, &items[1..], pos)?;
                        self.after_statement_call(block, context, result, pos)
                    }
                    Resolved::Value(DataType::Direction | DataType::Position)
                        if context == Context::Move =>
                    {
                        self.group(block, context, items)
                    }
                    _ => Err(LoadError::syntax(
                        pos,
                        format!("unknown keyword '{}' in {context} code", self.name(head_sym)),
                    )),
                }
            }
        }
    }

    /// A list of statements without a head keyword.
    fn group(&mut self, block: BlockId, context: Context, items: &[Node]) -> Result<(), LoadError> {
        items
            .iter()
            .try_for_each(|item| self.statement(block, context, item))
    }

    fn after_statement_call(
        &mut self,
        block: BlockId,
        context: Context,
        result: DataType,
        pos: &SourcePos,
    ) -> Result<(), LoadError> {
        match result {
            DataType::Nothing => Ok(()),
            DataType::Direction | DataType::Position if context == Context::Move => {
                self.relocate(block, result)
            }
            other => Err(LoadError::type_error(
                pos,
                format!("{other} expression used as a statement"),
            )),
        }
    }

    /// Move the cursor to the direction or position on top of the stack.
    fn relocate(&mut self, block: BlockId, kind: DataType) -> Result<(), LoadError> {
        let op = if kind == DataType::Direction {
            Op::Step
        } else {
            Op::GoPosition
        };
        self.emit(block, Instr::Call { op, argc: 1 });
        Ok(())
    }

    fn if_statement(&mut self, block: BlockId, items: &[Node], pos: &SourcePos) -> Result<(), LoadError> {
        let cond = items
            .get(1)
            .ok_or_else(|| LoadError::syntax(pos, "if without condition"))?;
        let body = &items[2..];
        let split = body
            .iter()
            .position(|n| self.keyword(n) == Some(Keyword::Else));
        let (then_part, else_part) = match split {
            Some(i) => (&body[..i], Some(&body[i + 1..])),
            None => (body, None),
        };

        self.expr(block, cond)?;
        let skip_then = self.emit(block, Instr::JumpIfFalse(usize::MAX));
        self.group(block, Context::Move, then_part)?;
        match else_part {
            None => {
                let end = self.builder.here(block);
                self.builder.patch(block, skip_then, end);
            }
            Some(else_part) => {
                let skip_else = self.emit(block, Instr::Jump(usize::MAX));
                let else_start = self.builder.here(block);
                self.builder.patch(block, skip_then, else_start);
                self.group(block, Context::Move, else_part)?;
                let end = self.builder.here(block);
                self.builder.patch(block, skip_else, end);
            }
        }
        Ok(())
    }

    fn while_statement(&mut self, block: BlockId, items: &[Node], pos: &SourcePos) -> Result<(), LoadError> {
        let cond = items
            .get(1)
            .ok_or_else(|| LoadError::syntax(pos, "while without condition"))?;
        let top = self.builder.here(block);
        self.expr(block, cond)?;
        let exit = self.emit(block, Instr::JumpIfFalse(usize::MAX));
        self.group(block, Context::Move, &items[2..])?;
        self.emit(block, Instr::Jump(top));
        let end = self.builder.here(block);
        self.builder.patch(block, exit, end);
        Ok(())
    }

    // === Expressions ===

    /// Compile a boolean expression.
    pub(super) fn expr(&mut self, block: BlockId, node: &Node) -> Result<(), LoadError> {
        let pos = node.pos();
        match node {
            Node::Literal { value: value @ Value::Bool(_), .. } => {
                self.literal(block, value.clone());
                Ok(())
            }
            Node::Literal { value, .. } => Err(LoadError::type_error(
                pos,
                format!("expected boolean, found {}", value.data_type()),
            )),
            Node::Ident { sym, .. } => match self.resolve(*sym) {
                Resolved::Literal(v @ Value::Bool(_)) => {
                    self.literal(block, v);
                    Ok(())
                }
                Resolved::Variable => {
                    self.emit(block, Instr::LoadVar(*sym));
                    Ok(())
                }
                Resolved::Builtin(id) if id.spec().is_nullary() && id.spec().result == DataType::Bool => {
                    self.call(block, id, &[], pos).map(drop)
                }
                Resolved::Value(DataType::Attribute) => self.attribute_test(block, *sym, false, &[], pos),
                _ => match self.attribute_predicate(*sym) {
                    Some((attribute, negated)) => self.attribute_test(block, attribute, negated, &[], pos),
                    None => Err(LoadError::type_error(
                        pos,
                        format!("'{}' is not a boolean expression", self.name(*sym)),
                    )),
                },
            },
            Node::List { items, .. } => {
                let Some(head) = items.first().and_then(Node::ident) else {
                    return Err(LoadError::type_error(pos, "expected a boolean expression"));
                };
                match self.resolve(head) {
                    Resolved::Keyword(Keyword::And) => self.and_or(block, &items[1..], true),
                    Resolved::Keyword(Keyword::Or) => self.and_or(block, &items[1..], false),
                    Resolved::Keyword(Keyword::Not) => {
                        let [operand] = &items[1..] else {
                            return Err(LoadError::syntax(pos, "not takes one argument"));
                        };
                        self.expr(block, operand)?;
                        self.emit(block, Instr::Not);
                        Ok(())
                    }
                    Resolved::Builtin(id) if id.spec().result == DataType::Bool => {
                        self.call(block, id, &items[1..], pos).map(drop)
                    }
                    Resolved::Value(DataType::Attribute) => {
                        self.attribute_test(block, head, false, &items[1..], pos)
                    }
                    _ => match self.attribute_predicate(head) {
                        Some((attribute, negated)) => {
                            self.attribute_test(block, attribute, negated, &items[1..], pos)
                        }
                        None => Err(LoadError::type_error(
                            pos,
                            format!("'{}' is not a predicate", self.name(head)),
                        )),
                    },
                }
            }
        }
    }

    /// `never-moved?` and `not-never-moved?` for a declared attribute.
    fn attribute_predicate(&self, sym: Sym) -> Option<(Sym, bool)> {
        let name = self.name(sym);
        let stem = name.strip_suffix('?')?;
        let (stem, negated) = match stem.strip_prefix("not-") {
            Some(inner) => (inner, true),
            None => (stem, false),
        };
        let attribute = self.interner.get(stem)?;
        (self.value_type(attribute) == Some(DataType::Attribute)).then_some((attribute, negated))
    }

    fn attribute_test(
        &mut self,
        block: BlockId,
        attribute: Sym,
        negated: bool,
        args: &[Node],
        pos: &SourcePos,
    ) -> Result<(), LoadError> {
        self.literal(block, Value::Attribute(attribute));
        let argc = match args {
            [] => 1,
            [at] => {
                self.value(block, at, DataType::Locator)?;
                2
            }
            _ => return Err(LoadError::syntax(pos, "attribute test takes at most one position")),
        };
        self.emit(block, Instr::Call { op: Op::AttributeTest, argc });
        if negated {
            self.emit(block, Instr::Not);
        }
        Ok(())
    }

    /// Short-circuit chain; `all` selects `and`.
    fn and_or(&mut self, block: BlockId, operands: &[Node], all: bool) -> Result<(), LoadError> {
        let mut exits = Vec::with_capacity(operands.len());
        for operand in operands {
            self.expr(block, operand)?;
            let jump = if all {
                Instr::JumpIfFalse(usize::MAX)
            } else {
                Instr::JumpIfTrue(usize::MAX)
            };
            exits.push(self.emit(block, jump));
        }
        self.literal(block, Value::Bool(!all));
        let to_end = self.emit(block, Instr::Jump(usize::MAX));
        let short = self.builder.here(block);
        for exit in exits {
            self.builder.patch(block, exit, short);
        }
        self.literal(block, Value::Bool(all));
        let end = self.builder.here(block);
        self.builder.patch(block, to_end, end);
        self.emit(block, Instr::Not);
        Ok(())
    }

    // === Values and calls ===

    /// Compile one node as a value of type `expected`.
    pub(super) fn value(&mut self, block: BlockId, node: &Node, expected: DataType) -> Result<(), LoadError> {
        if expected == DataType::Bool {
            return self.expr(block, node);
        }
        let pos = node.pos();
        match node {
            Node::Literal { value, .. } => {
                if !expected.accepts(value.data_type()) {
                    return Err(LoadError::type_error(
                        pos,
                        format!("expected {expected}, found {}", value.data_type()),
                    ));
                }
                self.literal(block, value.clone());
                Ok(())
            }
            Node::Ident { sym, .. } => match self.resolve(*sym) {
                Resolved::Builtin(id) if id.spec().is_nullary() && expected.accepts(id.spec().result) => {
                    self.call(block, id, &[], pos).map(drop)
                }
                Resolved::Variable if expected == DataType::Any => {
                    self.emit(block, Instr::LoadVar(*sym));
                    Ok(())
                }
                _ => {
                    let value = self.typed_ident(*sym, expected, pos)?;
                    self.literal(block, value);
                    Ok(())
                }
            },
            Node::List { items, .. } => {
                let head = items.first().and_then(Node::ident);
                match head.map(|h| self.resolve(h)) {
                    Some(Resolved::Builtin(id)) if expected.accepts(id.spec().result) => {
                        self.call(block, id, &items[1..], pos).map(drop)
                    }
                    Some(Resolved::Keyword(Keyword::And | Keyword::Or | Keyword::Not))
                        if expected.accepts(DataType::Bool) =>
                    {
                        self.expr(block, node)
                    }
                    _ => Err(LoadError::type_error(pos, format!("expected {expected}"))),
                }
            }
        }
    }

    /// Whether an optional parameter of type `expected` should take `node`.
    fn fits(&self, node: &Node, expected: DataType, later_required: bool) -> bool {
        match node {
            Node::Literal { value, .. } => expected.accepts(value.data_type()),
            Node::Ident { sym, .. } => match self.resolve(*sym) {
                Resolved::Literal(v) => expected.accepts(v.data_type()),
                Resolved::Value(t) => expected.accepts(t),
                Resolved::Variable => expected.accepts(DataType::Bool),
                Resolved::Builtin(id) => id.spec().is_nullary() && expected.accepts(id.spec().result),
                Resolved::Keyword(_) => false,
                Resolved::Unknown => !later_required && expected.is_definable(),
            },
            Node::List { .. } => match node.head().map(|h| self.resolve(h)) {
                Some(Resolved::Builtin(id)) => expected.accepts(id.spec().result),
                Some(Resolved::Keyword(Keyword::And | Keyword::Or | Keyword::Not)) => {
                    expected.accepts(DataType::Bool)
                }
                _ => false,
            },
        }
    }

    /// Compile a call against the built-in's signature. Returns its result
    /// type.
    pub(super) fn call(
        &mut self,
        block: BlockId,
        id: BuiltinId,
        args: &[Node],
        pos: &SourcePos,
    ) -> Result<DataType, LoadError> {
        let spec = id.spec();
        match spec.op {
            Op::SetFlag => return self.set_flag(block, args, pos),
            Op::Flag => {
                let [Node::Ident { sym, .. }] = args else {
                    return Err(LoadError::syntax(pos, "flag? takes one flag name"));
                };
                self.emit(block, Instr::LoadVar(*sym));
                if spec.negated {
                    self.emit(block, Instr::Not);
                }
                return Ok(DataType::Bool);
            }
            _ => {}
        }

        let mut rest = args;
        let mut argc: usize = 0;
        for (i, param) in spec.params.iter().enumerate() {
            let later_required = spec.params[i + 1..].iter().any(|p| p.is_required());
            match *param {
                Param::Value(t) => {
                    let node = self.required(rest, spec.name, pos)?;
                    self.value(block, node, t)?;
                    rest = &rest[1..];
                    argc += 1;
                }
                Param::Opt(t) => {
                    if let Some(node) = rest.first() {
                        if self.fits(node, t, later_required) {
                            self.value(block, node, t)?;
                            rest = &rest[1..];
                            argc += 1;
                        }
                    }
                }
                Param::Seq(t) => {
                    for node in rest {
                        self.value(block, node, t)?;
                    }
                    self.make_list(block, rest.len(), pos)?;
                    rest = &[];
                    argc += 1;
                }
                Param::List(t) => {
                    let node = self.required(rest, spec.name, pos)?;
                    let items = match node {
                        Node::List { items, .. } => items.as_slice(),
                        single => std::slice::from_ref(single),
                    };
                    for item in items {
                        self.value(block, item, t)?;
                    }
                    self.make_list(block, items.len(), node.pos())?;
                    rest = &rest[1..];
                    argc += 1;
                }
                Param::Pairs(t, u) => {
                    for node in rest {
                        let Some([first, second]) = node.items() else {
                            return Err(LoadError::syntax(node.pos(), format!("{} expects pairs", spec.name)));
                        };
                        self.value(block, first, t)?;
                        self.value(block, second, u)?;
                        self.make_list(block, 2, node.pos())?;
                    }
                    self.make_list(block, rest.len(), pos)?;
                    rest = &[];
                    argc += 1;
                }
                Param::Block(context) => {
                    let nested = self.compile_block(context, rest, pos)?;
                    self.emit(block, Instr::NewScope { context, block: nested });
                    rest = &[];
                    argc += 1;
                }
                Param::Expr => {
                    let node = self.required(rest, spec.name, pos)?;
                    self.expr(block, node)?;
                    rest = &rest[1..];
                    argc += 1;
                }
                Param::Choice(names) => {
                    let node = self.required(rest, spec.name, pos)?;
                    let index = node
                        .ident()
                        .and_then(|sym| names.iter().position(|n| *n == self.name(sym)))
                        .ok_or_else(|| {
                            LoadError::syntax(
                                node.pos(),
                                format!("{} expects one of {}", spec.name, names.join(", ")),
                            )
                        })?;
                    self.literal(block, Value::from(index as i64));
                    rest = &rest[1..];
                    argc += 1;
                }
                Param::Special(aggregate) => {
                    self.aggregate(block, aggregate, rest, pos)?;
                    rest = &[];
                    argc += 1;
                }
            }
        }

        if let Some(extra) = rest.first() {
            return Err(LoadError::syntax(
                extra.pos(),
                format!("unexpected argument to {}", spec.name),
            ));
        }
        let argc = u16::try_from(argc).map_err(|_| LoadError::syntax(pos, "too many arguments"))?;
        self.emit(block, Instr::Call { op: spec.op, argc });
        if spec.negated {
            self.emit(block, Instr::Not);
        }
        Ok(spec.result)
    }

    fn required<'n>(&self, rest: &'n [Node], name: &str, pos: &SourcePos) -> Result<&'n Node, LoadError> {
        rest.first()
            .ok_or_else(|| LoadError::syntax(pos, format!("missing argument to {name}")))
    }

    fn set_flag(&mut self, block: BlockId, args: &[Node], pos: &SourcePos) -> Result<DataType, LoadError> {
        let [Node::Ident { sym, pos: name_pos }, value] = args else {
            return Err(LoadError::syntax(pos, "set-flag takes a flag name and a value"));
        };
        self.symbols
            .define(*sym, SymbolKind::Variable, DataType::Bool, self.interner, name_pos)?;
        self.expr(block, value)?;
        self.emit(block, Instr::StoreVar(*sym));
        Ok(DataType::Nothing)
    }
}

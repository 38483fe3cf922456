//! Move generation.
//!
//! Every drop or move program runs once per applicable start position on a
//! fresh [`Machine`] with a fresh [`MoveGenState`]. The generator is the
//! machine's host: cursor ops move `current`, predicates read the board the
//! program started from, actions accumulate pending parts, and `add` and
//! friends package everything pending into a [`MoveModel`].
//!
//! ## Emission order
//!
//! 1. Parts committed by `cascade`.
//! 2. Takes: explicit captures, then the occupant of the destination.
//! 3. The placement (`Drop`, `Move` or `Copy`) with owner and type changes
//!    aimed at the destination folded in.
//! 4. Owner and type changes elsewhere.
//! 5. Created pieces, each preceded by a take if its square is occupied.
//! 6. Attribute writes.
//!
//! Parts that would change nothing are left out. After an emission the
//! pending parts and `to` are cleared; the cursor and `from` stay, so a loop
//! can keep emitting.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::board::{BoardModel, Continuation};
use super::moves::{MoveKind, MoveModel, MovePart};
use super::piece::PieceModel;
use crate::compile::builtins::{Op, GO_TARGETS};
use crate::core::diag::LEVEL_DETAIL;
use crate::core::{DataType, Diagnostics, PlayerId, Sym, Value};
use crate::defs::{GameDef, MoveProgram, PassTurn, PieceDef, StartRestriction, TurnDef};
use crate::error::ExecError;
use crate::vm::args::to_u32;
use crate::vm::{Args, Flow, Host, Machine, Operand};

/// Legal moves for one turn: raw generation, then move priorities, then
/// the pass rule. A continuation gets neither priorities nor a pass.
pub fn legal_moves(
    game: &GameDef,
    board: &BoardModel,
    turn: &TurnDef,
    continuation: Option<&Continuation>,
    diag: Diagnostics,
) -> Result<Vec<MoveModel>, ExecError> {
    let mut moves = generate(game, board, turn, continuation, diag)?;
    if continuation.is_some() {
        return Ok(moves);
    }
    if !game.move_priorities.is_empty() {
        if let Some(best) = moves.iter().map(|m| game.priority(m.move_type)).min() {
            moves.retain(|m| game.priority(m.move_type) == best);
        }
    }
    match game.options.pass_turn {
        PassTurn::Always => moves.push(MoveModel::pass(turn.player)),
        PassTurn::Forced if moves.is_empty() => moves.push(MoveModel::pass(turn.player)),
        PassTurn::Forced | PassTurn::Never => {}
    }
    Ok(moves)
}

/// Every distinct move the programs produce, in generation order.
pub fn generate(
    game: &GameDef,
    board: &BoardModel,
    turn: &TurnDef,
    continuation: Option<&Continuation>,
    diag: Diagnostics,
) -> Result<Vec<MoveModel>, ExecError> {
    let ctx = GenContext {
        game,
        board,
        turn: *turn,
        mover: game.player_sym(turn.mover),
        diag,
    };
    let mut out = Vec::new();

    if let Some(cont) = continuation {
        let piece = board.piece_at(cont.position);
        if let Some(def) = piece.and_then(|p| game.piece(p.piece)) {
            for program in def
                .moves
                .iter()
                .filter(|p| cont.move_type.is_none() || p.move_type == cont.move_type)
            {
                ctx.run(def, program, cont.position, MoveKind::Move, &mut out)?;
            }
        }
    } else {
        for def in game.pieces.iter().filter(|d| !d.dummy && !d.drops.is_empty()) {
            if board.store_count(turn.mover, def.name) == 0 {
                continue;
            }
            for position in game.board.positions() {
                for program in def.drops.iter().filter(|p| p.allowed_on(turn.move_type)) {
                    ctx.run(def, program, position.name, MoveKind::Drop, &mut out)?;
                }
            }
        }
        for position in game.board.positions() {
            let Some(piece) = board.piece_at(position.name) else {
                continue;
            };
            if piece.owner != turn.mover {
                continue;
            }
            let Some(def) = game.piece(piece.piece) else {
                continue;
            };
            for program in def.moves.iter().filter(|p| p.allowed_on(turn.move_type)) {
                ctx.run(def, program, position.name, MoveKind::Move, &mut out)?;
            }
        }
    }

    let mut seen = FxHashSet::default();
    out.retain(|m| seen.insert(m.clone()));
    if diag.enabled(LEVEL_DETAIL) {
        tracing::debug!(
            player = %turn.player,
            moves = out.len(),
            continuation = continuation.is_some(),
            "generated moves"
        );
    }
    Ok(out)
}

struct GenContext<'a> {
    game: &'a GameDef,
    board: &'a BoardModel,
    turn: TurnDef,
    /// Name of the move-as player, for symmetries and zones.
    mover: Sym,
    diag: Diagnostics,
}

impl GenContext<'_> {
    fn starts_at(&self, program: &MoveProgram, start: Sym) -> bool {
        match program.restrict {
            None => true,
            Some(StartRestriction::Position(p)) => p == start,
            Some(StartRestriction::Zone(z)) => self.game.board.in_zone(z, self.mover, start),
        }
    }

    fn run(
        &self,
        def: &PieceDef,
        program: &MoveProgram,
        start: Sym,
        kind: MoveKind,
        out: &mut Vec<MoveModel>,
    ) -> Result<(), ExecError> {
        if !self.starts_at(program, start) {
            return Ok(());
        }
        let (moving, from) = match kind {
            MoveKind::Drop => (PieceModel::new(def, self.turn.mover), None),
            _ => match self.board.piece_at(start) {
                Some(piece) => (piece.clone(), Some(start)),
                None => return Ok(()),
            },
        };
        let mut generator = Generator {
            ctx: self,
            kind,
            start,
            piece: def.name,
            move_type: program.move_type,
            state: MoveGenState::new(start, from, moving),
            out,
        };
        Machine::new(&self.game.program, self.diag).run(program.block, &mut generator)?;
        Ok(())
    }

    fn step(&self, from: Sym, direction: Sym) -> Option<Sym> {
        let direction = self.game.board.symmetric(self.mover, direction);
        self.game.board.link(from, direction)
    }

    fn is_friend(&self, piece: &PieceModel) -> bool {
        piece.owner == self.turn.mover
    }

    fn is_enemy(&self, piece: &PieceModel) -> bool {
        piece.owner != self.turn.mover && !self.game.is_neutral(piece.owner)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Change {
    Owner(PlayerId),
    Piece(Sym),
    Flip,
}

/// Cursor and pending effects of one program run.
#[derive(Clone, Debug)]
pub struct MoveGenState {
    pub current: Sym,
    pub mark: Sym,
    pub from: Option<Sym>,
    pub to: Option<Sym>,
    /// Piece that `add` places.
    pub moving: PieceModel,
    /// The store has already paid for the dropped piece.
    paid: bool,
    cascades: SmallVec<[MovePart; 2]>,
    captures: SmallVec<[Sym; 4]>,
    changes: SmallVec<[(Sym, Change); 2]>,
    creates: SmallVec<[(Sym, PlayerId, Sym); 1]>,
    attributes: SmallVec<[(Sym, Sym, bool); 2]>,
    position_flags: FxHashMap<(Sym, Sym), bool>,
}

impl MoveGenState {
    #[must_use]
    pub fn new(start: Sym, from: Option<Sym>, moving: PieceModel) -> Self {
        Self {
            current: start,
            mark: start,
            from,
            to: None,
            moving,
            paid: false,
            cascades: SmallVec::new(),
            captures: SmallVec::new(),
            changes: SmallVec::new(),
            creates: SmallVec::new(),
            attributes: SmallVec::new(),
            position_flags: FxHashMap::default(),
        }
    }

    fn clear_pending(&mut self) {
        self.to = None;
        self.cascades.clear();
        self.captures.clear();
        self.changes.clear();
        self.creates.clear();
        self.attributes.clear();
    }
}

struct Generator<'a, 'c> {
    ctx: &'c GenContext<'c>,
    kind: MoveKind,
    start: Sym,
    piece: Sym,
    move_type: Option<Sym>,
    state: MoveGenState,
    out: &'a mut Vec<MoveModel>,
}

impl Generator<'_, '_> {
    /// Square named by an optional locator operand; the cursor when there
    /// is none. `None` when the locator leads off the board.
    fn target(&self, args: &Args<'_>) -> Option<Sym> {
        self.locate(args.find(DataType::Locator))
    }

    /// Position named by an optional locator operand; the cursor without one.
    fn locate(&self, locator: Option<&Value>) -> Option<Sym> {
        match locator {
            Some(Value::Position(p)) => self.ctx.game.board.contains(*p).then_some(*p),
            Some(Value::Direction(d)) => self.ctx.step(self.state.current, *d),
            _ => Some(self.state.current),
        }
    }

    fn occupant(&self, args: &Args<'_>) -> Option<&PieceModel> {
        self.target(args).and_then(|p| self.ctx.board.piece_at(p))
    }

    fn relocate(&mut self, to: Option<Sym>) -> Flow {
        match to {
            Some(p) => {
                self.state.current = p;
                Flow::Continue
            }
            None => Flow::Stop,
        }
    }

    fn go(&mut self, index: u32) -> Flow {
        let last = self.ctx.board.last_move();
        let target = match GO_TARGETS.get(index as usize).copied() {
            Some("from") => self.state.from,
            Some("to") => self.state.to,
            Some("mark") => Some(self.state.mark),
            Some("last-from") => last.and_then(MoveModel::last_from),
            Some("last-to") => last.and_then(MoveModel::last_to),
            _ => None,
        };
        self.relocate(target)
    }

    fn cascade(&mut self) {
        let current = self.state.current;
        let moving = &self.state.moving;
        let part = match self.state.from {
            Some(from) if from == current => return,
            Some(from) => MovePart::Move {
                from,
                to: current,
                player: moving.owner,
                piece: moving.piece,
            },
            None => {
                self.state.paid = true;
                MovePart::Drop {
                    to: current,
                    player: moving.owner,
                    piece: moving.piece,
                    from_store: Some((self.ctx.turn.mover, self.piece)),
                }
            }
        };
        self.state.cascades.push(part);
        self.state.from = Some(current);
    }

    /// Package pending parts into one move per placed piece type.
    fn emit(&mut self, promotions: &[Sym], copy: bool, partial: Option<Option<Sym>>) {
        let types: SmallVec<[Option<Sym>; 2]> = if promotions.is_empty() {
            SmallVec::from_elem(None, 1)
        } else {
            promotions.iter().copied().map(Some).collect()
        };
        for promotion in types {
            let parts = self.parts(promotion, copy);
            if parts.is_empty() {
                continue;
            }
            let (partial, partial_type) = match partial {
                Some(kind) => (true, kind.or(self.move_type)),
                None => (false, None),
            };
            self.out.push(MoveModel {
                player: self.ctx.turn.player,
                kind: self.kind,
                piece: Some(self.piece),
                position: Some(self.start),
                parts,
                move_type: self.move_type,
                partial,
                partial_type,
            });
        }
        self.state.clear_pending();
    }

    fn parts(&self, promotion: Option<Sym>, copy: bool) -> SmallVec<[MovePart; 4]> {
        let board = self.ctx.board;
        let state = &self.state;
        let dest = state.to.unwrap_or(state.current);
        let vacated = |at: Sym| !copy && state.from == Some(at) && at != dest;
        let mut parts: SmallVec<[MovePart; 4]> = state.cascades.iter().cloned().collect();

        let mut taken: SmallVec<[Sym; 4]> = SmallVec::new();
        let implicit = (state.from != Some(dest)).then_some(dest);
        for at in state.captures.iter().copied().chain(implicit) {
            if taken.contains(&at) || state.from == Some(at) {
                continue;
            }
            if let Some(victim) = board.piece_at(at) {
                parts.push(MovePart::Take {
                    at,
                    player: victim.owner,
                    piece: victim.piece,
                });
                taken.push(at);
            }
        }

        let count = self.ctx.game.player_count();
        let mut owner = state.moving.owner;
        let mut piece = promotion.unwrap_or(state.moving.piece);
        for (_, change) in state.changes.iter().filter(|(at, _)| *at == dest) {
            match *change {
                Change::Owner(p) => owner = p,
                Change::Piece(t) => piece = t,
                Change::Flip => owner = owner.next(count),
            }
        }
        match state.from {
            None => parts.push(MovePart::Drop {
                to: dest,
                player: owner,
                piece,
                from_store: (self.kind == MoveKind::Drop && !state.paid)
                    .then_some((self.ctx.turn.mover, self.piece)),
            }),
            Some(from) if from == dest => {
                if owner != state.moving.owner {
                    parts.push(MovePart::ChangeOwner {
                        at: dest,
                        player: owner,
                        piece,
                    });
                }
                if piece != state.moving.piece {
                    parts.push(MovePart::ChangePiece {
                        at: dest,
                        player: owner,
                        piece,
                    });
                }
            }
            Some(from) if copy => parts.push(MovePart::Copy {
                from,
                to: dest,
                player: owner,
                piece,
            }),
            Some(from) => parts.push(MovePart::Move {
                from,
                to: dest,
                player: owner,
                piece,
            }),
        }

        for &(at, change) in state.changes.iter().filter(|(at, _)| *at != dest) {
            if vacated(at) || taken.contains(&at) {
                continue;
            }
            let Some(target) = board.piece_at(at) else {
                continue;
            };
            let part = match change {
                Change::Owner(p) => (p != target.owner).then_some(MovePart::ChangeOwner {
                    at,
                    player: p,
                    piece: target.piece,
                }),
                Change::Flip => Some(MovePart::ChangeOwner {
                    at,
                    player: target.owner.next(count),
                    piece: target.piece,
                }),
                Change::Piece(t) => (t != target.piece).then_some(MovePart::ChangePiece {
                    at,
                    player: target.owner,
                    piece: t,
                }),
            };
            parts.extend(part);
        }

        for &(at, player, created) in &state.creates {
            let occupant = if at == dest {
                Some((owner, piece))
            } else if vacated(at) || taken.contains(&at) {
                None
            } else {
                board.piece_at(at).map(|p| (p.owner, p.piece))
            };
            if let Some((victim_owner, victim_piece)) = occupant {
                parts.push(MovePart::Take {
                    at,
                    player: victim_owner,
                    piece: victim_piece,
                });
            }
            parts.push(MovePart::Drop {
                to: at,
                player,
                piece: created,
                from_store: None,
            });
        }

        for &(at, attribute, value) in &state.attributes {
            let before = if at == dest {
                Some(state.moving.attribute(attribute))
            } else if vacated(at) || taken.contains(&at) {
                None
            } else {
                board.piece_at(at).map(|p| p.attribute(attribute))
            };
            if before.is_some_and(|b| b != value) {
                parts.push(MovePart::SetAttribute {
                    at,
                    attribute,
                    value,
                });
            }
        }
        parts
    }
}

fn flag_name(args: &Args<'_>) -> Result<Sym, ExecError> {
    args.value(0)?
        .sym()
        .ok_or_else(|| ExecError::operand("position-flag", "flag name must be an identifier"))
}

impl Host for Generator<'_, '_> {
    fn call(&mut self, op: Op, items: Vec<Operand>) -> Result<Flow, ExecError> {
        let args = Args::new(op, &items);
        let ctx = self.ctx;
        let board = ctx.board;
        let predicate = |b: bool| -> Result<Flow, ExecError> { Ok(Flow::Push(Value::Bool(b))) };
        let flow = match op {
            // cursor
            Op::Step => {
                let direction = args.sym(0, DataType::Direction)?;
                let next = ctx.step(self.state.current, direction);
                self.relocate(next)
            }
            Op::GoPosition => {
                let position = args.sym(0, DataType::Position)?;
                let next = ctx.game.board.contains(position).then_some(position);
                self.relocate(next)
            }
            Op::Opposite => {
                let direction = args.sym(0, DataType::Direction)?;
                match ctx.game.board.opposite(direction) {
                    Some(o) => Flow::Push(Value::Direction(o)),
                    None => Flow::Stop,
                }
            }
            Op::Mark => match self.target(&args) {
                Some(p) => {
                    self.state.mark = p;
                    Flow::Continue
                }
                None => Flow::Stop,
            },
            Op::Back => {
                self.state.current = self.state.mark;
                Flow::Continue
            }
            Op::From => match self.target(&args).and_then(|p| Some((p, board.piece_at(p)?))) {
                Some((p, piece)) => {
                    self.state.from = Some(p);
                    self.state.moving = piece.clone();
                    Flow::Continue
                }
                None => Flow::Stop,
            },
            Op::To => match self.target(&args) {
                Some(p) => {
                    self.state.to = Some(p);
                    Flow::Continue
                }
                None => Flow::Stop,
            },
            Op::Go => {
                let index = to_u32(args.number(0)?, op)?;
                self.go(index)
            }
            Op::Verify => {
                if args.bool(0)? {
                    Flow::Continue
                } else {
                    Flow::Stop
                }
            }

            // actions
            Op::Add | Op::AddCopy => {
                let promotions = args
                    .list(0)?
                    .iter()
                    .map(|o| {
                        o.sym()
                            .ok_or_else(|| ExecError::operand(op.name(), "expected piece names"))
                    })
                    .collect::<Result<SmallVec<[Sym; 2]>, _>>()?;
                self.emit(&promotions, op == Op::AddCopy, None);
                Flow::Continue
            }
            Op::AddPartial | Op::AddCopyPartial => {
                let kind = args.find(DataType::MoveType).and_then(Value::sym);
                self.emit(&[], op == Op::AddCopyPartial, Some(kind));
                Flow::Continue
            }
            Op::Capture => {
                if let Some(p) = self.target(&args) {
                    if board.piece_at(p).is_some() && !self.state.captures.contains(&p) {
                        self.state.captures.push(p);
                    }
                }
                Flow::Continue
            }
            Op::Cascade => {
                self.cascade();
                Flow::Continue
            }
            Op::ChangeOwner | Op::Flip | Op::ChangeType => {
                let change = match op {
                    Op::ChangeOwner => Change::Owner(ctx.turn.mover),
                    Op::Flip => Change::Flip,
                    _ => Change::Piece(args.sym(0, DataType::Piece)?),
                };
                match self.target(&args) {
                    Some(p) => {
                        self.state.changes.push((p, change));
                        Flow::Continue
                    }
                    None => Flow::Stop,
                }
            }
            Op::Create => {
                let player = match args.find(DataType::Player).and_then(Value::sym) {
                    Some(name) => ctx.game.player_id(name).ok_or_else(|| ExecError::UnknownSymbol {
                        kind: "player",
                        name: ctx.game.name(name).to_string(),
                    })?,
                    None => ctx.turn.mover,
                };
                let piece = args
                    .find(DataType::Piece)
                    .and_then(Value::sym)
                    .ok_or_else(|| ExecError::operand(op.name(), "missing piece"))?;
                match self.target(&args) {
                    Some(p) => {
                        self.state.creates.push((p, player, piece));
                        Flow::Continue
                    }
                    None => Flow::Stop,
                }
            }
            Op::SetAttribute => {
                let attribute = args.sym(0, DataType::Attribute)?;
                let value = args.bool(1)?;
                self.state
                    .attributes
                    .push((self.state.current, attribute, value));
                Flow::Continue
            }
            Op::SetPositionFlag => {
                let name = flag_name(&args)?;
                let value = args.bool(1)?;
                self.state
                    .position_flags
                    .insert((self.state.current, name), value);
                Flow::Continue
            }

            // predicates
            Op::Empty => return predicate(self.target(&args).is_some_and(|p| board.piece_at(p).is_none())),
            Op::Friend => return predicate(self.occupant(&args).is_some_and(|p| ctx.is_friend(p))),
            Op::Enemy => return predicate(self.occupant(&args).is_some_and(|p| ctx.is_enemy(p))),
            Op::Neutral => {
                return predicate(
                    self.occupant(&args)
                        .is_some_and(|p| ctx.game.is_neutral(p.owner)),
                )
            }
            Op::OnBoard => return predicate(self.target(&args).is_some()),
            Op::InZone => {
                let zone = args.sym(0, DataType::Zone)?;
                return predicate(
                    self.target(&args)
                        .is_some_and(|p| ctx.game.board.in_zone(zone, ctx.mover, p)),
                );
            }
            Op::AdjacentToEnemy => {
                let adjacent = self.target(&args).is_some_and(|p| {
                    ctx.game.board.directions().iter().any(|d| {
                        ctx.game
                            .board
                            .link(p, *d)
                            .and_then(|q| board.piece_at(q))
                            .is_some_and(|q| ctx.is_enemy(q))
                    })
                });
                return predicate(adjacent);
            }
            Op::IsPiece => {
                let piece = args.sym(0, DataType::Piece)?;
                return predicate(self.occupant(&args).is_some_and(|p| p.piece == piece));
            }
            Op::IsPosition => {
                let position = args.sym(0, DataType::Position)?;
                let at = self.locate(args.find_after(1, DataType::Locator));
                return predicate(at == Some(position));
            }
            Op::PositionFlag => {
                let name = flag_name(&args)?;
                let set = self.target(&args).is_some_and(|p| {
                    self.state
                        .position_flags
                        .get(&(p, name))
                        .copied()
                        .unwrap_or(false)
                });
                return predicate(set);
            }
            Op::LastFrom | Op::LastTo => {
                let last = board.last_move().and_then(|m| {
                    if op == Op::LastFrom {
                        m.last_from()
                    } else {
                        m.last_to()
                    }
                });
                return predicate(last.is_some() && self.target(&args) == last);
            }
            Op::AttributeTest => {
                let attribute = args.sym(0, DataType::Attribute)?;
                return predicate(self.occupant(&args).is_some_and(|p| p.attribute(attribute)));
            }
            other => {
                return Err(ExecError::Unsupported {
                    op: other.name(),
                    context: "move",
                })
            }
        };
        Ok(flow)
    }
}

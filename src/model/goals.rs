//! Goal evaluation.
//!
//! A goal block is a boolean expression run against one board for one
//! player. Configuration and count predicates answer only in
//! [`Phase::Pre`]; predicates that need the legal moves answer only in
//! [`Phase::Post`]. Asked in the wrong phase, a predicate is `false`.
//!
//! Friend and enemy are relative to the goal's player, whose symmetries
//! and zones apply.

use rust_decimal::Decimal;

use super::board::{BoardArena, BoardId, BoardModel};
use super::movegen;
use super::moves::{MoveModel, MovePart};
use crate::compile::aggregates::Occupant;
use crate::compile::builtins::Op;
use crate::core::{DataType, Diagnostics, PlayerId, Sym, Value};
use crate::defs::{GameDef, GoalDef, TurnDef};
use crate::error::ExecError;
use crate::vm::args::nested;
use crate::vm::{Args, Flow, Host, Machine, Operand};

/// When a goal is evaluated relative to move generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Before legal moves are known.
    Pre,
    /// After legal moves are known.
    Post,
}

/// Everything a goal may look at.
pub(crate) struct GoalInput<'a> {
    pub arena: &'a BoardArena,
    pub id: BoardId,
    pub board: &'a BoardModel,
    /// Legal moves of the player on turn; empty in [`Phase::Pre`].
    pub moves: &'a [MoveModel],
    pub repetition_count: u32,
}

/// Whether `goal` holds for `player`.
pub(crate) fn goal_holds(
    input: &GoalInput<'_>,
    goal: &GoalDef,
    player: PlayerId,
    phase: Phase,
    diag: Diagnostics,
) -> Result<bool, ExecError> {
    let game = input.arena.game();
    let mut host = GoalHost {
        input,
        game,
        player,
        player_sym: game.player_sym(player),
        phase,
        diag,
    };
    let outcome = Machine::new(&game.program, diag).run(goal.block, &mut host)?;
    outcome.truth("condition")
}

struct GoalHost<'i, 'a> {
    input: &'i GoalInput<'a>,
    game: &'i GameDef,
    player: PlayerId,
    player_sym: Sym,
    phase: Phase,
    diag: Diagnostics,
}

/// `[kind, pieces...]` occupier list.
struct OccupantSpec {
    kind: Occupant,
    pieces: Vec<Sym>,
}

impl OccupantSpec {
    fn parse(op: Op, operand: &Operand) -> Result<Self, ExecError> {
        let list = nested(op, operand)?;
        let kind = Occupant::from_number(list.number(0)?)
            .ok_or_else(|| ExecError::operand(op.name(), "bad occupier kind"))?;
        let pieces = (1..list.len())
            .map(|i| list.sym(i, DataType::Piece))
            .collect::<Result<_, _>>()?;
        Ok(Self { kind, pieces })
    }
}

impl GoalHost<'_, '_> {
    fn step(&self, from: Sym, direction: Sym) -> Option<Sym> {
        let direction = self.game.board.symmetric(self.player_sym, direction);
        self.game.board.link(from, direction)
    }

    fn matches(&self, spec: &OccupantSpec, at: Option<Sym>) -> bool {
        let Some(at) = at else {
            return false;
        };
        let piece = self.input.board.piece_at(at);
        let of_type = |p: Sym| spec.pieces.is_empty() || spec.pieces.contains(&p);
        match (spec.kind, piece) {
            (Occupant::Empty, piece) => piece.is_none(),
            (_, None) => false,
            (Occupant::Friend, Some(p)) => p.owner == self.player && of_type(p.piece),
            (Occupant::Enemy, Some(p)) => {
                p.owner != self.player && !self.game.is_neutral(p.owner) && of_type(p.piece)
            }
            (Occupant::AnyOwner, Some(p)) => of_type(p.piece),
        }
    }

    /// Occupiers alternate with directions; some start position must
    /// satisfy the whole chain.
    fn relative_config(&self, args: &Args<'_>) -> Result<bool, ExecError> {
        let op = Op::RelativeConfig;
        let mut occupants = Vec::new();
        let mut directions = Vec::new();
        for (i, item) in args.list(0)?.iter().enumerate() {
            if i % 2 == 0 {
                occupants.push(OccupantSpec::parse(op, item)?);
            } else {
                let direction = item
                    .sym()
                    .ok_or_else(|| ExecError::operand(op.name(), "expected a direction"))?;
                directions.push(direction);
            }
        }
        let found = self.game.board.positions().iter().any(|start| {
            let mut at = Some(start.name);
            occupants.iter().enumerate().all(|(i, spec)| {
                if i > 0 {
                    at = at.and_then(|a| self.step(a, directions[i - 1]));
                }
                self.matches(spec, at)
            })
        });
        Ok(found)
    }

    /// Any listed position, or any position of a listed zone, holds a
    /// matching occupier.
    fn absolute_config(&self, args: &Args<'_>) -> Result<bool, ExecError> {
        let op = Op::AbsoluteConfig;
        let entry = args
            .list(0)?
            .first()
            .ok_or_else(|| ExecError::operand(op.name(), "missing configuration"))?;
        let entry = nested(op, entry)?;
        let spec = OccupantSpec::parse(op, entry.operand(0)?)?;
        let targets = nested(op, entry.operand(1)?)?;
        for i in 0..targets.len() {
            let hit = match targets.value(i)? {
                Value::Position(p) => self.matches(&spec, Some(*p)),
                Value::Zone(z) => self
                    .game
                    .board
                    .zone_positions(*z, self.player_sym)
                    .into_iter()
                    .any(|p| self.matches(&spec, Some(p))),
                _ => return Err(ExecError::operand(op.name(), "expected a position or zone")),
            };
            if hit {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn count(&self, args: &Args<'_>, only_player: bool) -> Result<bool, ExecError> {
        let wanted = args.number(0)?;
        let piece = args.find(DataType::Piece).and_then(Value::sym);
        let count = self
            .input
            .board
            .played()
            .values()
            .filter(|p| !only_player || p.owner == self.player)
            .filter(|p| piece.map_or(true, |t| p.piece == t))
            .count();
        Ok(Decimal::from(count) == wanted)
    }

    /// Some opponent has a move that takes one of the player's `piece`s.
    fn attacked(&self, board: &BoardModel, piece: Sym) -> Result<bool, ExecError> {
        let targets: Vec<Sym> = board
            .played()
            .iter()
            .filter(|(_, p)| p.owner == self.player && p.piece == piece)
            .map(|(at, _)| *at)
            .collect();
        if targets.is_empty() {
            return Ok(false);
        }
        for enemy in PlayerId::all(self.game.player_count()).filter(|p| *p != self.player) {
            let turn = TurnDef {
                player: enemy,
                mover: enemy,
                move_type: None,
            };
            let moves = movegen::generate(self.game, board, &turn, None, self.diag)?;
            let takes = moves.iter().flat_map(|m| &m.parts).any(|part| {
                matches!(part, MovePart::Take { at, .. } if targets.contains(at))
            });
            if takes {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn checkmated(&self, piece: Sym) -> Result<bool, ExecError> {
        let board = self.input.board;
        if !self.attacked(board, piece)? {
            return Ok(false);
        }
        for mv in self.input.moves.iter().filter(|m| !m.is_pass()) {
            let next = board.apply(self.game, mv)?;
            if !self.attacked(&next, piece)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn captured(&self, piece: Sym) -> bool {
        self.input.board.last_move().is_some_and(|mv| {
            mv.parts.iter().any(|part| {
                matches!(part, MovePart::Take { player, piece: taken, .. }
                    if *player == self.player && *taken == piece)
            })
        })
    }

    fn repetition(&self) -> bool {
        let arena = self.input.arena;
        let board = self.input.board;
        let player = arena.nominal_player(board);
        let seen = arena
            .history(self.input.id)
            .filter(|b| b.same_content(board) && arena.nominal_player(b) == player)
            .count();
        seen >= self.input.repetition_count as usize
    }
}

impl Host for GoalHost<'_, '_> {
    fn call(&mut self, op: Op, items: Vec<Operand>) -> Result<Flow, ExecError> {
        let args = Args::new(op, &items);
        let live = op.is_phase_one() == (self.phase == Phase::Pre);
        let holds = match op {
            Op::RelativeConfig => live && self.relative_config(&args)?,
            Op::AbsoluteConfig => live && self.absolute_config(&args)?,
            Op::PiecesRemaining => live && self.count(&args, true)?,
            Op::TotalPieceCount => live && self.count(&args, false)?,
            Op::Stalemated => live && self.input.moves.iter().all(MoveModel::is_pass),
            Op::Checkmated => live && self.checkmated(args.sym(0, DataType::Piece)?)?,
            Op::Captured => live && self.captured(args.sym(0, DataType::Piece)?),
            Op::Repetition => live && self.repetition(),
            other => {
                return Err(ExecError::Unsupported {
                    op: other.name(),
                    context: "goal",
                })
            }
        };
        Ok(Flow::Push(Value::Bool(holds)))
    }
}

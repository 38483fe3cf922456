//! Definition builders: one `Host` per static context.
//!
//! Each builder runs its block on a fresh `Machine` and accumulates the
//! clauses it is handed. Nested blocks (a game's board, a board's grid) are
//! run by a nested builder as soon as their handle arrives, so clause order
//! inside a block is preserved.

use std::sync::Arc;

use super::board::{BoardBuilder, BoardDef, GridSpec, Rect, ZoneDef};
use super::game::{
    GameDef, GameOptions, GoalDef, GoalKind, PassTurn, SetupDef, TurnDef, TurnOrder,
};
use super::piece::{MoveProgram, PieceDef, StartRestriction};
use crate::compile::builtins::Op;
use crate::compile::bytecode::{BlockId, Program};
use crate::core::diag::LEVEL_DETAIL;
use crate::core::{DataType, Diagnostics, PlayerId, Sym, Value};
use crate::error::{ExecError, LoadError};
use crate::vm::args::{nested, to_i32, to_u32, Args};
use crate::vm::{Flow, Host, Machine, Operand};

/// Run one definition block to completion.
pub(crate) fn run_block(
    program: &Program,
    diag: Diagnostics,
    block: BlockId,
    host: &mut dyn Host,
) -> Result<(), ExecError> {
    Machine::new(program, diag).run(block, host).map(drop)
}

fn unsupported(op: Op, context: &'static str) -> ExecError {
    ExecError::Unsupported {
        op: op.name(),
        context,
    }
}

fn syms(op: Op, items: &[Operand], kind: DataType) -> Result<Vec<Sym>, ExecError> {
    let args = Args::new(op, items);
    (0..args.len()).map(|i| args.sym(i, kind)).collect()
}

fn texts(op: Op, items: &[Operand]) -> Result<Vec<String>, ExecError> {
    let args = Args::new(op, items);
    (0..args.len()).map(|i| args.text(i).map(str::to_string)).collect()
}

// === Game ===

/// Builds one [`GameDef`].
pub struct GameBuilder<'p> {
    program: &'p Arc<Program>,
    diag: Diagnostics,
    title: String,
    description: Option<String>,
    history: Option<String>,
    strategy: Option<String>,
    thumbnail: Option<String>,
    default: bool,
    players: Vec<Sym>,
    turns: Vec<TurnEntry>,
    options: GameOptions,
    board: Option<BoardDef>,
    setup: Vec<RawSetup>,
    pieces: Vec<PieceDef>,
    goals: Vec<(GoalKind, Vec<Sym>, BlockId)>,
    move_priorities: Vec<Sym>,
}

enum TurnEntry {
    Turn {
        player: Sym,
        mover: Sym,
        move_type: Option<Sym>,
    },
    Repeat,
}

struct RawSetup {
    player: Sym,
    piece: Sym,
    positions: Vec<Sym>,
    off: u32,
}

impl<'p> GameBuilder<'p> {
    #[must_use]
    pub fn new(program: &'p Arc<Program>, diag: Diagnostics) -> Self {
        Self {
            program,
            diag,
            title: String::new(),
            description: None,
            history: None,
            strategy: None,
            thumbnail: None,
            default: false,
            players: Vec::new(),
            turns: Vec::new(),
            options: GameOptions::default(),
            board: None,
            setup: Vec::new(),
            pieces: Vec::new(),
            goals: Vec::new(),
            move_priorities: Vec::new(),
        }
    }

    /// Run the game block and validate the result.
    pub fn build(mut self, block: BlockId, variant: bool) -> Result<GameDef, LoadError> {
        let program: &Program = self.program;
        run_block(program, self.diag, block, &mut self)?;
        let def = self.finish(variant)?;
        if self.diag.enabled(LEVEL_DETAIL) {
            tracing::debug!(
                title = %def.title,
                players = def.players.len(),
                positions = def.board.positions().len(),
                pieces = def.pieces.len(),
                goals = def.goals.len(),
                "built game"
            );
        }
        Ok(def)
    }

    fn name(&self, sym: Sym) -> &str {
        self.program.interner().name(sym)
    }

    fn player(&self, sym: Sym, context: &str) -> Result<PlayerId, LoadError> {
        self.players
            .iter()
            .position(|p| *p == sym)
            .and_then(PlayerId::from_index)
            .ok_or_else(|| {
                LoadError::definition(format!(
                    "{context} names '{}', which is not a player",
                    self.name(sym)
                ))
            })
    }

    fn finish(&self, variant: bool) -> Result<GameDef, LoadError> {
        if self.players.is_empty() {
            return Err(LoadError::definition(format!(
                "game '{}' declares no players",
                self.title
            )));
        }
        if self.players.len() > PlayerId::MAX_PLAYERS {
            return Err(LoadError::definition(format!(
                "game '{}' declares {} players, more than {}",
                self.title,
                self.players.len(),
                PlayerId::MAX_PLAYERS
            )));
        }
        let board = self.board.clone().unwrap_or_default();

        let turn_order = self.turn_order()?;

        let mut setup = Vec::with_capacity(self.setup.len());
        for raw in &self.setup {
            let player = self.player(raw.player, "board-setup")?;
            if self.pieces.iter().all(|p| p.name != raw.piece) {
                return Err(LoadError::definition(format!(
                    "board-setup places unknown piece '{}'",
                    self.name(raw.piece)
                )));
            }
            if let Some(missing) = raw.positions.iter().find(|p| !board.contains(**p)) {
                return Err(LoadError::definition(format!(
                    "board-setup uses '{}', which is not on the board",
                    self.name(*missing)
                )));
            }
            setup.push(SetupDef {
                player,
                piece: raw.piece,
                positions: raw.positions.clone(),
                off: raw.off,
            });
        }

        let mut goals = Vec::with_capacity(self.goals.len());
        for (kind, players, block) in &self.goals {
            let players = players
                .iter()
                .map(|p| self.player(*p, "condition"))
                .collect::<Result<Vec<_>, _>>()?;
            goals.push(GoalDef {
                kind: *kind,
                players,
                block: *block,
            });
        }

        Ok(GameDef {
            title: self.title.clone(),
            description: self.description.clone(),
            history: self.history.clone(),
            strategy: self.strategy.clone(),
            thumbnail: self.thumbnail.clone(),
            default: self.default,
            variant,
            players: self.players.clone(),
            turn_order,
            options: self.options.clone(),
            board,
            setup,
            pieces: self.pieces.clone(),
            goals,
            move_priorities: self.move_priorities.clone(),
            program: Arc::clone(self.program),
        })
    }

    fn turn_order(&self) -> Result<TurnOrder, LoadError> {
        if self.turns.is_empty() {
            return Ok(TurnOrder::round_robin(self.players.len()));
        }
        let mut turns = Vec::with_capacity(self.turns.len());
        let mut repeat = 0;
        for entry in &self.turns {
            match entry {
                TurnEntry::Repeat => repeat = turns.len(),
                TurnEntry::Turn {
                    player,
                    mover,
                    move_type,
                } => turns.push(TurnDef {
                    player: self.player(*player, "turn-order")?,
                    mover: self.player(*mover, "turn-order")?,
                    move_type: *move_type,
                }),
            }
        }
        if matches!(self.turns.last(), Some(TurnEntry::Repeat)) {
            return Err(LoadError::definition("turn-order ends with repeat"));
        }
        Ok(TurnOrder::new(turns, repeat))
    }

    fn parse_turns(&mut self, args: Args<'_>) -> Result<(), ExecError> {
        for entry in args.list(0)? {
            let entry = nested(Op::TurnOrder, entry)?;
            if entry.is_empty() {
                self.turns.push(TurnEntry::Repeat);
                continue;
            }
            let player = entry.sym(0, DataType::Player)?;
            let mut mover = player;
            let mut move_type = None;
            for i in 1..entry.len() {
                let value = entry.value(i)?;
                match value {
                    Value::Player(p) => mover = *p,
                    Value::MoveType(t) => move_type = Some(*t),
                    _ => return Err(ExecError::operand(Op::TurnOrder.name(), "bad turn entry")),
                }
            }
            self.turns.push(TurnEntry::Turn {
                player,
                mover,
                move_type,
            });
        }
        Ok(())
    }

    fn parse_setup(&mut self, args: Args<'_>) -> Result<(), ExecError> {
        for group in args.list(0)? {
            let group = nested(Op::BoardSetup, group)?;
            self.setup.push(RawSetup {
                player: group.sym(0, DataType::Player)?,
                piece: group.sym(1, DataType::Piece)?,
                positions: syms(Op::BoardSetup, group.list(2)?, DataType::Position)?,
                off: to_u32(group.number(3)?, Op::BoardSetup)?,
            });
        }
        Ok(())
    }

    fn set_option(&mut self, name: &str, value: &Value) {
        let interner = self.program.interner();
        match (name, value) {
            ("pass turn", Value::Bool(true)) => self.options.pass_turn = PassTurn::Always,
            ("pass turn", Value::Bool(false)) => self.options.pass_turn = PassTurn::Never,
            ("pass turn", v) if v.sym().map(|s| interner.name(s)) == Some("forced") => {
                self.options.pass_turn = PassTurn::Forced;
            }
            ("recycle captures", Value::Bool(b)) => self.options.recycle_captures = *b,
            _ => {
                self.options.other.retain(|(n, _)| n != name);
                self.options.other.push((name.to_string(), value.clone()));
            }
        }
    }
}

impl Host for GameBuilder<'_> {
    fn call(&mut self, op: Op, items: Vec<Operand>) -> Result<Flow, ExecError> {
        let args = Args::new(op, &items);
        match op {
            Op::Title => self.title = args.text(0)?.to_string(),
            Op::Description => self.description = Some(args.text(0)?.to_string()),
            Op::History => self.history = Some(args.text(0)?.to_string()),
            Op::Strategy => self.strategy = Some(args.text(0)?.to_string()),
            Op::Thumbnail => self.thumbnail = Some(args.text(0)?.to_string()),
            Op::Default => self.default = true,
            Op::Players => {
                for player in syms(op, args.list(0)?, DataType::Player)? {
                    if !self.players.contains(&player) {
                        self.players.push(player);
                    }
                }
            }
            Op::TurnOrder => {
                self.turns.clear();
                self.parse_turns(args)?;
            }
            Op::GameOption => {
                let name = args.text(0)?.to_string();
                let value = args.value(1)?.clone();
                self.set_option(&name, &value);
            }
            Op::Board => {
                let mut board = BoardHost::new(self.program, self.diag);
                run_block(self.program, self.diag, args.block(0)?, &mut board)?;
                self.board = Some(board.builder.finish());
            }
            Op::BoardSetup => self.parse_setup(args)?,
            Op::Piece => {
                let mut piece = PieceHost::new(self.diag);
                run_block(self.program, self.diag, args.block(0)?, &mut piece)?;
                let def = piece.finish()?;
                self.pieces.retain(|p| p.name != def.name);
                self.pieces.push(def);
            }
            Op::WinCondition | Op::LossCondition | Op::DrawCondition => {
                let kind = match op {
                    Op::WinCondition => GoalKind::Win,
                    Op::LossCondition => GoalKind::Loss,
                    _ => GoalKind::Draw,
                };
                let players = syms(op, args.list(0)?, DataType::Player)?;
                self.goals.push((kind, players, args.block(1)?));
            }
            Op::MovePriorities => {
                self.move_priorities = syms(op, args.list(0)?, DataType::MoveType)?;
            }
            other => return Err(unsupported(other, "game")),
        }
        Ok(Flow::Continue)
    }
}

// === Board ===

struct BoardHost<'p> {
    program: &'p Program,
    diag: Diagnostics,
    builder: BoardBuilder,
}

impl<'p> BoardHost<'p> {
    fn new(program: &'p Program, diag: Diagnostics) -> Self {
        Self {
            program,
            diag,
            builder: BoardBuilder::new(),
        }
    }
}

impl Host for BoardHost<'_> {
    fn call(&mut self, op: Op, items: Vec<Operand>) -> Result<Flow, ExecError> {
        let args = Args::new(op, &items);
        match op {
            Op::Image => self.builder.add_images(texts(op, args.list(0)?)?),
            Op::Grid => {
                let mut grid = GridHost::default();
                run_block(self.program, self.diag, args.block(0)?, &mut grid)?;
                self.builder.add_grid(&grid.spec, self.program.interner())?;
            }
            Op::Positions => {
                for entry in args.list(0)? {
                    let entry = nested(op, entry)?;
                    let name = entry.sym(0, DataType::Position)?;
                    let rect = if entry.len() == 5 {
                        let n = |i| entry.number(i).and_then(|v| to_i32(v, op));
                        Some(Rect::new(n(1)?, n(2)?, n(3)?, n(4)?))
                    } else {
                        None
                    };
                    self.builder.add_position(name, rect);
                }
            }
            Op::Links => {
                let direction = args.sym(0, DataType::Direction)?;
                for pair in args.list(1)? {
                    let pair = nested(op, pair)?;
                    let from = pair.sym(0, DataType::Position)?;
                    let to = pair.sym(1, DataType::Position)?;
                    self.builder.add_link(from, direction, to);
                }
            }
            Op::Zone => {
                let mut zone = ZoneHost::default();
                run_block(self.program, self.diag, args.block(0)?, &mut zone)?;
                let name = zone.name.ok_or_else(|| ExecError::operand(op.name(), "zone has no name"))?;
                self.builder.add_zone(ZoneDef {
                    name,
                    players: zone.players,
                    positions: zone.positions,
                });
            }
            Op::Symmetry => {
                let player = args.sym(0, DataType::Player)?;
                for pair in args.list(1)? {
                    let pair = nested(op, pair)?;
                    self.builder.add_symmetry(
                        player,
                        pair.sym(0, DataType::Direction)?,
                        pair.sym(1, DataType::Direction)?,
                    );
                }
            }
            Op::Unlink => self.builder.unlink(syms(op, args.list(0)?, DataType::Position)?),
            Op::KillPositions => self.builder.kill(syms(op, args.list(0)?, DataType::Position)?),
            other => return Err(unsupported(other, "board")),
        }
        Ok(Flow::Continue)
    }
}

#[derive(Default)]
struct GridHost {
    spec: GridSpec,
}

impl Host for GridHost {
    fn call(&mut self, op: Op, items: Vec<Operand>) -> Result<Flow, ExecError> {
        let args = Args::new(op, &items);
        match op {
            Op::StartRectangle => {
                let n = |i| args.number(i).and_then(|v| to_i32(v, op));
                self.spec.start = Rect::new(n(0)?, n(1)?, n(2)?, n(3)?);
            }
            Op::Dimensions => {
                for dim in args.list(0)? {
                    let dim = nested(op, dim)?;
                    let labels = dim.text(0)?.split('/').map(str::to_string).collect();
                    let offsets = nested(op, dim.operand(1)?)?;
                    let offsets = (0..offsets.len())
                        .map(|i| offsets.number(i).and_then(|v| to_i32(v, op)))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.spec.dimensions.push((labels, offsets));
                }
            }
            Op::Directions => {
                for entry in args.list(0)? {
                    let entry = nested(op, entry)?;
                    let name = entry.sym(0, DataType::Direction)?;
                    let offsets = (1..entry.len())
                        .map(|i| entry.number(i).and_then(|v| to_i32(v, op)))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.spec.directions.push((name, offsets));
                }
            }
            other => return Err(unsupported(other, "grid")),
        }
        Ok(Flow::Continue)
    }
}

#[derive(Default)]
struct ZoneHost {
    name: Option<Sym>,
    players: Vec<Sym>,
    positions: Vec<Sym>,
}

impl Host for ZoneHost {
    fn call(&mut self, op: Op, items: Vec<Operand>) -> Result<Flow, ExecError> {
        let args = Args::new(op, &items);
        match op {
            Op::Name => self.name = Some(args.sym(0, DataType::Zone)?),
            Op::Players => self.players.extend(syms(op, args.list(0)?, DataType::Player)?),
            Op::Positions => self
                .positions
                .extend(syms(op, args.list(0)?, DataType::Position)?),
            other => return Err(unsupported(other, "zone")),
        }
        Ok(Flow::Continue)
    }
}

// === Piece ===

struct PieceHost {
    diag: Diagnostics,
    def: Option<PieceDef>,
    pending: Vec<(Op, Vec<Operand>)>,
}

impl PieceHost {
    fn new(diag: Diagnostics) -> Self {
        Self {
            diag,
            def: None,
            pending: Vec::new(),
        }
    }

    /// Clauses may precede `name`; they are replayed once the name is known.
    fn finish(mut self) -> Result<PieceDef, ExecError> {
        let mut def = self
            .def
            .take()
            .ok_or_else(|| ExecError::operand(Op::Piece.name(), "piece has no name"))?;
        for (op, items) in std::mem::take(&mut self.pending) {
            apply_piece_clause(&mut def, op, Args::new(op, &items))?;
        }
        if self.diag.enabled(LEVEL_DETAIL) {
            tracing::debug!(
                piece = def.name.raw(),
                drops = def.drops.len(),
                moves = def.moves.len(),
                "built piece"
            );
        }
        Ok(def)
    }
}

impl Host for PieceHost {
    fn call(&mut self, op: Op, items: Vec<Operand>) -> Result<Flow, ExecError> {
        if op == Op::Name {
            let name = Args::new(op, &items).sym(0, DataType::Piece)?;
            self.def = Some(PieceDef::new(name));
            return Ok(Flow::Continue);
        }
        match &mut self.def {
            Some(def) => apply_piece_clause(def, op, Args::new(op, &items))?,
            None => self.pending.push((op, items)),
        }
        Ok(Flow::Continue)
    }
}

fn apply_piece_clause(def: &mut PieceDef, op: Op, args: Args<'_>) -> Result<(), ExecError> {
    match op {
        Op::Help => def.help.extend(texts(op, args.list(0)?)?),
        Op::Description => def.description = Some(args.text(0)?.to_string()),
        Op::Notation => def.notation = Some(args.text(0)?.to_string()),
        Op::Image => {
            for group in args.list(0)? {
                let group = nested(op, group)?;
                let player = group.sym(0, DataType::Player)?;
                let images = (1..group.len())
                    .map(|i| group.text(i).map(str::to_string))
                    .collect::<Result<Vec<_>, _>>()?;
                def.images.retain(|(p, _)| *p != player);
                def.images.push((player, images));
            }
        }
        Op::Attribute => {
            let attribute = args.sym(0, DataType::Attribute)?;
            let value = args.bool(1)?;
            def.attributes.retain(|(a, _)| *a != attribute);
            def.attributes.push((attribute, value));
        }
        Op::Dummy => def.dummy = true,
        Op::Drops => def.drops.extend(move_programs(args)?),
        Op::Moves => def.moves.extend(move_programs(args)?),
        other => return Err(unsupported(other, "piece")),
    }
    Ok(())
}

fn move_programs(args: Args<'_>) -> Result<Vec<MoveProgram>, ExecError> {
    args.list(0)?
        .iter()
        .map(|entry| {
            let entry = nested(Op::Moves, entry)?;
            let move_type = match entry.value(0)? {
                Value::MoveType(t) => Some(*t),
                _ => None,
            };
            let restrict = match entry.value(1)? {
                Value::Position(p) => Some(StartRestriction::Position(*p)),
                Value::Zone(z) => Some(StartRestriction::Zone(*z)),
                _ => None,
            };
            Ok(MoveProgram {
                block: entry.block(2)?,
                move_type,
                restrict,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::load_program;
    use crate::core::EngineConfig;
    use crate::defs::menu::build_menu;
    use crate::lang::preprocess::MemoryLoader;

    fn build(text: &str) -> Result<Vec<Arc<GameDef>>, LoadError> {
        let loader = MemoryLoader::new().with_file("g.zrf", text);
        let mut diag = Diagnostics::quiet();
        let program = load_program(&loader, "g.zrf", &EngineConfig::default(), &mut diag)?;
        let menu = build_menu(Arc::new(program), diag)?;
        Ok(menu.entries().iter().map(|e| Arc::clone(&e.game)).collect())
    }

    const CHESSLIKE: &str = r#"
        (game
          (title "Mini")
          (players White Black)
          (turn-order White Black (White drop-type) repeat Black)
          (option "pass turn" forced)
          (option "recycle captures" true)
          (option "animate" false)
          (board
            (image "board.bmp")
            (grid
              (start-rectangle 0 0 20 20)
              (dimensions ("a/b/c" (20 0)) ("3/2/1" (0 20)))
              (directions (n 0 -1) (s 0 1) (e 1 0) (w -1 0)))
            (symmetry Black (n s) (s n))
            (zone (name back-row) (players White) (positions a3 b3 c3)))
          (board-setup (White (Pawn a1 b1) (Pawn off 2)) (Black (Pawn a3)))
          (piece
            (name Pawn)
            (description "moves forward")
            (image White "wp.bmp" Black "bp.bmp")
            (attribute fresh true)
            (moves (move-type advance) (n (verify empty?) add)))
          (loss-condition (White Black) stalemated))
    "#;

    #[test]
    fn test_build_full_game() {
        let games = build(CHESSLIKE).unwrap();
        let game = &games[0];
        assert_eq!(game.title, "Mini");
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.options.pass_turn, PassTurn::Forced);
        assert!(game.options.recycle_captures);
        assert_eq!(game.options.other.len(), 1);

        assert_eq!(game.turn_order.turns().len(), 4);
        assert_eq!(game.turn_order.repeat_start(), 3);
        assert!(game.turn_order.turns()[2].move_type.is_some());
        assert!(game.turn_order.turns()[1].move_type.is_none());

        let board = &game.board;
        assert_eq!(board.positions().len(), 9);
        assert_eq!(board.images(), ["board.bmp".to_string()]);
        let n = game.program.interner().get("n").unwrap();
        let s = game.program.interner().get("s").unwrap();
        assert_eq!(board.symmetric(game.players[1], n), s);
        assert_eq!(board.opposite(n), Some(s));

        assert_eq!(game.setup.len(), 3);
        assert_eq!(game.setup[1].off, 2);
        let pawn = &game.pieces[0];
        assert_eq!(pawn.moves.len(), 1);
        assert!(pawn.moves[0].move_type.is_some());
        assert_eq!(pawn.images.len(), 2);
        assert_eq!(game.goals[0].players.len(), 2);
    }

    #[test]
    fn test_turn_order_move_type_entry() {
        let games = build(CHESSLIKE).unwrap();
        let white_drop = games[0].turn_order.turns()[2];
        assert_eq!(white_drop.player, PlayerId::new(0));
    }

    #[test]
    fn test_repeat_last_is_rejected() {
        let text = "(game (players A B) (turn-order A B repeat))";
        assert!(matches!(build(text), Err(LoadError::Definition { .. })));
    }

    #[test]
    fn test_setup_off_board_position() {
        let text = r#"
            (game (players A) (board (positions (a1)))
              (piece (name P))
              (board-setup (A (P z9))))
        "#;
        let err = build(text).unwrap_err();
        assert!(err.to_string().contains("z9"), "{err}");
    }

    #[test]
    fn test_setup_unknown_piece() {
        let text = r#"
            (game (players A) (board (positions (a1)))
              (board-setup (A (Ghost a1))))
        "#;
        assert!(matches!(build(text), Err(LoadError::Definition { .. })));
    }

    #[test]
    fn test_no_players() {
        assert!(matches!(build("(game (title \"x\"))"), Err(LoadError::Definition { .. })));
    }

    #[test]
    fn test_too_many_players() {
        let names = |n: usize| (0..n).map(|i| format!("P{i}")).collect::<Vec<_>>().join(" ");
        let game = |n: usize| {
            format!(
                "(game (players {}) (board (positions (a1 0 0 10 10))))",
                names(n)
            )
        };
        let err = build(&game(PlayerId::MAX_PLAYERS + 1)).unwrap_err();
        assert!(matches!(err, LoadError::Definition { .. }));
        assert!(err.to_string().contains("more than 255"));

        let games = build(&game(PlayerId::MAX_PLAYERS)).unwrap();
        let last = games[0].players[PlayerId::MAX_PLAYERS - 1];
        assert_eq!(games[0].player_id(last), PlayerId::from_index(254));
    }
}

//! The static built-in table.
//!
//! Every DSL keyword that names an operation is one `BuiltinSpec`: its
//! external name, the context whose predefined scope owns it, its parameter
//! list, its result type and the `Op` the evaluator hands to the host.
//!
//! ## Naming
//!
//! - Hyphenated names (`add-copy-partial`, `kill-positions`).
//! - Predicates end in `?` and return `Bool`.
//! - Most predicates have a `not-` twin. The twin shares the positive `Op`
//!   and is compiled as the positive call followed by `Not`.
//!
//! ## Parameters
//!
//! Optional parameters are matched by type, so a host receives a variable
//! number of operands and inspects their tags.

use serde::{Deserialize, Serialize};

use crate::core::DataType;

/// A DSL context. Each has its own predefined scope and its own host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Context {
    Menu,
    Game,
    Board,
    Grid,
    Zone,
    Piece,
    Move,
    Goal,
}

impl Context {
    pub const ALL: [Context; 8] = [
        Context::Menu,
        Context::Game,
        Context::Board,
        Context::Grid,
        Context::Zone,
        Context::Piece,
        Context::Move,
        Context::Goal,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Context::Menu => "menu",
            Context::Game => "game",
            Context::Board => "board",
            Context::Grid => "grid",
            Context::Zone => "zone",
            Context::Piece => "piece",
            Context::Move => "move",
            Context::Goal => "goal",
        }
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation handed to a host by `Instr::Call`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    // menu
    Game,
    Variant,
    // game
    Title,
    Description,
    History,
    Strategy,
    Thumbnail,
    Default,
    Players,
    TurnOrder,
    GameOption,
    Board,
    BoardSetup,
    Piece,
    WinCondition,
    LossCondition,
    DrawCondition,
    MovePriorities,
    // board
    Image,
    Grid,
    Positions,
    Links,
    Zone,
    Symmetry,
    Unlink,
    KillPositions,
    // grid
    StartRectangle,
    Dimensions,
    Directions,
    // zone and piece
    Name,
    Help,
    Notation,
    Attribute,
    Dummy,
    Drops,
    Moves,
    // move: cursor
    Step,
    GoPosition,
    Mark,
    Back,
    From,
    To,
    Go,
    Opposite,
    Verify,
    // move: actions
    Add,
    AddPartial,
    AddCopy,
    AddCopyPartial,
    Capture,
    Cascade,
    ChangeOwner,
    ChangeType,
    Create,
    Flip,
    SetAttribute,
    SetFlag,
    SetPositionFlag,
    // move: predicates
    Flag,
    Empty,
    Friend,
    Enemy,
    Neutral,
    OnBoard,
    InZone,
    AdjacentToEnemy,
    IsPiece,
    IsPosition,
    PositionFlag,
    LastFrom,
    LastTo,
    AttributeTest,
    // goal
    RelativeConfig,
    AbsoluteConfig,
    PiecesRemaining,
    TotalPieceCount,
    Stalemated,
    Checkmated,
    Captured,
    Repetition,
}

impl Op {
    /// Name used in diagnostics and errors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Op::Step => "step",
            Op::GoPosition => "go-position",
            Op::AttributeTest => "attribute?",
            Op::GameOption => "option",
            Op::IsPiece => "piece?",
            Op::IsPosition => "position?",
            other => BUILTINS
                .iter()
                .find(|spec| spec.op == other && !spec.negated)
                .map_or("?", |spec| spec.name),
        }
    }

    /// Goal predicates evaluated before move generation.
    #[must_use]
    pub fn is_phase_one(self) -> bool {
        matches!(
            self,
            Op::RelativeConfig | Op::AbsoluteConfig | Op::PiecesRemaining | Op::TotalPieceCount
        )
    }
}

/// Dedicated sub-parser for an argument list that does not fit the
/// generic parameter kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    TurnOrder,
    Setup,
    Positions,
    GridDims,
    GridDirs,
    PieceImages,
    MoveBlocks,
    RelativeConfig,
    AbsoluteConfig,
}

/// One formal parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Param {
    /// Exactly one value.
    Value(DataType),
    /// Zero or one value, matched by type.
    Opt(DataType),
    /// Trailing run of values, pushed as one list.
    Seq(DataType),
    /// One parenthesised list of values.
    List(DataType),
    /// Trailing run of parenthesised pairs, pushed as one list of pairs.
    Pairs(DataType, DataType),
    /// The remaining arguments, compiled as a nested block.
    Block(Context),
    /// An inline boolean expression.
    Expr,
    /// One bare keyword from a fixed set, pushed as its index.
    Choice(&'static [&'static str]),
    /// Dedicated sub-parser consuming all remaining arguments.
    Special(Aggregate),
}

impl Param {
    #[must_use]
    pub fn is_required(self) -> bool {
        !matches!(self, Param::Opt(_) | Param::Seq(_) | Param::Pairs(..))
    }
}

/// Index into [`BUILTINS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinId(pub u16);

impl BuiltinId {
    #[must_use]
    pub fn spec(self) -> &'static BuiltinSpec {
        &BUILTINS[self.0 as usize]
    }
}

/// Static signature of one built-in.
#[derive(Debug)]
pub struct BuiltinSpec {
    pub name: &'static str,
    pub context: Context,
    pub params: &'static [Param],
    pub result: DataType,
    pub op: Op,
    /// `not-` form: compile the call, then `Not`.
    pub negated: bool,
}

impl BuiltinSpec {
    /// Callable with no arguments (usable as a bare identifier).
    #[must_use]
    pub fn is_nullary(&self) -> bool {
        self.params.iter().all(|p| !p.is_required())
    }
}

/// Targets of `(go ...)`, in operand order.
pub const GO_TARGETS: &[&str] = &["from", "to", "mark", "last-from", "last-to"];

use Context as C;
use DataType as T;
use Param as P;

const fn entry(
    name: &'static str,
    context: Context,
    params: &'static [Param],
    result: DataType,
    op: Op,
) -> BuiltinSpec {
    BuiltinSpec {
        name,
        context,
        params,
        result,
        op,
        negated: false,
    }
}

const fn negated(
    name: &'static str,
    context: Context,
    params: &'static [Param],
    op: Op,
) -> BuiltinSpec {
    BuiltinSpec {
        name,
        context,
        params,
        result: T::Bool,
        op,
        negated: true,
    }
}

const TEXT: &[Param] = &[P::Value(T::Text)];
const NONE: &[Param] = &[];
const AT: &[Param] = &[P::Opt(T::Locator)];
const POSITION_AT: &[Param] = &[P::Value(T::Position), P::Opt(T::Locator)];
const CONDITION: &[Param] = &[P::List(T::Player), P::Block(C::Goal)];

/// Every built-in, grouped by context.
pub static BUILTINS: &[BuiltinSpec] = &[
    // menu
    entry("game", C::Menu, &[P::Block(C::Game)], T::Nothing, Op::Game),
    entry("variant", C::Menu, &[P::Block(C::Game)], T::Nothing, Op::Variant),
    // game
    entry("title", C::Game, TEXT, T::Nothing, Op::Title),
    entry("description", C::Game, TEXT, T::Nothing, Op::Description),
    entry("history", C::Game, TEXT, T::Nothing, Op::History),
    entry("strategy", C::Game, TEXT, T::Nothing, Op::Strategy),
    entry("thumbnail", C::Game, TEXT, T::Nothing, Op::Thumbnail),
    entry("default", C::Game, NONE, T::Nothing, Op::Default),
    entry("players", C::Game, &[P::Seq(T::Player)], T::Nothing, Op::Players),
    entry("turn-order", C::Game, &[P::Special(Aggregate::TurnOrder)], T::Nothing, Op::TurnOrder),
    entry("option", C::Game, &[P::Value(T::Text), P::Value(T::Any)], T::Nothing, Op::GameOption),
    entry("board", C::Game, &[P::Block(C::Board)], T::Nothing, Op::Board),
    entry("board-setup", C::Game, &[P::Special(Aggregate::Setup)], T::Nothing, Op::BoardSetup),
    entry("piece", C::Game, &[P::Block(C::Piece)], T::Nothing, Op::Piece),
    entry("win-condition", C::Game, CONDITION, T::Nothing, Op::WinCondition),
    entry("loss-condition", C::Game, CONDITION, T::Nothing, Op::LossCondition),
    entry("draw-condition", C::Game, CONDITION, T::Nothing, Op::DrawCondition),
    entry("move-priorities", C::Game, &[P::Seq(T::MoveType)], T::Nothing, Op::MovePriorities),
    // board
    entry("image", C::Board, &[P::Seq(T::Text)], T::Nothing, Op::Image),
    entry("grid", C::Board, &[P::Block(C::Grid)], T::Nothing, Op::Grid),
    entry("positions", C::Board, &[P::Special(Aggregate::Positions)], T::Nothing, Op::Positions),
    entry(
        "links",
        C::Board,
        &[P::Value(T::Direction), P::Pairs(T::Position, T::Position)],
        T::Nothing,
        Op::Links,
    ),
    entry("zone", C::Board, &[P::Block(C::Zone)], T::Nothing, Op::Zone),
    entry(
        "symmetry",
        C::Board,
        &[P::Value(T::Player), P::Pairs(T::Direction, T::Direction)],
        T::Nothing,
        Op::Symmetry,
    ),
    entry("unlink", C::Board, &[P::Seq(T::Position)], T::Nothing, Op::Unlink),
    entry("kill-positions", C::Board, &[P::Seq(T::Position)], T::Nothing, Op::KillPositions),
    // grid
    entry(
        "start-rectangle",
        C::Grid,
        &[
            P::Value(T::Number),
            P::Value(T::Number),
            P::Value(T::Number),
            P::Value(T::Number),
        ],
        T::Nothing,
        Op::StartRectangle,
    ),
    entry("dimensions", C::Grid, &[P::Special(Aggregate::GridDims)], T::Nothing, Op::Dimensions),
    entry("directions", C::Grid, &[P::Special(Aggregate::GridDirs)], T::Nothing, Op::Directions),
    // zone
    entry("name", C::Zone, &[P::Value(T::Zone)], T::Nothing, Op::Name),
    entry("players", C::Zone, &[P::Seq(T::Player)], T::Nothing, Op::Players),
    entry("positions", C::Zone, &[P::Seq(T::Position)], T::Nothing, Op::Positions),
    // piece
    entry("name", C::Piece, &[P::Value(T::Piece)], T::Nothing, Op::Name),
    entry("help", C::Piece, &[P::Seq(T::Text)], T::Nothing, Op::Help),
    entry("description", C::Piece, TEXT, T::Nothing, Op::Description),
    entry("notation", C::Piece, TEXT, T::Nothing, Op::Notation),
    entry("image", C::Piece, &[P::Special(Aggregate::PieceImages)], T::Nothing, Op::Image),
    entry(
        "attribute",
        C::Piece,
        &[P::Value(T::Attribute), P::Value(T::Bool)],
        T::Nothing,
        Op::Attribute,
    ),
    entry("dummy", C::Piece, NONE, T::Nothing, Op::Dummy),
    entry("drops", C::Piece, &[P::Special(Aggregate::MoveBlocks)], T::Nothing, Op::Drops),
    entry("moves", C::Piece, &[P::Special(Aggregate::MoveBlocks)], T::Nothing, Op::Moves),
    // move: cursor and control
    entry("mark", C::Move, AT, T::Nothing, Op::Mark),
    entry("back", C::Move, NONE, T::Nothing, Op::Back),
    entry("from", C::Move, AT, T::Nothing, Op::From),
    entry("to", C::Move, AT, T::Nothing, Op::To),
    entry("go", C::Move, &[P::Choice(GO_TARGETS)], T::Nothing, Op::Go),
    entry("opposite", C::Move, &[P::Value(T::Direction)], T::Direction, Op::Opposite),
    entry("verify", C::Move, &[P::Expr], T::Nothing, Op::Verify),
    // move: actions
    entry("add", C::Move, &[P::Seq(T::Piece)], T::Nothing, Op::Add),
    entry("add-partial", C::Move, &[P::Opt(T::MoveType)], T::Nothing, Op::AddPartial),
    entry("add-copy", C::Move, &[P::Seq(T::Piece)], T::Nothing, Op::AddCopy),
    entry("add-copy-partial", C::Move, &[P::Opt(T::MoveType)], T::Nothing, Op::AddCopyPartial),
    entry("capture", C::Move, AT, T::Nothing, Op::Capture),
    entry("cascade", C::Move, NONE, T::Nothing, Op::Cascade),
    entry("change-owner", C::Move, AT, T::Nothing, Op::ChangeOwner),
    entry(
        "change-type",
        C::Move,
        &[P::Value(T::Piece), P::Opt(T::Locator)],
        T::Nothing,
        Op::ChangeType,
    ),
    entry(
        "create",
        C::Move,
        &[P::Opt(T::Player), P::Value(T::Piece), P::Opt(T::Locator)],
        T::Nothing,
        Op::Create,
    ),
    entry("flip", C::Move, AT, T::Nothing, Op::Flip),
    entry(
        "set-attribute",
        C::Move,
        &[P::Value(T::Attribute), P::Expr],
        T::Nothing,
        Op::SetAttribute,
    ),
    entry("set-flag", C::Move, &[P::Value(T::Ident), P::Expr], T::Nothing, Op::SetFlag),
    entry(
        "set-position-flag",
        C::Move,
        &[P::Value(T::Ident), P::Expr],
        T::Nothing,
        Op::SetPositionFlag,
    ),
    // move: predicates
    entry("flag?", C::Move, &[P::Value(T::Ident)], T::Bool, Op::Flag),
    negated("not-flag?", C::Move, &[P::Value(T::Ident)], Op::Flag),
    entry("empty?", C::Move, AT, T::Bool, Op::Empty),
    negated("not-empty?", C::Move, AT, Op::Empty),
    entry("friend?", C::Move, AT, T::Bool, Op::Friend),
    negated("not-friend?", C::Move, AT, Op::Friend),
    entry("enemy?", C::Move, AT, T::Bool, Op::Enemy),
    negated("not-enemy?", C::Move, AT, Op::Enemy),
    entry("neutral?", C::Move, AT, T::Bool, Op::Neutral),
    negated("not-neutral?", C::Move, AT, Op::Neutral),
    entry("on-board?", C::Move, AT, T::Bool, Op::OnBoard),
    negated("not-on-board?", C::Move, AT, Op::OnBoard),
    entry("in-zone?", C::Move, &[P::Value(T::Zone), P::Opt(T::Locator)], T::Bool, Op::InZone),
    negated("not-in-zone?", C::Move, &[P::Value(T::Zone), P::Opt(T::Locator)], Op::InZone),
    entry("adjacent-to-enemy?", C::Move, AT, T::Bool, Op::AdjacentToEnemy),
    negated("not-adjacent-to-enemy?", C::Move, AT, Op::AdjacentToEnemy),
    entry("piece?", C::Move, &[P::Value(T::Piece), P::Opt(T::Locator)], T::Bool, Op::IsPiece),
    negated("not-piece?", C::Move, &[P::Value(T::Piece), P::Opt(T::Locator)], Op::IsPiece),
    entry("position?", C::Move, POSITION_AT, T::Bool, Op::IsPosition),
    negated("not-position?", C::Move, POSITION_AT, Op::IsPosition),
    entry(
        "position-flag?",
        C::Move,
        &[P::Value(T::Ident), P::Opt(T::Locator)],
        T::Bool,
        Op::PositionFlag,
    ),
    negated(
        "not-position-flag?",
        C::Move,
        &[P::Value(T::Ident), P::Opt(T::Locator)],
        Op::PositionFlag,
    ),
    entry("last-from?", C::Move, AT, T::Bool, Op::LastFrom),
    negated("not-last-from?", C::Move, AT, Op::LastFrom),
    entry("last-to?", C::Move, AT, T::Bool, Op::LastTo),
    negated("not-last-to?", C::Move, AT, Op::LastTo),
    // goal
    entry(
        "relative-config",
        C::Goal,
        &[P::Special(Aggregate::RelativeConfig)],
        T::Bool,
        Op::RelativeConfig,
    ),
    entry(
        "absolute-config",
        C::Goal,
        &[P::Special(Aggregate::AbsoluteConfig)],
        T::Bool,
        Op::AbsoluteConfig,
    ),
    entry(
        "pieces-remaining",
        C::Goal,
        &[P::Value(T::Number), P::Opt(T::Piece)],
        T::Bool,
        Op::PiecesRemaining,
    ),
    entry(
        "total-piece-count",
        C::Goal,
        &[P::Value(T::Number), P::Opt(T::Piece)],
        T::Bool,
        Op::TotalPieceCount,
    ),
    entry("stalemated", C::Goal, NONE, T::Bool, Op::Stalemated),
    entry("checkmated", C::Goal, &[P::Value(T::Piece)], T::Bool, Op::Checkmated),
    entry("captured", C::Goal, &[P::Value(T::Piece)], T::Bool, Op::Captured),
    entry("repetition", C::Goal, NONE, T::Bool, Op::Repetition),
];

/// Iterate over the built-ins owned by one context.
pub fn builtins_for(context: Context) -> impl Iterator<Item = (BuiltinId, &'static BuiltinSpec)> {
    BUILTINS
        .iter()
        .enumerate()
        .filter(move |(_, spec)| spec.context == context)
        .map(|(i, spec)| (BuiltinId(i as u16), spec))
}

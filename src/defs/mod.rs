//! Static game definitions built by running compiled definition blocks.
//!
//! - `board`: positions, links, zones and symmetries
//! - `piece`: piece types with their drop and move programs
//! - `game`: turn order, options, setup and goals
//! - `builder`: one host per definition context
//! - `menu`: the list of games and variants of a program

pub mod board;
pub mod builder;
pub mod game;
pub mod menu;
pub mod piece;

pub use board::{BoardBuilder, BoardDef, GridSpec, LinkDef, PositionDef, Rect, ZoneDef};
pub use builder::GameBuilder;
pub use game::{
    GameDef, GameOptions, GoalDef, GoalKind, PassTurn, SetupDef, TurnDef, TurnOrder,
};
pub use menu::{build_menu, Menu, MenuEntry};
pub use piece::{MoveProgram, PieceDef, StartRestriction};

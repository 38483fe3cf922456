//! Host-facing session over one loaded program.
//!
//! A `GameSession` owns the compiled menu, the selected game's board arena,
//! the line of play with an undo cursor, and the session RNG. Hosts query
//! and command it; search collaborators use it through `SearchHost`.
//!
//! ```
//! use rust_abg::core::EngineConfig;
//! use rust_abg::session::GameSession;
//!
//! let text = r#"
//!     (game (title "Line") (players A B)
//!       (board (grid (start-rectangle 0 0 10 10)
//!                    (dimensions ("a/b/c" (10 0)) ("1" (0 10)))
//!                    (directions (e 1 0))))
//!       (board-setup (A (Man a1)))
//!       (piece (name Man) (moves (e add))))
//! "#;
//! let mut session = GameSession::load_text(text, EngineConfig::default()).unwrap();
//! assert_eq!(session.titles(), vec!["Line"]);
//! assert_eq!(session.legal_moves().unwrap().len(), 1);
//! session.make_move(0).unwrap();
//! assert!(session.undo());
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use im::OrdMap;

use crate::compile::{load_program, Program};
use crate::core::diag::{LEVEL_DETAIL, LEVEL_SUMMARY};
use crate::core::{Diagnostics, EngineConfig, GameRng, PlayerId, Sym};
use crate::defs::{build_menu, GameDef, Menu};
use crate::error::{EngineError, LoadError};
use crate::lang::{FsLoader, SourceLoader};
use crate::model::{ArenaMark, BoardArena, BoardId, BoardModel, MoveModel, PieceModel};
use crate::rules::{GameResult, SearchHost};

/// Name under which program text is compiled.
const TEXT_NAME: &str = "<text>";

/// Serves the top-level text from memory and includes from disk.
struct TextLoader<'t> {
    text: &'t str,
    fs: FsLoader,
}

impl SourceLoader for TextLoader<'_> {
    fn load(&self, path: &str, from: Option<&Path>) -> io::Result<(PathBuf, String)> {
        if from.is_none() && path == TEXT_NAME {
            return Ok((PathBuf::from(TEXT_NAME), self.text.to_string()));
        }
        self.fs.load(path, from)
    }
}

/// One loaded program and the game being played.
#[derive(Debug)]
pub struct GameSession {
    config: EngineConfig,
    diag: Diagnostics,
    menu: Menu,
    selected: usize,
    arena: BoardArena,
    /// Boards from the setup to the furthest move made.
    line: Vec<BoardId>,
    /// Index into `line` of the current board.
    cursor: usize,
    rng: GameRng,
}

impl GameSession {
    /// Compile program text. `#include` resolves on disk against the
    /// configured include directories.
    pub fn load_text(text: &str, config: EngineConfig) -> Result<Self, LoadError> {
        let loader = TextLoader {
            text,
            fs: FsLoader::new(config.include_dirs.clone()),
        };
        Self::load_with(&loader, TEXT_NAME, config)
    }

    /// Compile a program file.
    pub fn load_file(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, LoadError> {
        let loader = FsLoader::new(config.include_dirs.clone());
        let path = path.as_ref().to_string_lossy();
        Self::load_with(&loader, &path, config)
    }

    /// Compile through any loader.
    pub fn load_with(
        loader: &dyn SourceLoader,
        path: &str,
        config: EngineConfig,
    ) -> Result<Self, LoadError> {
        let mut diag = Diagnostics::new(config.noisy);
        let program = load_program(loader, path, &config, &mut diag)?;
        Self::from_program(program, config, diag)
    }

    /// Build the menu of a compiled program and start its default game.
    pub fn from_program(
        program: Program,
        config: EngineConfig,
        diag: Diagnostics,
    ) -> Result<Self, LoadError> {
        let menu = build_menu(Arc::new(program), diag)?;
        let selected = menu.default_index();
        let (arena, root) = Self::start(&menu, selected, &config, diag).map_err(|err| match err {
            EngineError::Exec(err) => LoadError::Exec(err),
            EngineError::Load(err) => err,
            other => LoadError::definition(other.to_string()),
        })?;
        if diag.enabled(LEVEL_SUMMARY) {
            tracing::debug!(games = menu.len(), selected, "session loaded");
        }
        Ok(Self {
            rng: GameRng::new(config.seed),
            config,
            diag,
            menu,
            selected,
            arena,
            line: vec![root],
            cursor: 0,
        })
    }

    fn start(
        menu: &Menu,
        index: usize,
        config: &EngineConfig,
        diag: Diagnostics,
    ) -> Result<(BoardArena, BoardId), EngineError> {
        let entry = menu.get(index).ok_or(EngineError::NoVariant(index))?;
        let mut arena = BoardArena::new(Arc::clone(&entry.game), config, diag);
        let root = arena.create_setup()?;
        Ok((arena, root))
    }

    // === Menu ===

    /// Titles of the games and variants, in menu order.
    #[must_use]
    pub fn titles(&self) -> Vec<&str> {
        self.menu.entries().iter().map(|e| e.title.as_str()).collect()
    }

    #[must_use]
    pub fn thumbnails(&self) -> Vec<Option<&str>> {
        self.menu
            .entries()
            .iter()
            .map(|e| e.thumbnail.as_deref())
            .collect()
    }

    #[must_use]
    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    #[must_use]
    pub fn selected_variant(&self) -> usize {
        self.selected
    }

    /// Switch to menu entry `index` and start it from its setup.
    pub fn select_variant(&mut self, index: usize) -> Result<(), EngineError> {
        let (arena, root) = Self::start(&self.menu, index, &self.config, self.diag)?;
        self.selected = index;
        self.arena = arena;
        self.line = vec![root];
        self.cursor = 0;
        Ok(())
    }

    // === Queries ===

    /// Definition of the selected game: board, pieces, zones, links.
    #[must_use]
    pub fn game(&self) -> &Arc<GameDef> {
        self.arena.game()
    }

    /// Name of an interned symbol.
    #[must_use]
    pub fn name(&self, sym: Sym) -> &str {
        self.arena.game().name(sym)
    }

    #[must_use]
    pub fn current(&self) -> BoardId {
        self.line[self.cursor]
    }

    pub fn board(&self) -> Result<&BoardModel, EngineError> {
        Ok(self.arena.board(self.current())?)
    }

    /// Player to move on the current board.
    pub fn turn_player(&self) -> Result<PlayerId, EngineError> {
        Ok(self.arena.turn(self.current())?.player)
    }

    pub fn legal_moves(&self) -> Result<&[MoveModel], EngineError> {
        Ok(self.arena.legal_moves(self.current())?)
    }

    /// Pieces on the current board by position.
    pub fn pieces(&self) -> Result<&OrdMap<Sym, PieceModel>, EngineError> {
        Ok(self.board()?.played())
    }

    /// Off-board stock per player and piece type.
    pub fn store(&self) -> Result<&OrdMap<(PlayerId, Sym), u32>, EngineError> {
        Ok(self.board()?.store())
    }

    pub fn result(&self) -> Result<Option<GameResult>, EngineError> {
        Ok(self.arena.result(self.current())?)
    }

    // === Commands ===

    /// Play legal move `index`. Moves ahead of the cursor are discarded,
    /// along with every board stored after the current one.
    pub fn make_move(&mut self, index: usize) -> Result<BoardId, EngineError> {
        let current = self.current();
        let board = self.arena.successor(current, index)?;
        self.arena.truncate_after(current);
        let next = self.arena.push(board);
        if self.diag.enabled(LEVEL_DETAIL) {
            tracing::debug!(parent = %current, board = %next, index, "move made");
        }
        self.line.truncate(self.cursor + 1);
        self.line.push(next);
        self.cursor += 1;
        Ok(next)
    }

    /// Step back one move. Returns false at the setup.
    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    /// Step forward along the line. Returns false at its end.
    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 >= self.line.len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Return to the setup and forget the line.
    pub fn restart(&mut self) {
        self.line.truncate(1);
        self.cursor = 0;
        self.arena.truncate_after(self.line[0]);
    }

    /// Boards held in the arena.
    #[must_use]
    pub fn stored_boards(&self) -> usize {
        self.arena.len()
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }

    /// Uniform index in `0..len`; 0 when `len` is 0.
    pub fn random_index(&mut self, len: usize) -> usize {
        self.rng.gen_index(len)
    }

    /// Independent generator for a concurrent exploration.
    pub fn fork_rng(&mut self) -> GameRng {
        self.rng.fork()
    }
}

impl SearchHost for GameSession {
    fn current(&self) -> BoardId {
        GameSession::current(self)
    }

    fn legal_moves(&self, board: BoardId) -> Result<&[MoveModel], EngineError> {
        Ok(self.arena.legal_moves(board)?)
    }

    fn successor(&mut self, board: BoardId, index: usize) -> Result<BoardId, EngineError> {
        self.arena.make_move(board, index)
    }

    fn result(&self, board: BoardId) -> Result<Option<GameResult>, EngineError> {
        Ok(self.arena.result(board)?)
    }

    fn random_index(&mut self, len: usize) -> usize {
        GameSession::random_index(self, len)
    }

    fn checkpoint(&self) -> ArenaMark {
        self.arena.checkpoint()
    }

    /// Boards on the line of play are kept whatever `mark` says.
    fn rollback(&mut self, mark: ArenaMark) {
        let keep = self.line.last().copied().unwrap_or(BoardId(0));
        self.arena.rollback(mark.max(ArenaMark::after(keep)));
    }
}

/// Loads sessions, keeping the last failure for hosts that poll for it.
#[derive(Debug, Default)]
pub struct GameLoader {
    config: EngineConfig,
    last_error: Option<LoadError>,
}

impl GameLoader {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            last_error: None,
        }
    }

    pub fn load_text(&mut self, text: &str) -> Option<GameSession> {
        let loaded = GameSession::load_text(text, self.config.clone());
        self.record(loaded)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Option<GameSession> {
        let loaded = GameSession::load_file(path, self.config.clone());
        self.record(loaded)
    }

    /// Error of the most recent load; cleared by a successful one.
    #[must_use]
    pub fn last_error(&self) -> Option<&LoadError> {
        self.last_error.as_ref()
    }

    fn record(&mut self, loaded: Result<GameSession, LoadError>) -> Option<GameSession> {
        match loaded {
            Ok(session) => {
                self.last_error = None;
                Some(session)
            }
            Err(err) => {
                tracing::warn!(error = %err, "load failed");
                self.last_error = Some(err);
                None
            }
        }
    }
}

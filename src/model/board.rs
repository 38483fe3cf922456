//! Board snapshots and the arena that holds them.
//!
//! ## Snapshots
//!
//! A [`BoardModel`] is never mutated after construction. A successor is
//! built by cloning the parent's persistent maps (O(1) with `im`) and
//! applying the chosen move's parts in order.
//!
//! ## Evaluation
//!
//! Legal moves and the game result are computed on first request and
//! cached in a `OnceLock`:
//!
//! 1. Configuration and count goals of every listed player, in declaration
//!    order. The first that holds decides the game.
//! 2. Otherwise the legal moves of the player on turn. A continuation that
//!    yields nothing hands the turn on.
//! 3. Stalemate, checkmate, capture and repetition goals of the player on
//!    turn.
//! 4. Still undecided with no legal moves: a draw.
//!
//! A result earned by a player who is never on turn is credited to the
//! player who made the last move.

use std::sync::{Arc, OnceLock};

use im::OrdMap;

use super::goals::{goal_holds, GoalInput, Phase};
use super::moves::{MoveModel, MovePart};
use super::movegen;
use super::piece::PieceModel;
use crate::core::diag::LEVEL_DETAIL;
use crate::core::{Diagnostics, EngineConfig, PlayerId, Sym};
use crate::defs::{GameDef, GoalKind, TurnDef};
use crate::error::{EngineError, ExecError};
use crate::rules::GameResult;

/// Index of a board in its arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoardId(pub u32);

impl std::fmt::Display for BoardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Pending partial move: the piece at `position` moves again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Continuation {
    pub position: Sym,
    pub move_type: Option<Sym>,
}

#[derive(Debug)]
struct Evaluation {
    turn_index: usize,
    moves: Vec<MoveModel>,
    result: Option<GameResult>,
}

/// One position of one game.
#[derive(Debug)]
pub struct BoardModel {
    played: OrdMap<Sym, PieceModel>,
    store: OrdMap<(PlayerId, Sym), u32>,
    last_move: Option<MoveModel>,
    parent: Option<BoardId>,
    turn_index: usize,
    continuation: Option<Continuation>,
    evaluation: OnceLock<Evaluation>,
}

impl Clone for BoardModel {
    /// Clones the position only; the evaluation cache starts empty.
    fn clone(&self) -> Self {
        Self {
            played: self.played.clone(),
            store: self.store.clone(),
            last_move: self.last_move.clone(),
            parent: self.parent,
            turn_index: self.turn_index,
            continuation: self.continuation,
            evaluation: OnceLock::new(),
        }
    }
}

impl BoardModel {
    /// A board with nothing on it, turn 0.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            played: OrdMap::new(),
            store: OrdMap::new(),
            last_move: None,
            parent: None,
            turn_index: 0,
            continuation: None,
            evaluation: OnceLock::new(),
        }
    }

    /// The initial position of a game.
    pub fn setup(game: &GameDef) -> Result<Self, ExecError> {
        let mut board = Self::empty();
        for setup in &game.setup {
            let def = game.piece(setup.piece).ok_or_else(|| ExecError::UnknownSymbol {
                kind: "piece",
                name: game.name(setup.piece).to_string(),
            })?;
            for position in &setup.positions {
                board
                    .played
                    .insert(*position, PieceModel::new(def, setup.player));
            }
            if setup.off > 0 {
                *board.store.entry((setup.player, setup.piece)).or_insert(0) += setup.off;
            }
        }
        Ok(board)
    }

    #[must_use]
    pub fn played(&self) -> &OrdMap<Sym, PieceModel> {
        &self.played
    }

    #[must_use]
    pub fn piece_at(&self, position: Sym) -> Option<&PieceModel> {
        self.played.get(&position)
    }

    #[must_use]
    pub fn store(&self) -> &OrdMap<(PlayerId, Sym), u32> {
        &self.store
    }

    /// Off-board count of one piece type for one player.
    #[must_use]
    pub fn store_count(&self, player: PlayerId, piece: Sym) -> u32 {
        self.store.get(&(player, piece)).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn last_move(&self) -> Option<&MoveModel> {
        self.last_move.as_ref()
    }

    #[must_use]
    pub fn parent(&self) -> Option<BoardId> {
        self.parent
    }

    /// Turn index the board was created with. The effective turn may be
    /// later when a continuation runs dry; see [`BoardArena::turn`].
    #[must_use]
    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    #[must_use]
    pub fn continuation(&self) -> Option<Continuation> {
        self.continuation
    }

    /// Same pieces and store counts.
    #[must_use]
    pub fn same_content(&self, other: &BoardModel) -> bool {
        self.played == other.played && self.store == other.store
    }

    /// Apply a move's parts to a copy of this board. Turn bookkeeping is
    /// left to the caller.
    pub fn apply(&self, game: &GameDef, mv: &MoveModel) -> Result<BoardModel, ExecError> {
        let mut next = self.clone();
        next.last_move = None;
        next.parent = None;
        next.continuation = None;
        for part in &mv.parts {
            next.apply_part(game, part)?;
        }
        Ok(next)
    }

    fn apply_part(&mut self, game: &GameDef, part: &MovePart) -> Result<(), ExecError> {
        match *part {
            MovePart::Drop {
                to,
                player,
                piece,
                from_store,
            } => {
                if let Some(entry) = from_store {
                    self.take_from_store(game, entry)?;
                }
                let model = match game.piece(piece) {
                    Some(def) => PieceModel::new(def, player),
                    None => PieceModel::bare(piece, player),
                };
                self.played.insert(to, model);
            }
            MovePart::Move {
                from,
                to,
                player,
                piece,
            } => {
                let mut model = self
                    .played
                    .remove(&from)
                    .ok_or_else(|| empty_square(game, "move from", from))?;
                model.owner = player;
                model.piece = piece;
                self.played.insert(to, model);
            }
            MovePart::Copy {
                from,
                to,
                player,
                piece,
            } => {
                let mut model = self
                    .played
                    .get(&from)
                    .cloned()
                    .ok_or_else(|| empty_square(game, "copy from", from))?;
                model.owner = player;
                model.piece = piece;
                self.played.insert(to, model);
            }
            MovePart::Take { at, .. } => {
                let taken = self
                    .played
                    .remove(&at)
                    .ok_or_else(|| empty_square(game, "take at", at))?;
                if game.options.recycle_captures {
                    *self.store.entry((taken.owner, taken.piece)).or_insert(0) += 1;
                }
            }
            MovePart::ChangeOwner { at, player, .. } => {
                self.modify(game, at, |model| model.owner = player)?;
            }
            MovePart::ChangePiece { at, piece, .. } => {
                self.modify(game, at, |model| model.piece = piece)?;
            }
            MovePart::SetAttribute {
                at,
                attribute,
                value,
            } => {
                self.modify(game, at, |model| {
                    model.attributes.insert(attribute, value);
                })?;
            }
        }
        Ok(())
    }

    fn modify(
        &mut self,
        game: &GameDef,
        at: Sym,
        change: impl FnOnce(&mut PieceModel),
    ) -> Result<(), ExecError> {
        let model = self
            .played
            .get_mut(&at)
            .ok_or_else(|| empty_square(game, "change at", at))?;
        change(model);
        Ok(())
    }

    fn take_from_store(&mut self, game: &GameDef, entry: (PlayerId, Sym)) -> Result<(), ExecError> {
        match self.store.get(&entry).copied() {
            Some(n) if n > 1 => {
                self.store.insert(entry, n - 1);
            }
            Some(1) => {
                self.store.remove(&entry);
            }
            _ => {
                return Err(ExecError::Inconsistent(format!(
                    "no {} left in store of player {}",
                    game.name(entry.1),
                    entry.0
                )))
            }
        }
        Ok(())
    }
}

fn empty_square(game: &GameDef, what: &str, at: Sym) -> ExecError {
    ExecError::Inconsistent(format!("{what} empty position {}", game.name(at)))
}

/// Arena length at a point in time; see [`BoardArena::checkpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArenaMark(usize);

impl ArenaMark {
    /// Mark just past `id`.
    #[must_use]
    pub fn after(id: BoardId) -> Self {
        Self(id.0 as usize + 1)
    }
}

/// Store of the boards of one game.
///
/// Boards are appended and only ever refer to earlier boards, so releasing
/// a tail never leaves a stored board with a dangling parent. Ids of
/// released boards are invalid and get reused by later pushes.
#[derive(Debug)]
pub struct BoardArena {
    game: Arc<GameDef>,
    diag: Diagnostics,
    repetition_count: u32,
    boards: Vec<BoardModel>,
}

impl BoardArena {
    #[must_use]
    pub fn new(game: Arc<GameDef>, config: &EngineConfig, diag: Diagnostics) -> Self {
        Self {
            game,
            diag,
            repetition_count: config.repetition_count,
            boards: Vec::new(),
        }
    }

    #[must_use]
    pub fn game(&self) -> &Arc<GameDef> {
        &self.game
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Build and store the initial position.
    pub fn create_setup(&mut self) -> Result<BoardId, ExecError> {
        let board = BoardModel::setup(&self.game)?;
        Ok(self.push(board))
    }

    pub fn push(&mut self, board: BoardModel) -> BoardId {
        let id = BoardId(self.boards.len() as u32);
        self.boards.push(board);
        id
    }

    /// Mark the boards stored so far.
    #[must_use]
    pub fn checkpoint(&self) -> ArenaMark {
        ArenaMark(self.boards.len())
    }

    /// Release every board stored after `mark`.
    pub fn rollback(&mut self, mark: ArenaMark) {
        self.boards.truncate(mark.0);
    }

    /// Release every board stored after `id`.
    pub fn truncate_after(&mut self, id: BoardId) {
        self.boards.truncate(id.0 as usize + 1);
    }

    pub fn board(&self, id: BoardId) -> Result<&BoardModel, ExecError> {
        self.boards
            .get(id.0 as usize)
            .ok_or_else(|| ExecError::Inconsistent(format!("unknown board {id}")))
    }

    /// The board and its ancestors, nearest first.
    pub fn history(&self, id: BoardId) -> impl Iterator<Item = &BoardModel> + '_ {
        std::iter::successors(self.boards.get(id.0 as usize), move |board| {
            board.parent.and_then(|p| self.boards.get(p.0 as usize))
        })
    }

    pub fn legal_moves(&self, id: BoardId) -> Result<&[MoveModel], ExecError> {
        Ok(&self.evaluation(id)?.moves)
    }

    pub fn result(&self, id: BoardId) -> Result<Option<GameResult>, ExecError> {
        Ok(self.evaluation(id)?.result.clone())
    }

    /// Effective turn of a board.
    pub fn turn(&self, id: BoardId) -> Result<TurnDef, ExecError> {
        let index = self.evaluation(id)?.turn_index;
        self.turn_at(index)
    }

    fn turn_at(&self, index: usize) -> Result<TurnDef, ExecError> {
        self.game
            .turn_order
            .turn(index)
            .copied()
            .ok_or_else(|| ExecError::Inconsistent("empty turn order".to_string()))
    }

    /// Successor of `parent` after legal move `index`, not yet stored.
    pub fn successor(&self, parent: BoardId, index: usize) -> Result<BoardModel, EngineError> {
        let evaluation = self.evaluation(parent)?;
        let mv = evaluation.moves.get(index).ok_or(EngineError::InvalidMove {
            index,
            count: evaluation.moves.len(),
        })?;
        let mut next = self.board(parent)?.apply(&self.game, mv)?;
        next.parent = Some(parent);
        next.last_move = Some(mv.clone());
        let again = mv
            .partial
            .then(|| mv.destination().map(|(to, _)| to).or(mv.position))
            .flatten();
        match again {
            Some(position) => {
                next.turn_index = evaluation.turn_index;
                next.continuation = Some(Continuation {
                    position,
                    move_type: mv.partial_type,
                });
            }
            None => next.turn_index = evaluation.turn_index + 1,
        }
        Ok(next)
    }

    /// Play legal move `index` on `parent` and store the result.
    pub fn make_move(&mut self, parent: BoardId, index: usize) -> Result<BoardId, EngineError> {
        let next = self.successor(parent, index)?;
        let id = self.push(next);
        if self.diag.enabled(LEVEL_DETAIL) {
            tracing::debug!(%parent, board = %id, index, "move made");
        }
        Ok(id)
    }

    fn evaluation(&self, id: BoardId) -> Result<&Evaluation, ExecError> {
        let board = self.board(id)?;
        if let Some(evaluation) = board.evaluation.get() {
            return Ok(evaluation);
        }
        let evaluation = self.evaluate(id, board)?;
        Ok(board.evaluation.get_or_init(|| evaluation))
    }

    fn evaluate(&self, id: BoardId, board: &BoardModel) -> Result<Evaluation, ExecError> {
        let game = &*self.game;
        let fresh_setup = board.parent.is_none() && board.played.is_empty();

        if !fresh_setup {
            if let Some(result) = self.pre_goals(id, board)? {
                return Ok(self.decided(id, board.turn_index, result));
            }
        }

        let mut turn_index = board.turn_index;
        let mut moves = movegen::legal_moves(
            game,
            board,
            &self.turn_at(turn_index)?,
            board.continuation.as_ref(),
            self.diag,
        )?;
        if board.continuation.is_some() && moves.is_empty() {
            turn_index += 1;
            moves = movegen::legal_moves(game, board, &self.turn_at(turn_index)?, None, self.diag)?;
        }

        if fresh_setup {
            return Ok(Evaluation {
                turn_index,
                moves,
                result: None,
            });
        }

        let turn = self.turn_at(turn_index)?;
        let input = GoalInput {
            arena: self,
            id,
            board,
            moves: &moves,
            repetition_count: self.repetition_count,
        };
        for goal in &game.goals {
            if goal.players.contains(&turn.player)
                && goal_holds(&input, goal, turn.player, Phase::Post, self.diag)?
            {
                let result = self.credit(board, goal.kind, turn.player);
                return Ok(self.decided(id, turn_index, result));
            }
        }

        let result = moves.is_empty().then_some(GameResult::Draw);
        if let Some(result) = &result {
            if self.diag.enabled(LEVEL_DETAIL) {
                tracing::debug!(board = %id, ?result, "no legal moves");
            }
        }
        Ok(Evaluation {
            turn_index,
            moves,
            result,
        })
    }

    fn pre_goals(&self, id: BoardId, board: &BoardModel) -> Result<Option<GameResult>, ExecError> {
        let input = GoalInput {
            arena: self,
            id,
            board,
            moves: &[],
            repetition_count: self.repetition_count,
        };
        for goal in &self.game.goals {
            for &player in &goal.players {
                if goal_holds(&input, goal, player, Phase::Pre, self.diag)? {
                    return Ok(Some(self.credit(board, goal.kind, player)));
                }
            }
        }
        Ok(None)
    }

    fn decided(&self, id: BoardId, turn_index: usize, result: GameResult) -> Evaluation {
        if self.diag.enabled(LEVEL_DETAIL) {
            tracing::debug!(board = %id, ?result, "game decided");
        }
        Evaluation {
            turn_index,
            moves: Vec::new(),
            result: Some(result),
        }
    }

    fn credit(&self, board: &BoardModel, kind: GoalKind, player: PlayerId) -> GameResult {
        let credited = if self.game.is_neutral(player) {
            board.last_move.as_ref().map_or(player, |mv| mv.player)
        } else {
            player
        };
        match kind {
            GoalKind::Win => GameResult::Win(credited),
            GoalKind::Loss => GameResult::Loss(credited),
            GoalKind::Draw => GameResult::Draw,
        }
    }

    /// Player on turn when `board` was created, ignoring continuations that
    /// ran dry. Used to compare positions for repetition.
    pub(crate) fn nominal_player(&self, board: &BoardModel) -> Option<PlayerId> {
        self.game.turn_order.turn(board.turn_index).map(|t| t.player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::load_program;
    use crate::defs::build_menu;
    use crate::lang::MemoryLoader;

    fn arena(text: &str) -> BoardArena {
        let loader = MemoryLoader::new().with_file("t.zrf", text);
        let mut diag = Diagnostics::quiet();
        let config = EngineConfig::default();
        let program = load_program(&loader, "t.zrf", &config, &mut diag).unwrap();
        let menu = build_menu(Arc::new(program), diag).unwrap();
        let game = Arc::clone(&menu.entries()[0].game);
        BoardArena::new(game, &config, diag)
    }

    const SLIDER: &str = r#"
        (game
          (players White Black)
          (board
            (grid (start-rectangle 0 0 10 10)
                  (dimensions ("a/b/c/d" (10 0)) ("1" (0 10)))
                  (directions (e 1 0) (w -1 0))))
          (board-setup (White (Man a1)) (Black (Man d1)))
          (piece (name Man)
            (moves (e add) (w add))))
    "#;

    #[test]
    fn test_setup_and_moves() {
        let mut arena = arena(SLIDER);
        let root = arena.create_setup().unwrap();
        let moves = arena.legal_moves(root).unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(arena.turn(root).unwrap().player, PlayerId::new(0));

        let next = arena.make_move(root, 0).unwrap();
        let b1 = arena.game().program.interner().get("b1").unwrap();
        assert!(arena.board(next).unwrap().piece_at(b1).is_some());
        assert_eq!(arena.board(next).unwrap().parent(), Some(root));
        assert_eq!(arena.turn(next).unwrap().player, PlayerId::new(1));
        assert_eq!(
            arena.board(next).unwrap().last_move(),
            arena.legal_moves(root).unwrap().first()
        );
    }

    #[test]
    fn test_invalid_move_index() {
        let mut arena = arena(SLIDER);
        let root = arena.create_setup().unwrap();
        let err = arena.make_move(root, 9).unwrap_err();
        assert!(matches!(err, EngineError::InvalidMove { index: 9, count: 1 }));
    }

    #[test]
    fn test_moving_onto_enemy_takes() {
        let mut arena = arena(SLIDER);
        let mut board = arena.create_setup().unwrap();
        // a1 -> b1, d1 -> c1; White then faces Black on c1.
        board = arena.make_move(board, 0).unwrap();
        board = arena.make_move(board, 0).unwrap();
        let moves = arena.legal_moves(board).unwrap();
        let capture = moves
            .iter()
            .position(|m| m.parts.iter().any(|p| matches!(p, MovePart::Take { .. })))
            .unwrap();
        board = arena.make_move(board, capture).unwrap();
        let played = arena.board(board).unwrap().played();
        assert_eq!(played.len(), 1);
        assert!(played.values().all(|p| p.owner == PlayerId::new(0)));
        assert_eq!(arena.board(board).unwrap().store_count(PlayerId::new(1), man(&arena)), 0);
    }

    fn man(arena: &BoardArena) -> Sym {
        arena.game().pieces[0].name
    }

    #[test]
    fn test_recycled_capture_returns_to_store() {
        let text = SLIDER.replace(
            "(players White Black)",
            "(players White Black) (option \"recycle captures\" true)",
        );
        let mut arena = arena(&text);
        let mut board = arena.create_setup().unwrap();
        board = arena.make_move(board, 0).unwrap();
        board = arena.make_move(board, 0).unwrap();
        let capture = arena
            .legal_moves(board)
            .unwrap()
            .iter()
            .position(|m| m.parts.iter().any(|p| matches!(p, MovePart::Take { .. })))
            .unwrap();
        board = arena.make_move(board, capture).unwrap();
        assert_eq!(arena.board(board).unwrap().store_count(PlayerId::new(1), man(&arena)), 1);
    }

    #[test]
    fn test_history_walks_to_root() {
        let mut arena = arena(SLIDER);
        let root = arena.create_setup().unwrap();
        let next = arena.make_move(root, 0).unwrap();
        assert_eq!(arena.history(next).count(), 2);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_rollback_releases_later_boards() {
        let mut arena = arena(SLIDER);
        let root = arena.create_setup().unwrap();
        let mark = arena.checkpoint();
        let next = arena.make_move(root, 0).unwrap();
        arena.make_move(next, 0).unwrap();
        assert_eq!(arena.len(), 3);

        arena.rollback(mark);
        assert_eq!(arena.len(), 1);
        assert!(arena.board(next).is_err());
        assert_eq!(arena.make_move(root, 0).unwrap(), next);

        arena.truncate_after(root);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.legal_moves(root).unwrap().len(), 1);
    }

    #[test]
    fn test_apply_rejects_move_from_empty_square() {
        let arena = arena(SLIDER);
        let game = arena.game();
        let b1 = game.program.interner().get("b1").unwrap();
        let c1 = game.program.interner().get("c1").unwrap();
        let man = game.pieces[0].name;
        let mut mv = MoveModel::pass(PlayerId::new(0));
        mv.parts.push(MovePart::Move {
            from: b1,
            to: c1,
            player: PlayerId::new(0),
            piece: man,
        });
        let board = BoardModel::setup(game).unwrap();
        assert!(matches!(board.apply(game, &mv), Err(ExecError::Inconsistent(_))));
    }
}

//! Game results and the contract offered to search collaborators.
//!
//! The engine never chooses moves. A collaborator (a search, a random
//! player, a network client) drives play through `SearchHost`:
//! - Read the legal moves of a board
//! - Create the successor of a board after move `i`
//! - Read the result of a board
//! - Draw random indices from the session RNG
//! - Release the boards of a finished exploration
//!
//! Collaborators hold `BoardId`s only; boards stay in the host's arena.

use crate::core::player::PlayerId;
use crate::error::EngineError;
use crate::model::{ArenaMark, BoardId, MoveModel};

/// Result of a completed game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameResult {
    /// The player won.
    Win(PlayerId),
    /// The player lost; everyone else shares the win.
    Loss(PlayerId),
    /// Nobody won.
    Draw,
}

impl GameResult {
    /// Check if a player won.
    #[must_use]
    pub fn is_winner(&self, player: PlayerId) -> bool {
        match self {
            GameResult::Win(p) => *p == player,
            GameResult::Loss(p) => *p != player,
            GameResult::Draw => false,
        }
    }

    /// The player the result names, if any.
    #[must_use]
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            GameResult::Win(p) | GameResult::Loss(p) => Some(*p),
            GameResult::Draw => None,
        }
    }
}

/// What a search collaborator may ask of a loaded game.
///
/// ## Implementation Notes
///
/// - `legal_moves` must return the same list on every call for a board
/// - `successor` must not change the boards it was given
/// - `result` is `None` while the game continues
pub trait SearchHost {
    /// Board the host currently shows.
    fn current(&self) -> BoardId;

    /// Legal moves of `board`, in stable order.
    fn legal_moves(&self, board: BoardId) -> Result<&[MoveModel], EngineError>;

    /// Successor of `board` after legal move `index`.
    fn successor(&mut self, board: BoardId, index: usize) -> Result<BoardId, EngineError>;

    /// Result of `board`.
    fn result(&self, board: BoardId) -> Result<Option<GameResult>, EngineError>;

    /// Uniform index in `0..len` from the session RNG; 0 when `len` is 0.
    fn random_index(&mut self, len: usize) -> usize;

    /// Mark the boards created so far.
    fn checkpoint(&self) -> ArenaMark;

    /// Release the boards created since `mark`. Their ids become invalid.
    fn rollback(&mut self, mark: ArenaMark);

    // === Convenience Methods ===

    fn legal_move_count(&self, board: BoardId) -> Result<usize, EngineError> {
        Ok(self.legal_moves(board)?.len())
    }

    /// Play random moves from `board` until the game ends or `max_plies`
    /// moves were made. Returns the last board reached and its result.
    fn playout(
        &mut self,
        board: BoardId,
        max_plies: usize,
    ) -> Result<(BoardId, Option<GameResult>), EngineError> {
        let mut board = board;
        for _ in 0..max_plies {
            if let Some(result) = self.result(board)? {
                return Ok((board, Some(result)));
            }
            let count = self.legal_move_count(board)?;
            if count == 0 {
                break;
            }
            let index = self.random_index(count);
            board = self.successor(board, index)?;
        }
        let result = self.result(board)?;
        Ok((board, result))
    }

    /// Result of a random playout from `board`, releasing its boards.
    fn simulate(
        &mut self,
        board: BoardId,
        max_plies: usize,
    ) -> Result<Option<GameResult>, EngineError> {
        let mark = self.checkpoint();
        let outcome = self.playout(board, max_plies);
        self.rollback(mark);
        Ok(outcome?.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_result_is_winner() {
        let result = GameResult::Win(PlayerId::new(1));
        assert!(!result.is_winner(PlayerId::new(0)));
        assert!(result.is_winner(PlayerId::new(1)));

        let draw = GameResult::Draw;
        assert!(!draw.is_winner(PlayerId::new(0)));
        assert_eq!(draw.player(), None);

        let loss = GameResult::Loss(PlayerId::new(0));
        assert!(!loss.is_winner(PlayerId::new(0)));
        assert!(loss.is_winner(PlayerId::new(1)));
        assert!(loss.is_winner(PlayerId::new(2)));
        assert_eq!(loss.player(), Some(PlayerId::new(0)));
    }
}

//! End-to-end play: load a program, make moves, read results.

use rust_abg::core::{EngineConfig, PlayerId};
use rust_abg::rules::GameResult;
use rust_abg::session::GameSession;
use rust_abg::EngineError;

const TIC_TAC_TOE: &str = r#"
(game
  (title "Tic-Tac-Toe")
  (players X O)
  (turn-order X O)
  (board
    (grid
      (start-rectangle 0 0 50 50)
      (dimensions ("A-/B-/C-" (50 0)) ("1/2/3" (0 50)))
      (directions (e 1 0) (n 0 1) (ne 1 1) (nw -1 1))))
  (board-setup (X (man off 5)) (O (man off 5)))
  (piece
    (name man)
    (help "Drop a man on any empty square")
    (drops ((verify empty?) add)))
  (win-condition (X O)
    (or (relative-config man e man e man)
        (relative-config man n man n man)
        (relative-config man ne man ne man)
        (relative-config man nw man nw man))))
"#;

fn load(text: &str) -> GameSession {
    GameSession::load_text(text, EngineConfig::default()).unwrap()
}

/// Index of the legal move that ends on `square`.
fn move_to(session: &GameSession, square: &str) -> usize {
    session
        .legal_moves()
        .unwrap()
        .iter()
        .position(|mv| {
            mv.destination()
                .is_some_and(|(to, _)| session.name(to) == square)
        })
        .unwrap_or_else(|| panic!("no move to {square}"))
}

fn play(session: &mut GameSession, squares: &[&str]) {
    for square in squares {
        let index = move_to(session, square);
        session.make_move(index).unwrap();
    }
}

#[test]
fn test_tic_tac_toe_opening() {
    let session = load(TIC_TAC_TOE);
    assert_eq!(session.titles(), vec!["Tic-Tac-Toe"]);
    assert_eq!(session.turn_player().unwrap(), PlayerId::new(0));
    assert_eq!(session.legal_moves().unwrap().len(), 9);
    assert_eq!(session.result().unwrap(), None);

    let x = session.game().players[0];
    let man = session.game().pieces[0].name;
    assert_eq!(session.store().unwrap().get(&(PlayerId::new(0), man)), Some(&5));
    assert_eq!(session.name(x), "X");
}

#[test]
fn test_tic_tac_toe_row_wins() {
    let mut session = load(TIC_TAC_TOE);
    play(&mut session, &["A-1", "A-2", "B-1", "B-2"]);
    assert_eq!(session.result().unwrap(), None);

    play(&mut session, &["C-1"]);
    assert_eq!(session.result().unwrap(), Some(GameResult::Win(PlayerId::new(0))));
    assert!(session.legal_moves().unwrap().is_empty());
    assert!(matches!(
        session.make_move(0),
        Err(EngineError::InvalidMove { index: 0, count: 0 })
    ));
}

#[test]
fn test_tic_tac_toe_diagonal_wins() {
    let mut session = load(TIC_TAC_TOE);
    play(&mut session, &["A-1", "A-2", "B-2", "A-3", "C-3"]);
    assert_eq!(session.result().unwrap(), Some(GameResult::Win(PlayerId::new(0))));
}

#[test]
fn test_tic_tac_toe_full_board_draws() {
    let mut session = load(TIC_TAC_TOE);
    play(
        &mut session,
        &["A-1", "B-1", "C-1", "B-2", "A-2", "A-3", "C-2", "C-3", "B-3"],
    );
    assert_eq!(session.pieces().unwrap().len(), 9);
    assert_eq!(session.result().unwrap(), Some(GameResult::Draw));
}

#[test]
fn test_drops_draw_from_store() {
    let mut session = load(TIC_TAC_TOE);
    let man = session.game().pieces[0].name;
    play(&mut session, &["A-1"]);
    let store = session.store().unwrap();
    assert_eq!(store.get(&(PlayerId::new(0), man)), Some(&4));
    assert_eq!(store.get(&(PlayerId::new(1), man)), Some(&5));
    assert_eq!(session.turn_player().unwrap(), PlayerId::new(1));
    assert_eq!(session.legal_moves().unwrap().len(), 8);
}

fn blocked_game(option: &str) -> String {
    format!(
        r#"(game
             (title "Blocked")
             (players A B)
             {option}
             (board (grid (start-rectangle 0 0 10 10)
                          (dimensions ("a/b/c" (10 0)) ("1" (0 10)))
                          (directions (e 1 0))))
             (board-setup (A (Man a1)) (B (Man c1)))
             (piece (name Man) (moves (e (verify empty?) add))))"#
    )
}

#[test]
fn test_forced_pass_when_stuck() {
    let mut session = load(&blocked_game(r#"(option "pass turn" forced)"#));
    // A's only move; B on c1 cannot move east.
    assert_eq!(session.legal_moves().unwrap().len(), 1);
    session.make_move(0).unwrap();

    let moves = session.legal_moves().unwrap();
    assert_eq!(moves.len(), 1);
    assert!(moves[0].is_pass());
    assert_eq!(moves[0].player, PlayerId::new(1));
    assert_eq!(session.result().unwrap(), None);

    session.make_move(0).unwrap();
    assert_eq!(session.turn_player().unwrap(), PlayerId::new(0));
}

#[test]
fn test_no_moves_without_pass_is_draw() {
    let mut session = load(&blocked_game(""));
    session.make_move(0).unwrap();
    assert!(session.legal_moves().unwrap().is_empty());
    assert_eq!(session.result().unwrap(), Some(GameResult::Draw));
}

#[test]
fn test_pass_always_offered() {
    let session = load(&blocked_game(r#"(option "pass turn" true)"#));
    let moves = session.legal_moves().unwrap();
    assert_eq!(moves.len(), 2);
    assert!(moves[1].is_pass());
}

#[test]
fn test_turn_order_cycles_with_repeat() {
    let text = r#"
        (game
          (title "Cycle")
          (players A B C)
          (turn-order A repeat B C)
          (board (grid (start-rectangle 0 0 10 10)
                       (dimensions ("a/b/c/d/e/f/g/h" (10 0)) ("1" (0 10)))
                       (directions (e 1 0))))
          (board-setup (A (Man off 9)) (B (Man off 9)) (C (Man off 9)))
          (piece (name Man) (drops ((verify empty?) add))))
    "#;
    let mut session = load(text);
    let mut players = Vec::new();
    for _ in 0..6 {
        players.push(session.turn_player().unwrap().index());
        session.make_move(0).unwrap();
    }
    assert_eq!(players, vec![0, 1, 2, 1, 2, 1]);
}

fn neutral_goal_game(setup: &str) -> String {
    format!(
        r#"(game
             (title "Neutral")
             (players A B Nature)
             (turn-order A B)
             (board (grid (start-rectangle 0 0 10 10)
                          (dimensions ("a/b/c/d" (10 0)) ("1" (0 10)))
                          (directions (e 1 0))))
             (board-setup {setup} (B (Man d1)))
             (piece (name Man) (moves (e (verify empty?) add)))
             (win-condition (Nature) (absolute-config (any-owner Man) (b1))))"#
    )
}

#[test]
fn test_neutral_win_goes_to_last_mover() {
    let mut session = load(&neutral_goal_game("(A (Man a1))"));
    assert!(session.game().is_neutral(PlayerId::new(2)));
    assert_eq!(session.result().unwrap(), None);

    play(&mut session, &["b1"]);
    assert_eq!(session.result().unwrap(), Some(GameResult::Win(PlayerId::new(0))));
}

#[test]
fn test_neutral_win_on_setup_stays_neutral() {
    let session = load(&neutral_goal_game("(A (Man b1))"));
    assert_eq!(session.board().unwrap().last_move(), None);
    assert_eq!(session.result().unwrap(), Some(GameResult::Win(PlayerId::new(2))));
}

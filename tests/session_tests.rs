//! Host surface: loading, variants, undo and the stability of answers.

use std::fs;

use rust_abg::core::{EngineConfig, PlayerId};
use rust_abg::error::LoadError;
use rust_abg::rules::SearchHost;
use rust_abg::session::{GameLoader, GameSession};

const PLACED: &str = r#"
(define man-piece
  (piece (name man) (drops ((verify empty?) add))))

(define line-board
  (board (grid (start-rectangle 0 0 10 10)
               (dimensions ("a/b/c" (10 0)) ("1/2" (0 10)))
               (directions (e 1 0) (n 0 1)))))

(game
  (title "Placed")
  (players X O)
  (line-board)
  (board-setup (X (man a1 off 1)) (O (man off 1)))
  (man-piece))

(variant
  (title "Dropped")
  (board-setup (X (man off 2)) (O (man off 1))))
"#;

fn load() -> GameSession {
    GameSession::load_text(PLACED, EngineConfig::default()).unwrap()
}

#[test]
fn test_variant_menu() {
    let mut session = load();
    assert_eq!(session.titles(), vec!["Placed", "Dropped"]);
    assert_eq!(session.thumbnails(), vec![None, None]);
    assert_eq!(session.selected_variant(), 0);
    assert_eq!(session.pieces().unwrap().len(), 1);

    session.select_variant(1).unwrap();
    assert_eq!(session.selected_variant(), 1);
    assert!(session.pieces().unwrap().is_empty());
    // The variant keeps the base game's board and pieces.
    assert_eq!(session.game().board.positions().len(), 6);
    assert_eq!(session.game().pieces.len(), 1);
}

#[test]
fn test_setup_and_equivalent_drop_compare_equal() {
    let mut session = load();
    let placed = session.board().unwrap().clone();

    session.select_variant(1).unwrap();
    let a1 = session
        .legal_moves()
        .unwrap()
        .iter()
        .position(|mv| mv.destination().is_some_and(|(to, _)| session.name(to) == "a1"))
        .unwrap();
    session.make_move(a1).unwrap();
    let dropped = session.board().unwrap();

    assert!(dropped.same_content(&placed));
    assert_eq!(dropped.played(), placed.played());
}

#[test]
fn test_legal_moves_are_stable() {
    let mut session = load();
    let first = session.legal_moves().unwrap().to_vec();
    let second = session.legal_moves().unwrap().to_vec();
    assert_eq!(first, second);

    session.make_move(0).unwrap();
    assert!(session.undo());
    assert_eq!(session.legal_moves().unwrap(), first.as_slice());
}

#[test]
fn test_make_move_records_the_move_and_undo_returns() {
    let mut session = load();
    let root = session.current();
    let moves = session.legal_moves().unwrap().to_vec();

    for (index, expected) in moves.iter().enumerate() {
        let next = session.make_move(index).unwrap();
        let board = session.board().unwrap();
        assert_eq!(board.last_move(), Some(expected));
        assert_eq!(board.parent(), Some(root));
        assert_eq!(session.turn_player().unwrap(), PlayerId::new(1));

        assert!(session.undo());
        assert_eq!(session.current(), root);
        assert!(session.redo());
        assert_eq!(session.current(), next);
        assert!(session.undo());
    }
}

#[test]
fn test_search_host_successors_are_independent() {
    let mut session = load();
    let root = session.current();
    let count = session.legal_move_count(root).unwrap();
    assert_eq!(count, 5);

    let a = session.successor(root, 0).unwrap();
    let b = session.successor(root, 0).unwrap();
    assert_ne!(a, b);
    assert_eq!(
        SearchHost::legal_moves(&session, a).unwrap(),
        SearchHost::legal_moves(&session, b).unwrap()
    );
    assert_eq!(session.current(), root);
}

#[test]
fn test_macro_forms_expand() {
    let text = r#"
        (define macx $1)
        (game
          (title (macx "Macro"))
          (players X O)
          (board (positions (a1 0 0 10 10) (b1 10 0 20 10)))
          (board-setup (X (man off 1)))
          (piece (name man) (drops ((verify empty?) add))))
    "#;
    let session = GameSession::load_text(text, EngineConfig::default()).unwrap();
    assert_eq!(session.titles(), vec!["Macro"]);
    assert_eq!(session.legal_moves().unwrap().len(), 2);
}

#[test]
fn test_lexical_errors_are_all_reported() {
    let text = "(game (title \"x\") {ZZ} (players A B) 0xQQ)";
    let err = GameSession::load_text(text, EngineConfig::default()).unwrap_err();
    match err {
        LoadError::Lexical { errors } => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_loader_records_failure() {
    let mut loader = GameLoader::new(EngineConfig::default());
    assert!(loader.load_text("(game").is_none());
    assert!(matches!(loader.last_error(), Some(LoadError::Syntax { .. })));

    assert!(loader.load_text(PLACED).is_some());
    assert!(loader.last_error().is_none());
}

#[test]
fn test_load_file_with_include() {
    let dir = std::env::temp_dir().join(format!("rust-abg-include-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("pieces.zrf"),
        "(define man-piece (piece (name man) (drops ((verify empty?) add))))\n",
    )
    .unwrap();
    fs::write(
        dir.join("main.zrf"),
        r#"#include "pieces.zrf"
           (game (title "Included") (players X O)
             (board (positions (a1 0 0 10 10)))
             (board-setup (X (man off 1)))
             (man-piece))"#,
    )
    .unwrap();

    let session = GameSession::load_file(dir.join("main.zrf"), EngineConfig::default()).unwrap();
    assert_eq!(session.titles(), vec!["Included"]);
    assert_eq!(session.legal_moves().unwrap().len(), 1);

    let missing = GameSession::load_file(dir.join("absent.zrf"), EngineConfig::default());
    assert!(matches!(missing, Err(LoadError::Include { .. })));
    fs::remove_dir_all(&dir).unwrap();
}

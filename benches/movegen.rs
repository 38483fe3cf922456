//! Benchmarks for compilation and move generation.
//!
//! Run with: `cargo bench --bench movegen`

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use rust_abg::compile::load_program;
use rust_abg::core::{Diagnostics, EngineConfig};
use rust_abg::defs::build_menu;
use rust_abg::lang::MemoryLoader;
use rust_abg::model::{legal_moves, BoardArena, BoardModel};

const SLIDERS: &str = r#"
(define slide ($1 (while empty? add $1) (verify enemy?) add))

(game
  (title "Sliders")
  (players White Black)
  (board
    (grid
      (start-rectangle 0 0 50 50)
      (dimensions ("a/b/c/d/e/f/g/h" (50 0)) ("8/7/6/5/4/3/2/1" (0 50)))
      (directions (n 0 -1) (e 1 0) (s 0 1) (w -1 0)
                  (ne 1 -1) (nw -1 -1) (se 1 1) (sw -1 1))))
  (board-setup
    (White (Rook a1 h1) (Bishop c1 f1) (Queen d1))
    (Black (Rook a8 h8) (Bishop c8 f8) (Queen d8)))
  (piece (name Rook) (moves (slide n) (slide e) (slide s) (slide w)))
  (piece (name Bishop) (moves (slide ne) (slide nw) (slide se) (slide sw)))
  (piece (name Queen)
    (moves (slide n) (slide e) (slide s) (slide w)
           (slide ne) (slide nw) (slide se) (slide sw))))
"#;

fn loader() -> MemoryLoader {
    MemoryLoader::new().with_file("sliders.zrf", SLIDERS)
}

fn benchmark_compile(c: &mut Criterion) {
    let loader = loader();
    let config = EngineConfig::default();
    c.bench_function("compile_sliders", |b| {
        b.iter(|| {
            let mut diag = Diagnostics::quiet();
            black_box(load_program(&loader, "sliders.zrf", &config, &mut diag).unwrap())
        });
    });
}

fn benchmark_movegen(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut diag = Diagnostics::quiet();
    let program = load_program(&loader(), "sliders.zrf", &config, &mut diag).unwrap();
    let menu = build_menu(Arc::new(program), diag).unwrap();
    let game = Arc::clone(&menu.entries()[0].game);
    let board = BoardModel::setup(&game).unwrap();
    let turn = *game.turn_order.turn(0).unwrap();

    let mut group = c.benchmark_group("Move generation");
    group.bench_function("setup_white", |b| {
        b.iter(|| black_box(legal_moves(&game, black_box(&board), &turn, None, diag).unwrap()));
    });
    group.bench_function("arena_playout_20", |b| {
        b.iter(|| {
            let mut arena = BoardArena::new(Arc::clone(&game), &config, diag);
            let mut id = arena.create_setup().unwrap();
            for ply in 0..20 {
                let count = arena.legal_moves(id).unwrap().len();
                if count == 0 {
                    break;
                }
                id = arena.make_move(id, ply % count).unwrap();
            }
            black_box(id)
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_compile, benchmark_movegen);
criterion_main!(benches);

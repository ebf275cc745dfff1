use criterion::{black_box, criterion_group, criterion_main, Criterion};

use connect4::{Board, COLS, ROWS};

const DRAWN_GAME: [u8; COLS * ROWS] = [
    5, 4, 5, 0, 6, 2, 4, 5, 5, 0, 4, 1, 1, 0, 4, 5, 6, 5, 3, 1, 1, 2, 2, 6, 2, 6, 6, 3, 6, 2, 0,
    3, 0, 3, 3, 4, 3, 1, 4, 2, 1, 0,
];

fn full_game(c: &mut Criterion) {
    c.bench_function("full_drawn_game", |b| {
        b.iter(|| Board::from_history(black_box(&DRAWN_GAME)).unwrap())
    });
}

fn last_move(c: &mut Criterion) {
    let board = Board::from_history(&DRAWN_GAME[..DRAWN_GAME.len() - 1]).unwrap();
    let column = DRAWN_GAME[DRAWN_GAME.len() - 1] as usize;

    c.bench_function("last_move", |b| {
        b.iter_batched_ref(
            || board.clone(),
            |board| board.make_move(black_box(column)).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, full_game, last_move);
criterion_main!(benches);

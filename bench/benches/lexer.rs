use criterion::{criterion_group, criterion_main, Criterion};
use jack::lexer;
use std::hint::black_box;

static INPUT: &str = include_str!("../../fixtures/Square/SquareGame.jack");

fn lex_all(input: &str) {
    let mut tokens = lexer::lex(input).expect("fixture should lex");
    let mut i = 0;
    while tokens.next().is_ok() {
        i += 1;
    }
    black_box(i);
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lex", |b| b.iter(|| lex_all(black_box(INPUT))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

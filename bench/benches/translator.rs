use criterion::{criterion_group, criterion_main, Criterion};
use jack::Compiler;
use std::hint::black_box;

static PROGRAM: &[(&str, &str)] = &[
    ("Main.jack", include_str!("../../fixtures/Square/Main.jack")),
    ("Square.jack", include_str!("../../fixtures/Square/Square.jack")),
    ("SquareGame.jack", include_str!("../../fixtures/Square/SquareGame.jack")),
];

fn translate_program(program: &[(&str, &str)]) {
    let mut compiler = Compiler::new();
    let mut lines = 0;
    for (unit, src) in program {
        let compiled = compiler.compile(unit, src).expect("fixture should translate");
        lines += compiled.code().len();
    }
    black_box(lines);
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("translate", |b| {
        b.iter(|| translate_program(black_box(PROGRAM)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

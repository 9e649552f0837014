use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jsbox::{parse, EvalOpts};

fn run_arithmetic_loop(c: &mut Criterion) {
    let script = parse(
        "let sum = 0; for (let i = 0; i < 1000; i = i + 1) { sum = sum + i * 2 - 1; } sum;",
        "bench.js",
    )
    .unwrap();
    let opts = EvalOpts::default();

    c.bench_function("arithmetic_loop_1000", |b| {
        b.iter(|| {
            let result = script.eval(&opts).unwrap();
            black_box(result);
        });
    });
}

fn run_array_pipeline(c: &mut Criterion) {
    let script = parse(
        "let xs = []; for (let i = 0; i < 200; i = i + 1) { xs.push(i); } \
         xs.map(x => x * 2).filter(x => x % 3 == 0).reduce((a, b) => a + b, 0);",
        "bench.js",
    )
    .unwrap();
    let opts = EvalOpts::default();

    c.bench_function("array_map_filter_reduce_200", |b| {
        b.iter(|| {
            let result = script.eval(&opts).unwrap();
            black_box(result);
        });
    });
}

fn run_parse_only(c: &mut Criterion) {
    let source = "function fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } fib(10);";
    c.bench_function("parse_fib", |b| {
        b.iter(|| {
            let script = parse(black_box(source), "bench.js").unwrap();
            black_box(script);
        });
    });
}

criterion_group!(benches, run_arithmetic_loop, run_array_pipeline, run_parse_only);
criterion_main!(benches);

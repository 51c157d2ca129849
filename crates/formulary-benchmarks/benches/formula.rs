//! Formula tokenizer, parser and renamer benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use formulary_benchmarks::{criterion_config, nested_formula};
use formulary_formula::{parse, refactor, serialize, tokenize, RenameMap};

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for depth in [1, 10, 100] {
        let formula = nested_formula(depth);
        group.throughput(Throughput::Bytes(formula.len() as u64));
        group.bench_with_input(BenchmarkId::new("nested_let", depth), &formula, |b, formula| {
            b.iter(|| black_box(tokenize(black_box(formula))))
        });
    }

    group.finish();
}

fn bench_parse_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for depth in [1, 10, 100] {
        let formula = nested_formula(depth);
        group.throughput(Throughput::Bytes(formula.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_serialize", depth), &formula, |b, formula| {
            b.iter(|| black_box(serialize(&parse(black_box(formula)))))
        });
    }

    group.finish();
}

fn bench_refactor(c: &mut Criterion) {
    let mut group = c.benchmark_group("refactor");
    let map: RenameMap = [("HELPER".to_string(), "PKG.HELPER".to_string())]
        .into_iter()
        .collect();

    for depth in [1, 10, 100] {
        let formula = nested_formula(depth);
        group.throughput(Throughput::Bytes(formula.len() as u64));
        group.bench_with_input(BenchmarkId::new("rename_helper", depth), &formula, |b, formula| {
            b.iter(|| black_box(refactor(black_box(formula), &map)))
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_tokenize, bench_parse_round_trip, bench_refactor
}
criterion_main!(benches);

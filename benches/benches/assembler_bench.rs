//! # Assembler Benchmarks
//!
//! Measures lexing and two-pass assembly of generated programs.
//!
//! Run: `cargo bench --bench assembler_bench`

use asp_core::lexer::tokenize;
use asp_core::{Assembler, MemoryLoader, Preprocessor, SourceLine, assemble};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// Straight-line program with a label every 16 instructions
fn straight_line(len: usize) -> String {
    let mut source = String::new();
    for i in 0..len {
        if i % 16 == 0 {
            source.push_str(&format!("block_{i}:\n"));
        }
        source.push_str(&format!("ADD r{}, {}\n", i % 16 + 1, i));
    }
    source.push_str("JMP block_0\n");
    source
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for line in ["MOV r1, 42", "VAR name, str, \"hello\\n\" // greeting", "FUNC f a:i32, b:f64"] {
        group.bench_with_input(BenchmarkId::from_parameter(line), line, |b, line| {
            b.iter(|| black_box(tokenize(line).unwrap()))
        });
    }

    group.finish();
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble");

    for len in [64, 1024, 16384] {
        let source = straight_line(len);
        group.bench_with_input(BenchmarkId::new("straight_line", len), &source, |b, source| {
            b.iter(|| black_box(assemble(source).unwrap()))
        });
    }

    let lines = SourceLine::numbered("bench.asp", &straight_line(1024));
    group.bench_function("pre_split_1024", |b| {
        b.iter(|| black_box(Assembler::new().assemble(&lines).unwrap()))
    });

    group.finish();
}

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess");

    let mut loader = MemoryLoader::new();
    let mut main = String::new();
    for i in 0..32 {
        loader = loader.with_file(
            format!("lib_{i}.asp"),
            format!("FUNC f{i} x:i32\n  ADD x, {i}\n  RETV x\nENDFUNC\nVAR v{i}, i32, {i}\n"),
        );
        main.push_str(&format!("IMPORT f{i} FROM \"lib_{i}.asp\"\n"));
    }

    group.bench_function("import_32_functions", |b| {
        b.iter(|| {
            let mut pre = Preprocessor::new(loader.clone());
            black_box(pre.expand_source("main.asp", &main, "").unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_assemble, bench_preprocess);
criterion_main!(benches);

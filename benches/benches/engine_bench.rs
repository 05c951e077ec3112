//! # Engine Benchmarks
//!
//! Measures dispatch throughput: arithmetic loops, calls and returns, and
//! width masking across register classes.
//!
//! Run: `cargo bench --bench engine_bench`

use asp_core::{Engine, MachineConfig, Program, assemble};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn quiet() -> MachineConfig {
    MachineConfig::default().with_prompt_input(false)
}

fn run(program: &Program, config: &MachineConfig) -> u64 {
    let mut engine = Engine::new(program, config, std::io::empty(), std::io::sink());
    engine.run().unwrap();
    engine.cycles().total()
}

/// Count a register of the given name down from `n`
fn countdown(reg: &str, n: u64) -> Program {
    assemble(&format!(
        "MOV {reg}, {n}\nloop:\nDEC {reg}\nGT {reg}, 0\nJNZ loop\n"
    ))
    .unwrap()
}

fn bench_loops(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_loop");
    let config = quiet();

    for (reg, label) in [("r1", "w16"), ("r7", "w32"), ("r11", "w64"), ("r14", "w128")] {
        let program = countdown(reg, 10_000);
        group.bench_with_input(BenchmarkId::new("countdown_10k", label), &program, |b, program| {
            b.iter(|| black_box(run(program, &config)))
        });
    }

    let float = assemble("VAR x, f64, 0\nVAR n, i32, 10000\nloop:\nADD x, 0.5\nDEC n\nGT n, 0\nJNZ loop\n").unwrap();
    group.bench_function("float_accumulate_10k", |b| b.iter(|| black_box(run(&float, &config))));

    group.finish();
}

fn bench_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_calls");
    let config = quiet();

    let calls = assemble(
        "VAR n, i32, 5000
        loop:
        CALL inc, n
        RESULT r7
        DEC n
        GT n, 0
        JNZ loop
        HALT
        FUNC inc x:i32
          INC x
          RETV x
        ENDFUNC",
    )
    .unwrap();
    group.bench_function("call_retv_5k", |b| b.iter(|| black_box(run(&calls, &config))));

    let fib = assemble(
        "CALL fib, 15
        RESULT r11
        HALT
        FUNC fib n:i64
          LT n, 2
          JZ recurse
          RETV n
        recurse:
          VAR a, i64, 0
          MOV a, n
          SUB a, 1
          CALL fib, a
          RESULT a
          VAR b, i64, 0
          MOV b, n
          SUB b, 2
          CALL fib, b
          RESULT b
          ADD a, b
          RETV a
        ENDFUNC",
    )
    .unwrap();
    group.bench_function("recursive_fib_15", |b| b.iter(|| black_box(run(&fib, &config))));

    group.finish();
}

criterion_group!(benches, bench_loops, bench_calls);
criterion_main!(benches);

//! # Snippet engine benchmarks
//!
//! ## Groups
//! - `convergence`: closing a cycle of mutually recursive methods
//! - `cascade`: dropping a declaration with a chain of dependents
//! - `execution`: evaluating an expression against defined snippets
//!
//! ## Usage
//! ```bash
//! cargo bench              # everything
//! cargo bench convergence  # only the fixpoint loop
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use snippet_engine::engine::{Engine, SnippetId};
use snippet_engine::sandbox::{classify_snippet, Sandbox};
use snippet_engine::util::config::EngineConfig;

fn quiet() {
    let _ = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(tracing::Level::ERROR)
        .try_init();
}

fn engine() -> Engine {
    Sandbox::new().engine(EngineConfig {
        index_library: false,
        ..EngineConfig::default()
    })
}

fn submit(
    engine: &mut Engine,
    source: &str,
) -> SnippetId {
    let events = engine.eval(classify_snippet(source)).expect("eval failed");
    events[0].snippet
}

fn cycle_member(
    i: usize,
    n: usize,
) -> String {
    format!(
        "int f{i}(int k) {{ if (k <= 0) {{ return 0; }} return f{next}(k - 1) + 1; }}",
        i = i,
        next = (i + 1) % n
    )
}

// ============================================================================
// Convergence - a cycle stays recoverable until its last member arrives
// ============================================================================

fn bench_cycle_convergence(c: &mut Criterion) {
    quiet();
    let mut group = c.benchmark_group("convergence");
    // setup builds the waiting chain one member at a time, which is superlinear in n
    for n in [4usize, 8, 16] {
        group.bench_with_input(BenchmarkId::new("close_cycle", n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let mut engine = engine();
                    for i in 0..n - 1 {
                        submit(&mut engine, &cycle_member(i, n));
                    }
                    engine
                },
                |mut engine| {
                    submit(&mut engine, &cycle_member(n - 1, n));
                    engine
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// ============================================================================
// Cascade - dropping the root of a dependency chain
// ============================================================================

fn bench_drop_cascade(c: &mut Criterion) {
    quiet();
    c.bench_function("drop_chain_8", |b| {
        b.iter_batched(
            || {
                let mut engine = engine();
                let root = submit(&mut engine, "int c0 = 1;");
                for i in 1..8 {
                    submit(&mut engine, &format!("int c{}() {{ return c{}{} + 1; }}", i, i - 1, if i == 1 { "" } else { "()" }));
                }
                (engine, root)
            },
            |(mut engine, root)| {
                engine.drop(root).expect("drop failed");
                engine
            },
            BatchSize::SmallInput,
        )
    });
}

// ============================================================================
// Execution - invoking defined snippets
// ============================================================================

fn bench_execute(c: &mut Criterion) {
    quiet();
    let mut engine = engine();
    submit(&mut engine, "int fib(int n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }");
    c.bench_function("eval_fib_15", |b| {
        b.iter(|| engine.eval(classify_snippet("fib(15)")).expect("eval failed"))
    });
}

criterion_group!(
    name = convergence;
    config = Criterion::default().sample_size(20);
    targets = bench_cycle_convergence
);

criterion_group!(
    name = cascade;
    config = Criterion::default().sample_size(20);
    targets = bench_drop_cascade
);

criterion_group!(
    name = execution;
    config = Criterion::default().sample_size(30);
    targets = bench_execute
);

criterion_main!(convergence, cascade, execution);

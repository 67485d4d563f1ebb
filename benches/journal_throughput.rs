use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use echo_memory::core::canonical;
use echo_memory::core::config::EchoConfig;
use echo_memory::core::engine::EchoEngine;
use echo_memory::core::journal::{self, ThoughtKind};
use echo_memory::core::store::Store;
use serde_json::{Map, json};
use std::time::Duration;
use tempfile::TempDir;

fn context(width: usize) -> Map<String, serde_json::Value> {
    let mut ctx = Map::new();
    for i in 0..width {
        ctx.insert(
            format!("key_{i:03}"),
            json!({"files": ["src/a.rs", "src/b.rs"], "score": i as f64 / 7.0, "note": "naïve"}),
        );
    }
    ctx
}

/// Canonical hashing of records with growing context maps
fn bench_hash_entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_entry");
    for width in [1usize, 16, 128] {
        let record = json!({
            "timestamp": "2025-10-27T14:03:12.501234",
            "session_id": "20251027_140312",
            "type": "problem_solving",
            "content": "Split the parser into lexer and grammar stages",
            "context": context(width),
            "signal_created": false,
        });
        group.bench_with_input(BenchmarkId::from_parameter(width), &record, |b, record| {
            b.iter(|| black_box(canonical::hash_entry(record)));
        });
    }
    group.finish();
}

/// Full append path: seal, journal line, aggregate rewrite
fn bench_log_thought(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_thought");
    group.measurement_time(Duration::from_secs(10));

    let temp_dir = TempDir::new().unwrap();
    let mut engine =
        EchoEngine::open_with(Store::new(temp_dir.path()), EchoConfig::default(), None).unwrap();
    let ctx = context(4);

    group.bench_function("append", |b| {
        b.iter(|| {
            engine
                .log_thought(ThoughtKind::ProblemSolving, "bench", ctx.clone(), false)
                .unwrap()
        });
    });
    group.finish();
}

/// Verifying a journal of N entries
fn bench_verify_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify_session");
    for entries in [10usize, 100, 1000] {
        let temp_dir = TempDir::new().unwrap();
        let mut engine =
            EchoEngine::open_with(Store::new(temp_dir.path()), EchoConfig::default(), None)
                .unwrap();
        for i in 0..entries {
            engine
                .log_thought(ThoughtKind::Learning, &format!("entry {i}"), context(2), false)
                .unwrap();
        }
        let path = engine.session_file().to_path_buf();

        group.bench_with_input(BenchmarkId::from_parameter(entries), &path, |b, path| {
            b.iter(|| black_box(journal::verify_session(path).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_hash_entry,
    bench_log_thought,
    bench_verify_session
);
criterion_main!(benches);

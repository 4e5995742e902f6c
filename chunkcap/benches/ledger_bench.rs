//! Benchmarks for ledger ordinal assignment.

use chunkcap::core::{ChunkKey, OutputKind};
use chunkcap::layout::OutputLayout;
use chunkcap::ledger::OutputLedger;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn ledger_benchmark(c: &mut Criterion) {
    let ledger = OutputLedger::new(OutputLayout::new(std::env::temp_dir()));
    let key = ChunkKey::new("bench-doc", "bench-chunk");

    c.bench_function("assign_next", |b| {
        b.iter(|| black_box(ledger.assign_next(black_box(&key), OutputKind::Plot)))
    });
}

criterion_group!(benches, ledger_benchmark);
criterion_main!(benches);

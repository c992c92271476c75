//! Emit path cost with and without live subscribers.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use sand_common::config::LogLevel;
use sand_control::diagnostics::{DiagnosticsBus, LogEvent};

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagnostics_emit");
    for subscribers in [0usize, 1, 8] {
        let bus = DiagnosticsBus::new(1000, 100);
        let subs: Vec<_> = (0..subscribers).map(|_| bus.subscribe()).collect();
        let event = LogEvent::new(LogLevel::Info, "sand_control::link", 42, "batch sent");

        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, _| {
            b.iter(|| {
                bus.emit(black_box(event.clone()));
                for sub in &subs {
                    sub.drain();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_emit);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use core2core::affinity::current_affinity;
use core2core::bench::{PairBenchmark, RunSettings};
use core2core::channel::HandoffChannel;
use core2core::CoreId;
use std::time::Duration;

const MESSAGES: u64 = 100_000;

fn bench_channel_steady_state(c: &mut Criterion) {
	let mut group = c.benchmark_group("handoff_steady_state");
	group.throughput(Throughput::Elements(MESSAGES));
	for &cap in &[4usize, 256, 65_536] {
		group.bench_with_input(BenchmarkId::from_parameter(cap), &cap, |b, &cap| {
			b.iter_batched(
				|| HandoffChannel::<String>::new(cap, Duration::from_secs(10)).split(),
				|(mut tx, mut rx)| {
					let prod = std::thread::spawn(move || {
						for i in 1..=MESSAGES { tx.send(i.to_string()).unwrap(); }
					});
					let cons = std::thread::spawn(move || {
						for _ in 0..MESSAGES { criterion::black_box(rx.receive().unwrap()); }
					});
					prod.join().unwrap();
					cons.join().unwrap();
				},
				BatchSize::PerIteration,
			);
		});
	}
	group.finish();
}

fn bench_pinned_pairs(c: &mut Criterion) {
	// Pinning needs at least one core the process may run on
	let Ok(allowed) = current_affinity() else { return };
	let cores: Vec<CoreId> = allowed.iter().take(2).collect();
	let Some(&first) = cores.first() else { return };
	let last = *cores.last().unwrap_or(&first);

	let settings = RunSettings {
		core_count: last.index() + 1,
		messages: MESSAGES,
		capacity: 1_024,
		wait_timeout: Duration::from_secs(10),
	};
	let bench = PairBenchmark::new(settings);

	let mut group = c.benchmark_group("pinned_pair");
	group.sample_size(10);
	group.throughput(Throughput::Elements(MESSAGES));
	for (name, producer, consumer) in [("same_core", first, first), ("cross_core", first, last)] {
		group.bench_function(name, |b| {
			b.iter_custom(|iters| {
				(0..iters)
					.map(|_| bench.run(producer, consumer).unwrap().elapsed)
					.sum()
			});
		});
	}
	group.finish();
}

criterion_group!(benches, bench_channel_steady_state, bench_pinned_pairs);
criterion_main!(benches);

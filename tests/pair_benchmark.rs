//! End-to-end runs with the real OS affinity binder.
//!
//! Cores are taken from the test process's own affinity so the tests work
//! inside restricted cpusets.

#![cfg(any(target_os = "linux", windows))]

use core2core::affinity::current_affinity;
use core2core::bench::{PairBenchmark, RunSettings, Sweep};
use core2core::core::config::ErrorPolicy;
use core2core::{CoreId, Error};
use std::time::Duration;

fn allowed_cores() -> Vec<CoreId> {
    current_affinity().unwrap().iter().collect()
}

fn settings(core_count: usize, messages: u64, capacity: usize) -> RunSettings {
    RunSettings {
        core_count,
        messages,
        capacity,
        wait_timeout: Duration::from_secs(30),
    }
}

#[test]
fn four_slot_ring_ten_messages() {
    let cores = allowed_cores();
    let producer = cores[0];
    let consumer = *cores.get(1).unwrap_or(&producer);
    let core_count = producer.index().max(consumer.index()) + 1;

    let bench = PairBenchmark::new(settings(core_count, 10, 4));
    let result = bench.run(producer, consumer).unwrap();

    assert_eq!(result.producer, producer);
    assert_eq!(result.consumer, consumer);
    assert_eq!(result.received, 10);
    assert!(result.throughput.is_finite() && result.throughput > 0.0);
}

#[test]
fn same_core_warmup_baseline() {
    let core = allowed_cores()[0];
    let bench = PairBenchmark::new(settings(core.index() + 1, 50_000, 1_000));
    let result = bench.run(core, core).unwrap();
    assert_eq!(result.received, 50_000);
}

#[test]
fn core_equal_to_count_is_configuration_error() {
    let core_count = allowed_cores()[0].index() + 1;
    let bench = PairBenchmark::new(settings(core_count, 10, 4));
    let err = bench.run(CoreId(core_count), CoreId(0)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err}");
}

#[test]
fn sweep_over_allowed_prefix() {
    // Only sweep cores 0..n where every core is allowed, so binding succeeds
    let cores = allowed_cores();
    let n = cores
        .iter()
        .enumerate()
        .take_while(|(i, c)| c.index() == *i)
        .count()
        .min(2);
    if n == 0 {
        return;
    }

    let sweep = Sweep::with_binder(
        settings(n, 5_000, 64),
        1,
        ErrorPolicy::Abort,
        core2core::PlatformBinder,
    );
    let report = sweep.run().unwrap();
    assert_eq!(report.failures, 0);
    for p in 0..n {
        for c in 0..n {
            assert!(report.matrix.get(p, c).unwrap() > 0.0);
        }
    }
}

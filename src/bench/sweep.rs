//! Full core-pair sweep
//!
//! Runs a few same-core warm-ups on core 0, then every ordered
//! `(producer, consumer)` pair in row-major order. Each pair gets a fresh
//! channel and fresh threads; nothing carries over between runs.

use crate::affinity::{AffinityBinder, PlatformBinder};
use crate::bench::pair::{PairBenchmark, RunSettings};
use crate::core::config::{Config, ErrorPolicy};
use crate::core::{CoreId, Result};
use crate::system::metrics;
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Square grid of messages-per-second indexed by `(producer, consumer)`.
///
/// `None` marks a pair that failed and was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputMatrix {
    size: usize,
    cells: Vec<Option<f64>>,
}

impl ThroughputMatrix {
    /// Empty `size × size` matrix
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Number of cores per side
    pub fn size(&self) -> usize {
        self.size
    }

    /// Throughput for a pair, if measured.
    ///
    /// `None` for a skipped pair and for a pair outside the matrix.
    pub fn get(&self, producer: usize, consumer: usize) -> Option<f64> {
        self.index(producer, consumer).and_then(|idx| self.cells[idx])
    }

    /// Store the throughput for a pair; out-of-range pairs are ignored
    pub(crate) fn set(&mut self, producer: usize, consumer: usize, value: Option<f64>) {
        if let Some(idx) = self.index(producer, consumer) {
            self.cells[idx] = value;
        }
    }

    /// One slice per producer core
    pub fn rows(&self) -> impl Iterator<Item = &[Option<f64>]> {
        // chunks(0) panics, and an empty matrix has no rows anyway
        self.cells.chunks(self.size.max(1))
    }

    fn index(&self, producer: usize, consumer: usize) -> Option<usize> {
        (producer < self.size && consumer < self.size).then(|| producer * self.size + consumer)
    }
}

impl Serialize for ThroughputMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.size))?;
        for row in self.rows() {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

/// Everything a sweep produced
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Cores per side of the matrix
    pub core_count: usize,
    /// Messages handed off per pair
    pub messages: u64,
    /// Channel capacity used
    pub capacity: usize,
    /// Same-core warm-up runs executed first
    pub warmup_runs: usize,
    /// Messages per second per pair
    pub matrix: ThroughputMatrix,
    /// Pairs that failed and were skipped
    pub failures: usize,
    /// Wall time of the whole sweep including warm-up
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Drives a [`PairBenchmark`] over every core pair
pub struct Sweep<B = PlatformBinder> {
    bench: PairBenchmark<B>,
    warmup_runs: usize,
    on_error: ErrorPolicy,
    record_metrics: bool,
}

impl Sweep<PlatformBinder> {
    /// Sweep configured from a loaded [`Config`]
    pub fn from_config(config: &Config) -> Self {
        Self::with_binder(
            RunSettings::from_config(config),
            config.benchmark.warmup_runs,
            config.benchmark.on_error,
            PlatformBinder,
        )
        .with_metrics(config.metrics.enabled)
    }
}

impl<B: AffinityBinder + Clone + 'static> Sweep<B> {
    /// Sweep with a custom binder
    pub fn with_binder(settings: RunSettings, warmup_runs: usize, on_error: ErrorPolicy, binder: B) -> Self {
        Self {
            bench: PairBenchmark::with_binder(settings, binder),
            warmup_runs,
            on_error,
            record_metrics: false,
        }
    }

    /// Record each pair run in the Prometheus metrics
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.record_metrics = enabled;
        self
    }

    /// Warm up, then measure every ordered pair
    pub fn run(&self) -> Result<SweepReport> {
        let settings = *self.bench.settings();
        let n = settings.core_count;
        let start = Instant::now();

        info!(
            cores = n,
            messages = settings.messages,
            capacity = settings.capacity,
            warmup = self.warmup_runs,
            "starting sweep"
        );

        for i in 0..self.warmup_runs {
            let result = self.bench.run(CoreId(0), CoreId(0))?;
            debug!(run = i, mmps = result.mmps(), "warm-up");
        }

        let mut matrix = ThroughputMatrix::new(n);
        let mut failures = 0;

        for producer in 0..n {
            for consumer in 0..n {
                let outcome = self.bench.run(CoreId(producer), CoreId(consumer));
                if self.record_metrics {
                    metrics::record_run(&outcome);
                }
                match outcome {
                    Ok(result) => matrix.set(producer, consumer, Some(result.throughput)),
                    Err(e) => match self.on_error {
                        ErrorPolicy::Abort => return Err(e),
                        ErrorPolicy::Skip => {
                            warn!(producer, consumer, error = %e, "pair failed, skipping");
                            failures += 1;
                        }
                    },
                }
            }
            info!(producer, of = n, "row complete");
        }

        let elapsed = start.elapsed();
        info!(elapsed_secs = elapsed.as_secs_f64(), failures, "sweep complete");

        Ok(SweepReport {
            core_count: n,
            messages: settings.messages,
            capacity: settings.capacity,
            warmup_runs: self.warmup_runs,
            matrix,
            failures,
            elapsed,
        })
    }
}

//! Metrics collection for core2core
//!
//! Prometheus counters and gauges describing benchmark runs. Everything is
//! registered in the default registry the first time [`Metrics::global`] is
//! touched; recording is opt-in through the `[metrics]` config section.

use crate::bench::BenchmarkResult;
use crate::core::Result;
use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter, Gauge,
    GaugeVec, Histogram, IntCounter,
};
use std::path::Path;

/// Run-level metrics for pair benchmarks
pub struct Metrics {
    /// Pair runs that completed
    pub runs: IntCounter,
    /// Pair runs that returned an error
    pub run_failures: IntCounter,
    /// Messages handed off across all completed runs
    pub messages: IntCounter,
    /// Wall time per completed run in seconds
    pub run_duration: Histogram,
    /// Throughput of the most recent completed run
    pub last_throughput: Gauge,
    /// Throughput per `(producer, consumer)` pair
    pub pair_throughput: GaugeVec,
}

impl Metrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        Ok(Self {
            runs: register_int_counter!(
                "c2c_runs_total",
                "Total number of completed pair runs"
            )?,
            run_failures: register_int_counter!(
                "c2c_run_failures_total",
                "Total number of failed pair runs"
            )?,
            messages: register_int_counter!(
                "c2c_messages_total",
                "Total messages handed off across completed runs"
            )?,
            run_duration: register_histogram!(
                "c2c_run_duration_seconds",
                "Wall time of a pair run in seconds",
                vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
            )?,
            last_throughput: register_gauge!(
                "c2c_last_throughput_messages_per_second",
                "Throughput of the most recent pair run"
            )?,
            pair_throughput: register_gauge_vec!(
                "c2c_pair_throughput_messages_per_second",
                "Throughput per producer/consumer core pair",
                &["producer", "consumer"]
            )?,
        })
    }

    /// Get the global metrics instance
    pub fn global() -> &'static Metrics {
        static INSTANCE: Lazy<Metrics> = Lazy::new(|| {
            Metrics::new().expect("Failed to initialize metrics")
        });
        &INSTANCE
    }
}

/// Record the outcome of one pair run
pub fn record_run(outcome: &Result<BenchmarkResult>) {
    let metrics = Metrics::global();
    match outcome {
        Ok(result) => {
            metrics.runs.inc();
            metrics.messages.inc_by(result.received);
            metrics.run_duration.observe(result.elapsed.as_secs_f64());
            metrics.last_throughput.set(result.throughput);
            let producer = result.producer.to_string();
            let consumer = result.consumer.to_string();
            metrics
                .pair_throughput
                .with_label_values(&[producer.as_str(), consumer.as_str()])
                .set(result.throughput);
        }
        Err(_) => metrics.run_failures.inc(),
    }
}

/// Initialize the metrics registry by creating the global metrics instance
pub fn init_registry() {
    let _ = Metrics::global();
}

/// Collect and return all metrics as a Prometheus-formatted string
pub fn collect_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}

/// Write the exposition text to `path`
pub fn write_metrics(path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, collect_metrics())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CoreId, Error};
    use std::time::Duration;

    #[test]
    fn records_success_and_failure() {
        init_registry();
        let metrics = Metrics::global();
        let runs = metrics.runs.get();
        let failures = metrics.run_failures.get();

        let ok = Ok(BenchmarkResult {
            producer: CoreId(3),
            consumer: CoreId(5),
            elapsed: Duration::from_millis(500),
            messages: 1_000,
            received: 1_000,
            throughput: 2_000.0,
        });
        record_run(&ok);
        record_run(&Err(Error::config("bad core")));

        assert!(metrics.runs.get() > runs);
        assert!(metrics.run_failures.get() > failures);

        let text = collect_metrics();
        assert!(text.contains("c2c_runs_total"));
        let pair_line = text
            .lines()
            .find(|l| l.starts_with("c2c_pair_throughput_messages_per_second{") && l.contains(r#"producer="3""#))
            .unwrap();
        assert!(pair_line.contains(r#"consumer="5""#));
    }

    #[test]
    fn writes_exposition_file() {
        init_registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.prom");
        write_metrics(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("c2c_run_failures_total"));
    }
}

//! One producer/consumer run between two pinned cores
//!
//! The clock starts right before the worker threads are spawned and stops
//! after both are joined, so a measurement includes thread start-up and
//! affinity binding, not only steady-state handoffs.

use crate::affinity::{AffinityBinder, PlatformBinder};
use crate::bench::payload;
use crate::channel::HandoffChannel;
use crate::core::config::{Config, DEFAULT_CAPACITY, DEFAULT_MESSAGES};
use crate::core::{AffinityMask, CoreId, Error, Result, Role};
use serde::{Serialize, Serializer};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Parameters shared by every run of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Cores are valid in `[0, core_count)`
    pub core_count: usize,
    /// Messages handed off per run
    pub messages: u64,
    /// Channel capacity in slots
    pub capacity: usize,
    /// Longest a worker blocks on its counterpart
    pub wait_timeout: Duration,
}

impl RunSettings {
    /// Settings from a loaded configuration, resolving the core count
    pub fn from_config(config: &Config) -> Self {
        Self {
            core_count: config.effective_core_count(),
            messages: config.benchmark.messages,
            capacity: config.benchmark.capacity,
            wait_timeout: config.benchmark.wait_timeout,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            core_count: num_cpus::get().max(1),
            messages: DEFAULT_MESSAGES,
            capacity: DEFAULT_CAPACITY,
            wait_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of one pair run
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    /// Core the sending thread was pinned to
    pub producer: CoreId,
    /// Core the receiving thread was pinned to
    pub consumer: CoreId,
    /// Wall time from spawn to join
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Messages the producer sent
    pub messages: u64,
    /// Messages the consumer received
    pub received: u64,
    /// Messages per second over `elapsed`
    pub throughput: f64,
}

impl BenchmarkResult {
    /// Throughput in millions of messages per second
    pub fn mmps(&self) -> f64 {
        self.throughput * 1e-6
    }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Runs the handoff workload between two cores
pub struct PairBenchmark<B = PlatformBinder> {
    settings: RunSettings,
    binder: B,
}

impl PairBenchmark<PlatformBinder> {
    /// Benchmark using the platform's affinity mechanism
    pub fn new(settings: RunSettings) -> Self {
        Self::with_binder(settings, PlatformBinder)
    }
}

impl<B: AffinityBinder + Clone + 'static> PairBenchmark<B> {
    /// Benchmark using a custom binder
    pub fn with_binder(settings: RunSettings, binder: B) -> Self {
        Self { settings, binder }
    }

    /// Settings in use
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Reject bad input before anything is spawned
    fn validate(&self, producer: CoreId, consumer: CoreId) -> Result<()> {
        let s = &self.settings;
        for core in [producer, consumer] {
            if core.index() >= s.core_count {
                return Err(Error::config(format!(
                    "Core {} out of range [0, {})",
                    core, s.core_count
                )));
            }
        }
        if s.messages == 0 {
            return Err(Error::config("Message count must be at least 1"));
        }
        if s.capacity == 0 {
            return Err(Error::config("Channel capacity must be at least 1"));
        }
        Ok(())
    }

    /// Hand `messages` sequence numbers from `producer` to `consumer` and time it
    pub fn run(&self, producer: CoreId, consumer: CoreId) -> Result<BenchmarkResult> {
        self.validate(producer, consumer)?;
        let messages = self.settings.messages;

        let (mut tx, mut rx) =
            HandoffChannel::<String>::new(self.settings.capacity, self.settings.wait_timeout).split();

        let start = Instant::now();

        let producer_handle = {
            let binder = self.binder.clone();
            thread::Builder::new()
                .name(format!("c2c-producer-{}", producer))
                .spawn(move || -> Result<()> {
                    binder.bind(&AffinityMask::single(producer))?;
                    for seq in 1..=messages {
                        tx.send(payload::encode(seq))
                            .map_err(|e| Error::from_channel(Role::Producer, e))?;
                    }
                    Ok(())
                })?
        };

        let consumer_spawn = {
            let binder = self.binder.clone();
            thread::Builder::new()
                .name(format!("c2c-consumer-{}", consumer))
                .spawn(move || -> Result<u64> {
                    binder.bind(&AffinityMask::single(consumer))?;
                    consume(messages, || {
                        rx.receive().map_err(|e| Error::from_channel(Role::Consumer, e))
                    })
                })
        };

        // A failed spawn drops the receiver, which closes the channel and
        // lets the producer exit.
        let consumer_handle = match consumer_spawn {
            Ok(handle) => handle,
            Err(e) => {
                let _ = join_worker(producer_handle, Role::Producer);
                return Err(e.into());
            }
        };

        let produced = join_worker(producer_handle, Role::Producer);
        let consumed = join_worker(consumer_handle, Role::Consumer);
        let elapsed = start.elapsed();

        let received = match (produced, consumed) {
            (Ok(()), Ok(received)) => received,
            (Err(p), Err(c)) => return Err(if p.is_secondary() { c } else { p }),
            (Err(e), Ok(_)) | (Ok(()), Err(e)) => return Err(e),
        };

        let throughput = messages as f64 / elapsed.as_secs_f64();
        debug!(
            producer = producer.index(),
            consumer = consumer.index(),
            elapsed_ms = elapsed.as_millis() as u64,
            mmps = throughput * 1e-6,
            "pair finished"
        );

        Ok(BenchmarkResult {
            producer,
            consumer,
            elapsed,
            messages,
            received,
            throughput,
        })
    }
}

/// Receive until sequence number `messages` arrives, checking each one is next
fn consume(messages: u64, mut receive: impl FnMut() -> Result<String>) -> Result<u64> {
    let mut received = 0u64;
    loop {
        let value = payload::decode(&receive()?)?;
        received += 1;
        if value != received {
            return Err(Error::Sequence { expected: received, actual: value });
        }
        if value >= messages {
            return Ok(received);
        }
    }
}

fn join_worker<T>(handle: JoinHandle<Result<T>>, role: Role) -> Result<T> {
    handle
        .join()
        .map_err(|_| Error::internal(format!("{} thread panicked", role)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AffinityError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Accepts every bind without touching the OS
    #[derive(Clone, Default)]
    struct CountingBinder(Arc<AtomicUsize>);

    impl AffinityBinder for CountingBinder {
        fn bind(&self, _mask: &AffinityMask) -> std::result::Result<(), AffinityError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Refuses to bind to one core
    #[derive(Clone)]
    struct RefusingBinder(CoreId);

    impl AffinityBinder for RefusingBinder {
        fn bind(&self, mask: &AffinityMask) -> std::result::Result<(), AffinityError> {
            if mask.contains(self.0) {
                return Err(AffinityError::Os {
                    core: self.0,
                    source: std::io::Error::from_raw_os_error(22),
                });
            }
            Ok(())
        }
    }

    /// Stalls before binding one core, simulating a counterpart that never shows up
    #[derive(Clone)]
    struct StallingBinder(CoreId, Duration);

    impl AffinityBinder for StallingBinder {
        fn bind(&self, mask: &AffinityMask) -> std::result::Result<(), AffinityError> {
            if mask.contains(self.0) {
                std::thread::sleep(self.1);
            }
            Ok(())
        }
    }

    fn settings(messages: u64, capacity: usize) -> RunSettings {
        RunSettings {
            core_count: 2,
            messages,
            capacity,
            wait_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn small_ring_delivers_every_message_in_order() {
        let bench = PairBenchmark::with_binder(settings(10, 4), CountingBinder::default());
        let result = bench.run(CoreId(0), CoreId(1)).unwrap();
        assert_eq!(result.messages, 10);
        assert_eq!(result.received, 10);
        assert!(result.throughput.is_finite() && result.throughput > 0.0);
    }

    fn feed(payloads: &[&str]) -> impl FnMut() -> Result<String> {
        let mut it = payloads.iter().map(|p| p.to_string()).collect::<Vec<_>>().into_iter();
        move || it.next().ok_or(Error::Cancelled { role: Role::Consumer })
    }

    #[test]
    fn consumer_rejects_skipped_sequence_number() {
        let err = consume(5, feed(&["1", "3"])).unwrap_err();
        assert!(
            matches!(err, Error::Sequence { expected: 2, actual: 3 }),
            "{err}"
        );
    }

    #[test]
    fn consumer_rejects_garbage_payload() {
        let err = consume(5, feed(&["1", "two"])).unwrap_err();
        assert!(matches!(err, Error::InvalidPayload(ref p) if p == "two"), "{err}");
    }

    #[test]
    fn consumer_stops_at_last_message() {
        // Anything after the final sequence number is never read
        assert_eq!(consume(3, feed(&["1", "2", "3", "junk"])).unwrap(), 3);
    }

    #[test]
    fn consumer_propagates_receive_error() {
        let err = consume(3, feed(&["1"])).unwrap_err();
        assert!(matches!(err, Error::Cancelled { role: Role::Consumer }));
    }

    #[test]
    fn single_message_run() {
        let bench = PairBenchmark::with_binder(settings(1, 4), CountingBinder::default());
        let result = bench.run(CoreId(1), CoreId(0)).unwrap();
        assert_eq!(result.received, 1);
    }

    #[test]
    fn same_core_pair_is_allowed() {
        let binder = CountingBinder::default();
        let bench = PairBenchmark::with_binder(settings(1_000, 16), binder.clone());
        let result = bench.run(CoreId(1), CoreId(1)).unwrap();
        assert_eq!(result.producer, result.consumer);
        assert_eq!(binder.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn out_of_range_core_is_rejected_before_spawning() {
        let binder = CountingBinder::default();
        let bench = PairBenchmark::with_binder(settings(10, 4), binder.clone());
        let err = bench.run(CoreId(2), CoreId(0)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = bench.run(CoreId(0), CoreId(2)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(binder.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_messages_is_rejected() {
        let bench = PairBenchmark::with_binder(settings(0, 4), CountingBinder::default());
        assert!(matches!(bench.run(CoreId(0), CoreId(1)), Err(Error::Config(_))));
    }

    #[test]
    fn consumer_bind_failure_surfaces_instead_of_hanging() {
        let bench = PairBenchmark::with_binder(settings(100_000, 4), RefusingBinder(CoreId(1)));
        let err = bench.run(CoreId(0), CoreId(1)).unwrap_err();
        assert!(
            matches!(err, Error::Affinity(AffinityError::Os { core: CoreId(1), .. })),
            "{err}"
        );
    }

    #[test]
    fn producer_bind_failure_surfaces_instead_of_hanging() {
        let bench = PairBenchmark::with_binder(settings(100_000, 4), RefusingBinder(CoreId(0)));
        let err = bench.run(CoreId(0), CoreId(1)).unwrap_err();
        assert!(
            matches!(err, Error::Affinity(AffinityError::Os { core: CoreId(0), .. })),
            "{err}"
        );
    }

    #[test]
    fn stalled_consumer_times_out_producer() {
        let mut s = settings(100, 4);
        s.wait_timeout = Duration::from_millis(50);
        let bench = PairBenchmark::with_binder(s, StallingBinder(CoreId(1), Duration::from_millis(500)));
        let err = bench.run(CoreId(0), CoreId(1)).unwrap_err();
        assert!(
            matches!(err, Error::DeadlockTimeout { role: Role::Producer, .. }),
            "{err}"
        );
    }

    #[test]
    fn result_serializes_seconds() {
        let bench = PairBenchmark::with_binder(settings(5, 2), CountingBinder::default());
        let result = bench.run(CoreId(0), CoreId(1)).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["producer"], 0);
        assert_eq!(json["consumer"], 1);
        assert!(json["elapsed_secs"].as_f64().unwrap() > 0.0);
    }
}

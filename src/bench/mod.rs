//! Cross-core benchmark engine
//!
//! [`PairBenchmark`] measures one ordered core pair; [`Sweep`] drives it over
//! every pair and collects a [`ThroughputMatrix`].

pub mod payload;
pub mod pair;
pub mod sweep;

pub use pair::{BenchmarkResult, PairBenchmark, RunSettings};
pub use sweep::{Sweep, SweepReport, ThroughputMatrix};

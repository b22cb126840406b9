//! core2core - Inter-Core Message Throughput
//!
//! For every ordered pair of logical cores, core2core pins a producer thread
//! to one core and a consumer thread to the other, pushes a fixed number of
//! messages through a bounded single-producer single-consumer channel, and
//! records messages per second. The resulting matrix exposes the machine's
//! cache and interconnect topology: pairs sharing a die hand off faster than
//! pairs that cross one.
#![warn(missing_docs)]

// Configure global allocator for maximum performance
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

// Core foundational modules
pub mod core;

// Main functional modules
pub mod affinity;
pub mod channel;
pub mod bench;
pub mod report;
pub mod system;

// Re-export commonly used items for convenience
pub use crate::core::{AffinityError, AffinityMask, Config, CoreId, Error, Result};
pub use affinity::{AffinityBinder, PlatformBinder};
pub use bench::{BenchmarkResult, PairBenchmark, RunSettings, Sweep, SweepReport, ThroughputMatrix};
pub use channel::HandoffChannel;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging (and metrics, when enabled) for the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// so the report on stdout stays clean.
pub fn init(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::internal(format!("Failed to initialize logging: {}", e)))?;

    tracing::info!("Initializing {} v{}", NAME, VERSION);

    if config.metrics.enabled {
        system::metrics::init_registry();
    }

    Ok(())
}

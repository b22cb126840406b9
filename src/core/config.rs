//! Configuration management for core2core
//!
//! Settings are layered: built-in defaults, then `core2core.toml` (if
//! present), then `C2C_*` environment variables, then command-line overrides
//! applied by the binary. [`Config::validate`] runs last.

use crate::core::error::{Error, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "core2core.toml";

/// Messages handed off per core pair
pub const DEFAULT_MESSAGES: u64 = 2_500_000;

/// Slots in each handoff channel
pub const DEFAULT_CAPACITY: usize = 1_000_000;

/// Same-core runs executed before the sweep
pub const DEFAULT_WARMUP_RUNS: usize = 10;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Benchmark parameters
    pub benchmark: BenchmarkConfig,

    /// Report output
    pub output: OutputConfig,

    /// Metrics export
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Benchmark parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Number of logical cores to sweep (0 = host-reported)
    pub core_count: usize,

    /// Messages handed off per run
    pub messages: u64,

    /// Handoff channel capacity in slots
    pub capacity: usize,

    /// Same-core warm-up runs before the sweep
    pub warmup_runs: usize,

    /// Longest a worker may block on its counterpart
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub wait_timeout: Duration,

    /// What the sweep does when a pair fails
    pub on_error: ErrorPolicy,
}

/// Sweep behaviour on a failed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the sweep and return the error
    Abort,
    /// Log the error, leave the cell empty and continue
    Skip,
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Report format
    pub format: OutputFormat,
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown table in millions of messages per second
    Markdown,
    /// Pretty-printed JSON report
    Json,
}

/// Metrics configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Record Prometheus metrics for each run
    pub enabled: bool,

    /// Write the exposition text here after the sweep
    pub dump_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            core_count: 0, // Auto-detect
            messages: DEFAULT_MESSAGES,
            capacity: DEFAULT_CAPACITY,
            warmup_runs: DEFAULT_WARMUP_RUNS,
            wait_timeout: Duration::from_secs(10),
            on_error: ErrorPolicy::Abort,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Markdown,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(Error::config(format!(
                "Invalid error policy: {}. Valid options: abort, skip",
                s
            ))),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(Error::config(format!(
                "Invalid output format: {}. Valid options: markdown, json",
                s
            ))),
        }
    }
}

impl Config {
    /// Load configuration from the default file (if any) and environment variables.
    ///
    /// Not validated; callers apply their own overrides first and then call
    /// [`validate`](Self::validate).
    pub fn load() -> Result<Self> {
        let mut config = if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply `C2C_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment, test fixtures)
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(cores) = lookup("C2C_CORE_COUNT") {
            self.benchmark.core_count = cores
                .parse()
                .map_err(|e| Error::config(format!("Invalid core count: {}", e)))?;
        }

        if let Some(messages) = lookup("C2C_MESSAGES") {
            self.benchmark.messages = messages
                .parse()
                .map_err(|e| Error::config(format!("Invalid message count: {}", e)))?;
        }

        if let Some(capacity) = lookup("C2C_CAPACITY") {
            self.benchmark.capacity = capacity
                .parse()
                .map_err(|e| Error::config(format!("Invalid capacity: {}", e)))?;
        }

        if let Some(warmup) = lookup("C2C_WARMUP_RUNS") {
            self.benchmark.warmup_runs = warmup
                .parse()
                .map_err(|e| Error::config(format!("Invalid warm-up runs: {}", e)))?;
        }

        if let Some(timeout) = lookup("C2C_WAIT_TIMEOUT") {
            self.benchmark.wait_timeout = parse_duration(&timeout)
                .map_err(|e| Error::config(format!("Invalid wait timeout: {}", e)))?;
        }

        if let Some(policy) = lookup("C2C_ON_ERROR") {
            self.benchmark.on_error = policy.parse()?;
        }

        if let Some(format) = lookup("C2C_FORMAT") {
            self.output.format = format.parse()?;
        }

        if let Some(level) = lookup("C2C_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values against the host
    pub fn validate(&self) -> Result<()> {
        let host = num_cpus::get();
        if self.benchmark.core_count > host {
            return Err(Error::config(format!(
                "Core count {} exceeds host logical core count {}",
                self.benchmark.core_count, host
            )));
        }

        if self.benchmark.messages == 0 {
            return Err(Error::config("Message count must be at least 1"));
        }

        if self.benchmark.capacity == 0 {
            return Err(Error::config("Channel capacity must be at least 1"));
        }

        if self.benchmark.wait_timeout.is_zero() {
            return Err(Error::config("Wait timeout must be non-zero"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        Ok(())
    }

    /// Core count to sweep, resolving 0 to the host count
    pub fn effective_core_count(&self) -> usize {
        if self.benchmark.core_count == 0 {
            num_cpus::get().max(1)
        } else {
            self.benchmark.core_count
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a duration string like '500ms' or '10s', or whole seconds")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<Duration, E>
        where
            E: de::Error,
        {
            parse_duration(value).map_err(E::custom)
        }

        fn visit_u64<E>(self, value: u64) -> std::result::Result<Duration, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> std::result::Result<Duration, E>
        where
            E: de::Error,
        {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must not be negative"))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{}ms", value.as_millis()))
}

/// Parse durations like `250ms`, `10s`, `2m`, `1h` or bare seconds
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let parse = |digits: &str, unit: &str| -> std::result::Result<u64, String> {
        digits
            .parse::<u64>()
            .map_err(|_| format!("Invalid {} in duration {:?}", unit, s))
    };

    if let Some(ms) = s.strip_suffix("ms") {
        Ok(Duration::from_millis(parse(ms, "milliseconds")?))
    } else if let Some(secs) = s.strip_suffix('s') {
        Ok(Duration::from_secs(parse(secs, "seconds")?))
    } else if let Some(mins) = s.strip_suffix('m') {
        scaled(parse(mins, "minutes")?, 60, s)
    } else if let Some(hours) = s.strip_suffix('h') {
        scaled(parse(hours, "hours")?, 3600, s)
    } else {
        Ok(Duration::from_secs(parse(s, "seconds")?))
    }
}

fn scaled(value: u64, secs_per_unit: u64, s: &str) -> std::result::Result<Duration, String> {
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration {:?} is too large", s))
}

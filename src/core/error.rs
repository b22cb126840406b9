//! Error types and handling for core2core
//!
//! Every failure a benchmark run can hit surfaces through [`Error`]. Nothing
//! here is retryable: an affinity failure or a stalled counterpart will recur
//! identically on the next attempt.

use crate::core::types::CoreId;
use std::time::Duration;
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for core2core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors, raised before any worker thread is spawned
    #[error("Configuration error: {0}")]
    Config(String),

    /// The OS refused to pin a worker thread
    #[error("Affinity error: {0}")]
    Affinity(#[from] AffinityError),

    /// A worker waited on its counterpart longer than the configured timeout
    #[error("Deadlock timeout: {role} waited more than {waited:?} for its counterpart")]
    DeadlockTimeout {
        /// Which side of the channel gave up
        role: Role,
        /// The per-wait timeout that expired
        waited: Duration,
    },

    /// The counterpart closed the channel before the run completed
    #[error("Run cancelled: {role} observed a closed channel")]
    Cancelled {
        /// Which side observed the closure
        role: Role,
    },

    /// The consumer decoded a value out of sequence
    #[error("Sequence error: expected {expected}, got {actual}")]
    Sequence {
        /// Value the consumer expected next
        expected: u64,
        /// Value it actually decoded
        actual: u64,
    },

    /// A payload could not be decoded back into a sequence number
    #[error("Invalid payload: {0:?}")]
    InvalidPayload(String),

    /// Internal errors (worker panics and the like)
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Thread affinity errors
#[derive(Error, Debug)]
pub enum AffinityError {
    /// An empty mask was passed to a binder
    #[error("cannot bind to an empty affinity mask")]
    EmptyMask,

    /// The mask names a core the platform mechanism cannot express
    #[error("core {core} is out of range for this platform (max {max})")]
    OutOfRange {
        /// Offending core
        core: CoreId,
        /// Highest core the mechanism can address
        max: usize,
    },

    /// The OS call reported failure
    #[error("failed to bind to core {core}: {source}")]
    Os {
        /// Lowest core in the requested mask
        core: CoreId,
        /// Error reported by the OS
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to report the current affinity
    #[error("failed to query thread affinity: {0}")]
    Query(#[source] std::io::Error),

    /// No affinity mechanism exists for this target
    #[error("cannot bind to core {core}: thread affinity is not supported on this platform")]
    Unsupported {
        /// Lowest core in the requested mask
        core: CoreId,
    },
}

/// Handoff channel wait failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel was closed while waiting, or before the call
    #[error("channel closed")]
    Closed,

    /// No permit became available within the wait timeout
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// Side of a handoff channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The sending thread
    Producer,
    /// The receiving thread
    Consumer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Map a channel wait failure observed by `role` into a run error
    pub fn from_channel(role: Role, err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => Self::Cancelled { role },
            ChannelError::TimedOut(waited) => Self::DeadlockTimeout { role, waited },
        }
    }

    /// True for errors that only echo a failure on the other side of the channel
    pub fn is_secondary(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

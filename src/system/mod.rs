//! System utilities and monitoring
//!
//! Prometheus metrics for benchmark runs.

pub mod metrics;

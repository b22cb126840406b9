//! Core system types and foundations
//!
//! This module contains the fundamental building blocks shared by every other
//! module: core identifiers and masks, error handling, and configuration.

pub mod types;
pub mod error;
pub mod config;

// Re-export commonly used items
pub use types::{AffinityMask, CoreId};
pub use error::{AffinityError, ChannelError, Error, Result, Role};
pub use config::Config;

//! Thread affinity control
//!
//! Pins the *calling* thread to a set of logical cores. The mechanism differs
//! per OS but the contract does not:
//!
//! - an empty mask is rejected before any OS call
//! - on success the scheduler keeps the calling thread on the masked cores
//!   from that moment on
//! - any OS failure is reported as [`AffinityError`] naming the lowest core
//!   of the mask; callers treat it as fatal for the run
//!
//! Affinity belongs to the OS thread, so every worker binds itself at its own
//! start. Binders are stateless and nothing is cached between calls.

use crate::core::{AffinityError, AffinityMask, CoreId};
use tracing::debug;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use linux as sys;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use self::windows as sys;

#[cfg(not(any(target_os = "linux", windows)))]
mod unsupported;
#[cfg(not(any(target_os = "linux", windows)))]
use unsupported as sys;

/// Binds the calling thread to a set of cores
pub trait AffinityBinder: Send + Sync {
    /// Restrict the calling thread to the cores in `mask`
    fn bind(&self, mask: &AffinityMask) -> Result<(), AffinityError>;
}

/// The OS affinity mechanism of the build target
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformBinder;

impl AffinityBinder for PlatformBinder {
    fn bind(&self, mask: &AffinityMask) -> Result<(), AffinityError> {
        if mask.is_empty() {
            return Err(AffinityError::EmptyMask);
        }
        sys::bind_current(mask)?;
        debug!(mask = %mask, "bound thread");
        Ok(())
    }
}

impl<B: AffinityBinder + ?Sized> AffinityBinder for std::sync::Arc<B> {
    fn bind(&self, mask: &AffinityMask) -> Result<(), AffinityError> {
        (**self).bind(mask)
    }
}

/// Pin the calling thread to a single core
pub fn bind_to_core(core: CoreId) -> Result<(), AffinityError> {
    PlatformBinder.bind(&AffinityMask::single(core))
}

/// OS-reported affinity of the calling thread
pub fn current_affinity() -> Result<AffinityMask, AffinityError> {
    sys::current_affinity()
}

/// Logical cores available to this process
pub fn host_core_count() -> usize {
    num_cpus::get()
}

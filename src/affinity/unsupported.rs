//! Targets without a hard thread-affinity API (macOS, BSDs, wasm)

use crate::core::{AffinityError, AffinityMask};
use std::io;

pub(super) fn bind_current(mask: &AffinityMask) -> Result<(), AffinityError> {
    let core = mask.first().ok_or(AffinityError::EmptyMask)?;
    Err(AffinityError::Unsupported { core })
}

pub(super) fn current_affinity() -> Result<AffinityMask, AffinityError> {
    Err(AffinityError::Query(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread affinity is not supported on this platform",
    )))
}

//! Linux affinity via `pthread_setaffinity_np` on `pthread_self`

use crate::core::{AffinityError, AffinityMask, CoreId};
use std::mem;

const SET_SIZE: usize = libc::CPU_SETSIZE as usize;

pub(super) fn bind_current(mask: &AffinityMask) -> Result<(), AffinityError> {
    let first = mask.first().ok_or(AffinityError::EmptyMask)?;
    if let Some(core) = mask.max_core().filter(|c| c.0 >= SET_SIZE) {
        return Err(AffinityError::OutOfRange { core, max: SET_SIZE - 1 });
    }

    // SAFETY: cpu_set_t is plain data and valid when zeroed. Every core was
    // checked against CPU_SETSIZE above, and pthread_self() is always a live
    // handle for the calling thread.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = mem::zeroed();
        libc::CPU_ZERO(&mut set);
        for core in mask.iter() {
            libc::CPU_SET(core.0, &mut set);
        }
        libc::pthread_setaffinity_np(libc::pthread_self(), mem::size_of::<libc::cpu_set_t>(), &set)
    };

    // pthread functions return the error number instead of setting errno
    if rc != 0 {
        return Err(AffinityError::Os {
            core: first,
            source: std::io::Error::from_raw_os_error(rc),
        });
    }
    Ok(())
}

pub(super) fn current_affinity() -> Result<AffinityMask, AffinityError> {
    // SAFETY: as above; the kernel fills `set` for the calling thread.
    let (rc, set) = unsafe {
        let mut set: libc::cpu_set_t = mem::zeroed();
        let rc = libc::pthread_getaffinity_np(
            libc::pthread_self(),
            mem::size_of::<libc::cpu_set_t>(),
            &mut set,
        );
        (rc, set)
    };

    if rc != 0 {
        return Err(AffinityError::Query(std::io::Error::from_raw_os_error(rc)));
    }

    // SAFETY: CPU_ISSET only reads the set within CPU_SETSIZE.
    Ok((0..SET_SIZE)
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &set) })
        .map(CoreId)
        .collect())
}

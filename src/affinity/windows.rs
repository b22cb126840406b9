//! Windows affinity via `SetThreadAffinityMask` on `GetCurrentThread`
//!
//! Only the calling thread's processor group is addressable, so cores are
//! limited to the width of a `usize`.

use crate::core::{AffinityError, AffinityMask, CoreId};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, GetCurrentThread, GetProcessAffinityMask, SetThreadAffinityMask,
};

const GROUP_WIDTH: usize = usize::BITS as usize;

fn to_native(mask: &AffinityMask) -> Result<usize, AffinityError> {
    let mut native = 0usize;
    for core in mask.iter() {
        if core.0 >= GROUP_WIDTH {
            return Err(AffinityError::OutOfRange { core, max: GROUP_WIDTH - 1 });
        }
        native |= 1usize << core.0;
    }
    Ok(native)
}

fn from_native(native: usize) -> AffinityMask {
    (0..GROUP_WIDTH)
        .filter(|bit| native & (1usize << bit) != 0)
        .map(CoreId)
        .collect()
}

pub(super) fn bind_current(mask: &AffinityMask) -> Result<(), AffinityError> {
    let first = mask.first().ok_or(AffinityError::EmptyMask)?;
    let native = to_native(mask)?;

    // SAFETY: GetCurrentThread returns a pseudo-handle that needs no closing.
    let previous = unsafe { SetThreadAffinityMask(GetCurrentThread(), native) };
    if previous == 0 {
        return Err(AffinityError::Os {
            core: first,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

pub(super) fn current_affinity() -> Result<AffinityMask, AffinityError> {
    let mut process = 0usize;
    let mut system = 0usize;

    // SAFETY: both out-pointers are valid locals; the handles are pseudo-handles.
    // Windows has no getter for a thread mask, so swap in the process mask and
    // immediately restore the previous one.
    unsafe {
        if GetProcessAffinityMask(GetCurrentProcess(), &mut process, &mut system) == 0 {
            return Err(AffinityError::Query(std::io::Error::last_os_error()));
        }
        let thread = GetCurrentThread();
        let previous = SetThreadAffinityMask(thread, process);
        if previous == 0 {
            return Err(AffinityError::Query(std::io::Error::last_os_error()));
        }
        SetThreadAffinityMask(thread, previous);
        Ok(from_native(previous))
    }
}

//! Fallible heap allocation for handle storage and thread names.
use std::alloc::{alloc, Layout};
use std::mem::MaybeUninit;

use crate::error::SyncError;

/// Allocates uninitialized storage for a `T`, reporting failure instead of aborting
pub(crate) fn try_new_uninit<T>() -> Result<Box<MaybeUninit<T>>, SyncError> {
    let layout = Layout::new::<MaybeUninit<T>>();
    if layout.size() == 0 {
        return Ok(Box::new(MaybeUninit::uninit()));
    }

    // SAFETY: layout has a non-zero size
    let ptr = unsafe { alloc(layout) } as *mut MaybeUninit<T>;
    if ptr.is_null() {
        return Err(SyncError::AllocationFailed);
    }

    // SAFETY: ptr came from the global allocator with the layout of MaybeUninit<T>
    Ok(unsafe { Box::from_raw(ptr) })
}

/// # Safety
/// The storage must have been fully initialized.
pub(crate) unsafe fn assume_init<T>(storage: Box<MaybeUninit<T>>) -> Box<T> {
    // SAFETY: MaybeUninit<T> has the layout of T and the caller vouches for initialization
    unsafe { Box::from_raw(Box::into_raw(storage).cast::<T>()) }
}

/// Copies `name` into a freshly allocated `String`
pub(crate) fn try_copy_str(name: &str) -> Result<String, SyncError> {
    let mut owned = String::new();
    owned.try_reserve_exact(name.len())?;
    owned.push_str(name);
    Ok(owned)
}

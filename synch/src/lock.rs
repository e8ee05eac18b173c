//! Exclusive mutual-exclusion lock.
//!
//! [`Lock`] is a guardless wrapper around a `parking_lot` mutex: `lock` and
//! `unlock` are separate calls, exactly like the pthread primitive it
//! replaces. The lock remembers which thread holds it, so relocking from
//! the holder and unlocking from a stranger are reported as errors rather
//! than left undefined.
//!
//! Storage can come from three places:
//! - [`Lock::new`] for a value embedded in another structure or a `static`
//! - [`Lock::init`] for caller-provided uninitialized storage
//! - [`Lock::create`] for a separately heap-allocated handle
use std::fmt::{Debug, Formatter};
use std::mem::MaybeUninit;

use crate::alloc;
use crate::error::{DestroyError, SyncError};
use crate::owner::Owner;

pub struct Lock {
    inner: parking_lot::Mutex<()>,
    owner: Owner,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            inner: parking_lot::const_mutex(()),
            owner: Owner::new(),
        }
    }

    /// Initializes a lock into storage owned by the caller
    pub fn init(storage: &mut MaybeUninit<Lock>) -> Result<&mut Lock, SyncError> {
        Ok(storage.write(Lock::new()))
    }

    /// Allocates and initializes a lock
    pub fn create() -> Result<Box<Lock>, SyncError> {
        let mut storage = alloc::try_new_uninit::<Lock>()?;
        Lock::init(&mut storage)?;
        // SAFETY: initialized by `init` above
        Ok(unsafe { alloc::assume_init(storage) })
    }

    /// Releases the lock's storage. Fails with [`SyncError::Busy`] while the
    /// lock is held, handing the lock back.
    pub fn destroy(self: Box<Self>) -> Result<(), DestroyError<Box<Self>>> {
        if self.owner.is_held() {
            return Err(DestroyError {
                error: SyncError::Busy,
                handle: self,
            });
        }

        log::trace!(target: "synch", "Destroying lock {:p}", &*self);
        Ok(())
    }

    /// Blocks until the lock is acquired by the calling thread
    pub fn lock(&self) -> Result<(), SyncError> {
        if self.owner.is_current() {
            return Err(SyncError::WouldDeadlock);
        }

        std::mem::forget(self.inner.lock());
        self.owner.claim();
        Ok(())
    }

    /// Acquires the lock only if no thread currently holds it
    pub fn try_lock(&self) -> Result<(), SyncError> {
        if self.owner.is_current() {
            return Err(SyncError::WouldDeadlock);
        }

        let guard = self.inner.try_lock().ok_or(SyncError::Busy)?;
        std::mem::forget(guard);
        self.owner.claim();
        Ok(())
    }

    pub fn unlock(&self) -> Result<(), SyncError> {
        if !self.owner.is_current() {
            return Err(SyncError::NotOwner);
        }

        self.owner.release();
        // SAFETY: the calling thread holds the mutex
        unsafe { self.inner.force_unlock() };
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub(crate) fn is_held_by_current(&self) -> bool {
        self.owner.is_current()
    }

    /// Hands the calling thread's hold over to a condition variable wait,
    /// returning a guard that represents it. The wait releases and
    /// reacquires the mutex through the guard; [`Lock::reclaim`] restores
    /// ownership afterwards.
    ///
    /// # Safety
    /// The calling thread must hold the lock.
    pub(crate) unsafe fn surrender(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.owner.release();
        // SAFETY: the mutex is locked by the calling thread, per this function's contract
        unsafe { self.inner.make_guard_unchecked() }
    }

    pub(crate) fn reclaim(&self, guard: parking_lot::MutexGuard<'_, ()>) {
        std::mem::forget(guard);
        self.owner.claim();
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Lock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

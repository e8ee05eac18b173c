//! Shared/exclusive lock.
//!
//! Like [`Lock`](crate::lock::Lock), [`RwLock`] is guardless: a single
//! `unlock` releases whichever mode the caller took. The exclusive holder is
//! tracked by thread, shared holders only by count, so a shared unlock from
//! a thread that holds nothing cannot be told apart from a real one.
use std::fmt::{Debug, Formatter};
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::alloc;
use crate::error::{DestroyError, SyncError};
use crate::owner::Owner;

pub struct RwLock {
    inner: parking_lot::RwLock<()>,
    writer: Owner,
    readers: AtomicUsize,
}

impl RwLock {
    pub const fn new() -> Self {
        Self {
            inner: parking_lot::const_rwlock(()),
            writer: Owner::new(),
            readers: AtomicUsize::new(0),
        }
    }

    pub fn init(storage: &mut MaybeUninit<RwLock>) -> Result<&mut RwLock, SyncError> {
        Ok(storage.write(RwLock::new()))
    }

    pub fn create() -> Result<Box<RwLock>, SyncError> {
        let mut storage = alloc::try_new_uninit::<RwLock>()?;
        RwLock::init(&mut storage)?;
        // SAFETY: initialized by `init` above
        Ok(unsafe { alloc::assume_init(storage) })
    }

    /// Fails with [`SyncError::Busy`] while any holder remains
    pub fn destroy(self: Box<Self>) -> Result<(), DestroyError<Box<Self>>> {
        if self.writer.is_held() || self.readers.load(Ordering::Acquire) != 0 {
            return Err(DestroyError {
                error: SyncError::Busy,
                handle: self,
            });
        }

        log::trace!(target: "synch", "Destroying rwlock {:p}", &*self);
        Ok(())
    }

    /// Blocks while an exclusive holder is active. Shared holds are not
    /// recursive: a thread re-entering shared mode while a writer queues may
    /// deadlock.
    pub fn lock_shared(&self) -> Result<(), SyncError> {
        if self.writer.is_current() {
            return Err(SyncError::WouldDeadlock);
        }

        std::mem::forget(self.inner.read());
        self.readers.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn try_lock_shared(&self) -> Result<(), SyncError> {
        if self.writer.is_current() {
            return Err(SyncError::WouldDeadlock);
        }

        let guard = self.inner.try_read().ok_or(SyncError::Busy)?;
        std::mem::forget(guard);
        self.readers.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Blocks while any holder, shared or exclusive, is active
    pub fn lock_exclusive(&self) -> Result<(), SyncError> {
        if self.writer.is_current() {
            return Err(SyncError::WouldDeadlock);
        }

        std::mem::forget(self.inner.write());
        self.writer.claim();
        Ok(())
    }

    pub fn try_lock_exclusive(&self) -> Result<(), SyncError> {
        if self.writer.is_current() {
            return Err(SyncError::WouldDeadlock);
        }

        let guard = self.inner.try_write().ok_or(SyncError::Busy)?;
        std::mem::forget(guard);
        self.writer.claim();
        Ok(())
    }

    /// Releases the exclusive hold if the caller has it, otherwise one shared hold
    pub fn unlock(&self) -> Result<(), SyncError> {
        if self.writer.is_current() {
            self.writer.release();
            // SAFETY: the calling thread holds the write lock
            unsafe { self.inner.force_unlock_write() };
            return Ok(());
        }

        self.readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .map_err(|_| SyncError::NotOwner)?;
        // SAFETY: a shared hold was outstanding and has now been accounted for
        unsafe { self.inner.force_unlock_read() };
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn is_locked_exclusive(&self) -> bool {
        self.inner.is_locked_exclusive()
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for RwLock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwLock")
            .field("exclusive", &self.is_locked_exclusive())
            .field("readers", &self.readers.load(Ordering::Relaxed))
            .finish()
    }
}

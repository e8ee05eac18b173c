//! Condition variable bound to a [`Lock`] at wait time.
//!
//! Waits may return spuriously; always wait in a loop on the guarded
//! predicate. While a condition variable has waiters it is bound to their
//! [`Lock`]; a wait that passes a different lock meanwhile fails with
//! [`SyncError::Busy`].
use std::fmt::{Debug, Formatter};
use std::mem::MaybeUninit;
use std::time::{Duration, Instant};

use crate::alloc;
use crate::error::SyncError;
use crate::lock::Lock;

pub struct Condvar {
    inner: parking_lot::Condvar,
    binding: parking_lot::Mutex<Binding>,
}

/// The lock current waiters passed in, by address, and how many of them there are
struct Binding {
    lock: usize,
    waiters: usize,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            inner: parking_lot::Condvar::new(),
            binding: parking_lot::const_mutex(Binding { lock: 0, waiters: 0 }),
        }
    }

    pub fn init(storage: &mut MaybeUninit<Condvar>) -> Result<&mut Condvar, SyncError> {
        Ok(storage.write(Condvar::new()))
    }

    pub fn create() -> Result<Box<Condvar>, SyncError> {
        let mut storage = alloc::try_new_uninit::<Condvar>()?;
        Condvar::init(&mut storage)?;
        // SAFETY: initialized by `init` above
        Ok(unsafe { alloc::assume_init(storage) })
    }

    /// Waiters borrow the condition variable, so by the time the caller can
    /// give up ownership nobody is waiting on it.
    pub fn destroy(self: Box<Self>) {
        log::trace!(target: "synch", "Destroying condvar {:p}", &*self);
    }

    /// Releases `lock`, blocks until woken, then reacquires `lock`
    pub fn wait(&self, lock: &Lock) -> Result<(), SyncError> {
        if !lock.is_held_by_current() {
            return Err(SyncError::NotOwner);
        }

        self.enter(lock)?;
        // SAFETY: the calling thread holds `lock`
        let mut guard = unsafe { lock.surrender() };
        self.inner.wait(&mut guard);
        lock.reclaim(guard);
        self.leave();
        Ok(())
    }

    /// Like [`Condvar::wait`], but gives up with [`SyncError::TimedOut`] once
    /// `deadline` passes. `lock` is held again on return either way.
    pub fn timedwait(&self, lock: &Lock, deadline: Instant) -> Result<(), SyncError> {
        if !lock.is_held_by_current() {
            return Err(SyncError::NotOwner);
        }

        self.enter(lock)?;
        // SAFETY: the calling thread holds `lock`
        let mut guard = unsafe { lock.surrender() };
        let result = self.inner.wait_until(&mut guard, deadline);
        lock.reclaim(guard);
        self.leave();

        if result.timed_out() {
            Err(SyncError::TimedOut)
        } else {
            Ok(())
        }
    }

    pub fn timedwait_for(&self, lock: &Lock, timeout: Duration) -> Result<(), SyncError> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.timedwait(lock, deadline),
            None => self.wait(lock),
        }
    }

    /// Wakes one waiter. Returns whether a waiter was woken.
    pub fn signal(&self) -> bool {
        self.inner.notify_one()
    }

    /// Wakes every current waiter. Returns how many were woken.
    pub fn broadcast(&self) -> usize {
        self.inner.notify_all()
    }

    // The binding outlives parking_lot's own record of the waiters' mutex: a
    // waiter leaves only after it has been dequeued and woken.
    fn enter(&self, lock: &Lock) -> Result<(), SyncError> {
        let addr = lock as *const Lock as usize;
        let mut binding = self.binding.lock();
        if binding.waiters != 0 && binding.lock != addr {
            return Err(SyncError::Busy);
        }

        binding.lock = addr;
        binding.waiters += 1;
        Ok(())
    }

    fn leave(&self) {
        self.binding.lock().waiters -= 1;
    }

    #[cfg(test)]
    fn waiters(&self) -> usize {
        self.binding.lock().waiters
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Condvar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}

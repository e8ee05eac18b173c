use std::sync::atomic::{AtomicUsize, Ordering};

thread_local! {
    static TOKEN: u8 = const { 0 };
}

/// Marks "no owner"; never returned by [`current`]
pub(crate) const UNOWNED: usize = 0;

/// A non-zero value unique to the calling thread among all live threads
pub(crate) fn current() -> usize {
    TOKEN.with(|token| token as *const u8 as usize)
}

/// Records which thread holds a primitive. Only the holder ever stores its
/// own token, so a thread comparing against itself never races.
#[derive(Default)]
pub(crate) struct Owner(AtomicUsize);

impl Owner {
    pub(crate) const fn new() -> Self {
        Self(AtomicUsize::new(UNOWNED))
    }

    pub(crate) fn is_current(&self) -> bool {
        self.0.load(Ordering::Relaxed) == current()
    }

    pub(crate) fn is_held(&self) -> bool {
        self.0.load(Ordering::Relaxed) != UNOWNED
    }

    pub(crate) fn claim(&self) {
        self.0.store(current(), Ordering::Relaxed)
    }

    pub(crate) fn release(&self) {
        self.0.store(UNOWNED, Ordering::Relaxed)
    }
}

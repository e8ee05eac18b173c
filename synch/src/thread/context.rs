use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The identity of a [`Thread`](super::Thread), shared between the handle and
/// the body running on it
#[derive(Debug)]
pub struct ThreadInfo {
    name: String,
}

impl ThreadInfo {
    pub(crate) fn new(name: String) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// What a start routine receives: a reference back to its own thread's
/// identity and the argument supplied when the routine was bound.
///
/// The context belongs to the [`Thread`](super::Thread). The running body
/// only ever sees it through `&`, so the argument must be `Sync`.
pub struct ThreadContext<A> {
    thread: Arc<ThreadInfo>,
    arg: A,
}

impl<A> ThreadContext<A> {
    pub(crate) fn new(thread: Arc<ThreadInfo>, arg: A) -> Self {
        Self { thread, arg }
    }

    pub fn thread(&self) -> &ThreadInfo {
        &self.thread
    }

    pub fn name(&self) -> &str {
        self.thread.name()
    }

    pub fn arg(&self) -> &A {
        &self.arg
    }
}

impl<A: Debug> Debug for ThreadContext<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("thread", &self.thread.name())
            .field("arg", &self.arg)
            .finish()
    }
}

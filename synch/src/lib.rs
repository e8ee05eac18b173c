//! Handle-based synchronization primitives and managed threads.
//!
//! Every primitive here is an independently owned handle with explicit
//! construction and teardown:
//!
//! - [`Lock`]: exclusive lock with separate `lock`/`unlock` calls
//! - [`RwLock`]: shared/exclusive lock with a single mode-agnostic `unlock`
//! - [`Condvar`]: condition variable that takes its [`Lock`] at wait time
//! - [`Thread`]: one OS thread per handle, started once and joined once,
//!   owning its name and [`ThreadContext`]
//!
//! Each primitive is backed by `parking_lot`. Failures come back as
//! [`SyncError`], whose [`code`](SyncError::code) gives the matching errno
//! value for callers that speak pthread status codes.
#![deny(unsafe_op_in_unsafe_fn)]

pub(crate) mod alloc;
pub mod condvar;
pub mod error;
pub mod lock;
pub(crate) mod owner;
pub mod rwlock;
pub mod thread;

pub use condvar::Condvar;
pub use error::{DestroyError, SyncError};
pub use lock::Lock;
pub use rwlock::RwLock;
pub use thread::{StartRoutine, Thread, ThreadConfig, ThreadContext, ThreadInfo, ThreadStatus};

#[cfg(feature = "deadlock-detection")]
pub use parking_lot::deadlock;

use std::fmt::{Debug, Display, Formatter};

/// The error type shared by every primitive in this crate
#[derive(Debug)]
pub enum SyncError {
    /// Storage for a handle, or for a thread name, could not be allocated
    AllocationFailed,
    /// The primitive is held, so it can neither be destroyed nor taken without blocking
    Busy,
    /// The calling thread already holds the lock it is trying to take
    WouldDeadlock,
    /// The calling thread does not hold the lock it is releasing or waiting with
    NotOwner,
    /// A bounded wait reached its deadline before being woken
    TimedOut,
    /// Thread names are handed to the OS and may not contain NUL bytes
    InvalidName,
    /// `start` was called on a thread that has no start routine bound
    NoStartRoutine,
    /// A start routine was bound at construction, so `start_with` may not bind another
    RoutineAlreadyBound,
    /// The thread has already been started
    AlreadyStarted,
    /// The thread was never started, so there is nothing to join
    NotStarted,
    /// The thread has already been joined
    AlreadyJoined,
    /// The OS refused to spawn the thread
    Spawn(std::io::Error),
    /// The start routine panicked; carries the panic message when it had one
    Panicked(String),
}

impl SyncError {
    /// The errno-style status a pthread-based caller would have seen for this error
    pub fn code(&self) -> i32 {
        match self {
            SyncError::AllocationFailed => libc::ENOMEM,
            SyncError::Busy => libc::EBUSY,
            SyncError::WouldDeadlock => libc::EDEADLK,
            SyncError::NotOwner => libc::EPERM,
            SyncError::TimedOut => libc::ETIMEDOUT,
            SyncError::InvalidName
            | SyncError::NoStartRoutine
            | SyncError::RoutineAlreadyBound
            | SyncError::AlreadyStarted
            | SyncError::AlreadyJoined => libc::EINVAL,
            SyncError::NotStarted => libc::ESRCH,
            SyncError::Spawn(err) => err.raw_os_error().unwrap_or(libc::EAGAIN),
            SyncError::Panicked(_) => libc::ECANCELED,
        }
    }

    /// Whether a bounded wait gave up at its deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, SyncError::TimedOut)
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::AllocationFailed => write!(f, "Unable to allocate storage"),
            SyncError::Busy => write!(f, "Primitive is busy"),
            SyncError::WouldDeadlock => write!(f, "Lock is already held by the calling thread"),
            SyncError::NotOwner => write!(f, "Lock is not held by the calling thread"),
            SyncError::TimedOut => write!(f, "Timed out"),
            SyncError::InvalidName => write!(f, "Thread name contains a NUL byte"),
            SyncError::NoStartRoutine => write!(f, "No start routine is bound to the thread"),
            SyncError::RoutineAlreadyBound => {
                write!(f, "A start routine is already bound to the thread")
            }
            SyncError::AlreadyStarted => write!(f, "Thread already started"),
            SyncError::NotStarted => write!(f, "Thread was never started"),
            SyncError::AlreadyJoined => write!(f, "Thread already joined"),
            SyncError::Spawn(err) => write!(f, "Unable to spawn thread: {err}"),
            SyncError::Panicked(msg) => write!(f, "Thread panicked: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::collections::TryReserveError> for SyncError {
    fn from(_: std::collections::TryReserveError) -> Self {
        SyncError::AllocationFailed
    }
}

/// Returned by `destroy` when the primitive cannot be torn down yet. The
/// handle is given back untouched so the caller may retry.
pub struct DestroyError<H> {
    pub error: SyncError,
    pub handle: H,
}

impl<H> DestroyError<H> {
    pub fn into_inner(self) -> H {
        self.handle
    }
}

impl<H> Debug for DestroyError<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestroyError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<H> Display for DestroyError<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unable to destroy: {}", self.error)
    }
}

impl<H> std::error::Error for DestroyError<H> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<H> From<DestroyError<H>> for SyncError {
    fn from(err: DestroyError<H>) -> Self {
        err.error
    }
}

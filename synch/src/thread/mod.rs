//! Managed OS threads.
//!
//! A [`Thread`] owns its name, its start-up [`ThreadContext`] and the OS
//! thread it eventually runs on. It moves through
//!
//! ```text
//!   Unstarted ──start──> Running ──wait──> Joined
//!       │                                    │
//!       └──────────── destroy ───────────────┘
//! ```
//!
//! A start routine is bound either at construction ([`Thread::create_with`],
//! [`Thread::create_and_start`]) or when starting ([`Thread::start_with`]),
//! never both. The routine's `i32` comes back unchanged through
//! [`Thread::wait`].
use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::alloc;
use crate::error::SyncError;

mod context;

pub use context::{ThreadContext, ThreadInfo};

/// The body of a thread
pub type StartRoutine<A> = Box<dyn FnOnce(&ThreadContext<A>) -> i32 + Send + 'static>;

type RoutineSlot<A> = parking_lot::Mutex<Option<StartRoutine<A>>>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ThreadStatus {
    Unstarted,
    Running,
    Joined,
}

/// Spawn-time settings, applied with [`Thread::configure`] before starting
#[derive(Debug, Clone, Default)]
pub struct ThreadConfig {
    /// Stack size in bytes for the OS thread. `None` uses the platform default
    /// (which honors `RUST_MIN_STACK`).
    pub stack_size: Option<usize>,
}

enum State {
    Unstarted,
    Running(JoinHandle<i32>),
    Joined,
}

pub struct Thread<A = ()> {
    info: Arc<ThreadInfo>,
    routine: Option<StartRoutine<A>>,
    // present whenever a routine has been bound
    context: Option<Arc<ThreadContext<A>>>,
    state: State,
    config: ThreadConfig,
}

impl<A: Send + Sync + 'static> Thread<A> {
    /// Creates an unstarted thread with no start routine bound
    pub fn create(name: &str) -> Result<Self, SyncError> {
        if name.contains('\0') {
            return Err(SyncError::InvalidName);
        }

        let name = alloc::try_copy_str(name)?;
        Ok(Self {
            info: Arc::new(ThreadInfo::new(name)),
            routine: None,
            context: None,
            state: State::Unstarted,
            config: ThreadConfig::default(),
        })
    }

    /// Creates an unstarted thread with `start_fn` and its argument bound
    pub fn create_with<F>(name: &str, start_fn: F, arg: A) -> Result<Self, SyncError>
    where
        F: FnOnce(&ThreadContext<A>) -> i32 + Send + 'static,
    {
        let mut this = Self::create(name)?;
        this.bind(Box::new(start_fn), arg);
        Ok(this)
    }

    /// Creates and immediately starts a thread. If spawning fails the
    /// half-built thread is dropped and only the error is returned.
    pub fn create_and_start<F>(name: &str, start_fn: F, arg: A) -> Result<Self, SyncError>
    where
        F: FnOnce(&ThreadContext<A>) -> i32 + Send + 'static,
    {
        Self::create_and_start_with_config(name, ThreadConfig::default(), start_fn, arg)
    }

    /// [`Thread::create_and_start`] with spawn settings applied first
    pub fn create_and_start_with_config<F>(
        name: &str,
        config: ThreadConfig,
        start_fn: F,
        arg: A,
    ) -> Result<Self, SyncError>
    where
        F: FnOnce(&ThreadContext<A>) -> i32 + Send + 'static,
    {
        let mut this = Self::create_with(name, start_fn, arg)?;
        this.configure(config)?;
        this.start()?;
        Ok(this)
    }

    /// Spawns the OS thread running the routine bound at construction
    pub fn start(&mut self) -> Result<(), SyncError> {
        if !matches!(self.state, State::Unstarted) {
            return Err(SyncError::AlreadyStarted);
        }

        let (Some(context), Some(routine)) = (self.context.clone(), self.routine.take()) else {
            return Err(SyncError::NoStartRoutine);
        };

        let mut builder = std::thread::Builder::new().name(self.info.name().to_string());
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        // a rejected spawn drops its closure, so the routine travels in a
        // slot we keep a handle to and can take back
        let slot = Arc::new(parking_lot::Mutex::new(Some(routine)));
        let handoff = slot.clone();
        let handle = match builder.spawn(move || trampoline(handoff, context)) {
            Ok(handle) => handle,
            Err(err) => {
                self.routine = slot.lock().take();
                log::trace!(target: "synch", "Unable to spawn thread {}: {}", self.info.name(), err);
                return Err(SyncError::Spawn(err));
            }
        };

        log::trace!(target: "synch", "Started thread {}", self.info.name());
        self.state = State::Running(handle);
        Ok(())
    }

    /// Binds `start_fn` and its argument, then spawns
    pub fn start_with<F>(&mut self, start_fn: F, arg: A) -> Result<(), SyncError>
    where
        F: FnOnce(&ThreadContext<A>) -> i32 + Send + 'static,
    {
        if !matches!(self.state, State::Unstarted) {
            return Err(SyncError::AlreadyStarted);
        }

        if self.context.is_some() {
            return Err(SyncError::RoutineAlreadyBound);
        }

        self.bind(Box::new(start_fn), arg);
        self.start()
    }

    fn bind(&mut self, routine: StartRoutine<A>, arg: A) {
        self.context = Some(Arc::new(ThreadContext::new(self.info.clone(), arg)));
        self.routine = Some(routine);
    }
}

impl<A> Thread<A> {
    /// Blocks until the thread terminates and returns what its start routine
    /// returned. A thread can be joined once.
    pub fn wait(&mut self) -> Result<i32, SyncError> {
        match std::mem::replace(&mut self.state, State::Joined) {
            State::Running(handle) => {
                let result = handle
                    .join()
                    .map_err(|payload| SyncError::Panicked(panic_message(payload.as_ref())));
                log::trace!(target: "synch", "Joined thread {}: {:?}", self.info.name(), result);
                result
            }

            State::Unstarted => {
                self.state = State::Unstarted;
                Err(SyncError::NotStarted)
            }

            State::Joined => Err(SyncError::AlreadyJoined),
        }
    }

    /// Releases the thread's name and context. Does not join: a thread that
    /// is still running is detached.
    pub fn destroy(self) {
        drop(self)
    }

    /// Replaces the spawn settings. Only possible before the thread starts.
    pub fn configure(&mut self, config: ThreadConfig) -> Result<(), SyncError> {
        if !matches!(self.state, State::Unstarted) {
            return Err(SyncError::AlreadyStarted);
        }

        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &ThreadConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn info(&self) -> &ThreadInfo {
        &self.info
    }

    pub fn context(&self) -> Option<&ThreadContext<A>> {
        self.context.as_deref()
    }

    pub fn status(&self) -> ThreadStatus {
        match self.state {
            State::Unstarted => ThreadStatus::Unstarted,
            State::Running(_) => ThreadStatus::Running,
            State::Joined => ThreadStatus::Joined,
        }
    }

    /// Whether a started thread has run to completion; `wait` won't block
    pub fn is_finished(&self) -> bool {
        match &self.state {
            State::Running(handle) => handle.is_finished(),
            State::Joined => true,
            State::Unstarted => false,
        }
    }
}

impl<A> Drop for Thread<A> {
    fn drop(&mut self) {
        if let State::Running(handle) = &self.state {
            if !handle.is_finished() {
                log::warn!(
                    target: "synch",
                    "Thread {} destroyed while running; detaching",
                    self.info.name()
                );
            }
        }

        log::trace!(target: "synch", "Destroying thread {}", self.info.name());
    }
}

impl<A> Debug for Thread<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.info.name())
            .field("status", &self.status())
            .field("bound", &self.context.is_some())
            .finish()
    }
}

/// Entry point of every spawned thread. Only a successful spawn reaches
/// here, and nothing else takes from the slot after that.
fn trampoline<A>(slot: Arc<RoutineSlot<A>>, context: Arc<ThreadContext<A>>) -> i32 {
    let Some(routine) = slot.lock().take() else {
        unreachable!("start routine of thread {} taken twice", context.name())
    };
    drop(slot);

    log::trace!(target: "synch", "Thread {} entering start routine", context.name());
    let code = routine(&*context);
    log::trace!(target: "synch", "Thread {} returned {}", context.name(), code);
    code
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{Thread, ThreadConfig, ThreadStatus};
    use crate::error::SyncError;
    use rstest::rstest;
    use std::sync::mpsc;
    use std::sync::Arc;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(2)]
    #[case(-1)]
    #[case(-42)]
    #[case(i32::MIN)]
    #[case(i32::MAX)]
    fn result_round_trips(#[case] code: i32) {
        synch_logging::setup_log_no_panic_hook();

        let mut started = Thread::create_and_start("round-trip", move |_| code, ()).unwrap();
        assert_eq!(started.wait().unwrap(), code);

        let mut bound = Thread::create_with("bound", |ctx| *ctx.arg(), code).unwrap();
        assert_eq!(bound.status(), ThreadStatus::Unstarted);
        bound.start().unwrap();
        assert_eq!(bound.wait().unwrap(), code);

        let mut late = Thread::<i32>::create("late").unwrap();
        late.start_with(|ctx| ctx.arg().wrapping_neg(), code).unwrap();
        assert_eq!(late.wait().unwrap(), code.wrapping_neg());
        assert_eq!(late.status(), ThreadStatus::Joined);
    }

    #[test]
    fn body_sees_its_own_thread() {
        synch_logging::setup_log_no_panic_hook();
        let mut thread = Thread::create_and_start(
            "introspect",
            |ctx| {
                let os_name = std::thread::current().name().map(str::to_string);
                (ctx.name() == "introspect" && os_name.as_deref() == Some(ctx.thread().name()))
                    as i32
            },
            (),
        )
        .unwrap();

        assert_eq!(thread.name(), "introspect");
        assert_eq!(thread.wait().unwrap(), 1);
        assert_eq!(thread.context().unwrap().name(), "introspect");
    }

    #[test]
    fn invalid_name_never_yields_a_handle() {
        assert!(matches!(
            Thread::create_and_start("bad\0name", |_| 0, ()),
            Err(SyncError::InvalidName)
        ));
        assert!(matches!(
            Thread::<()>::create("bad\0name"),
            Err(SyncError::InvalidName)
        ));
    }

    #[test]
    fn join_misuse_is_reported() {
        let mut thread = Thread::create_with("joiner", |_| 7, ()).unwrap();
        assert!(matches!(thread.wait(), Err(SyncError::NotStarted)));
        assert_eq!(thread.status(), ThreadStatus::Unstarted);
        assert!(!thread.is_finished());

        thread.start().unwrap();
        assert_eq!(thread.wait().unwrap(), 7);
        assert!(thread.is_finished());
        assert!(matches!(thread.wait(), Err(SyncError::AlreadyJoined)));
    }

    #[test]
    fn start_misuse_is_reported() {
        let mut empty = Thread::<()>::create("empty").unwrap();
        assert!(matches!(empty.start(), Err(SyncError::NoStartRoutine)));
        assert!(empty.context().is_none());

        let mut bound = Thread::create_with("bound", |_| 0, ()).unwrap();
        assert!(matches!(
            bound.start_with(|_| 1, ()),
            Err(SyncError::RoutineAlreadyBound)
        ));
        bound.start().unwrap();
        assert!(matches!(bound.start(), Err(SyncError::AlreadyStarted)));
        assert!(matches!(
            bound.start_with(|_| 1, ()),
            Err(SyncError::AlreadyStarted)
        ));
        assert_eq!(bound.wait().unwrap(), 0);
    }

    #[test]
    fn panics_surface_through_wait() {
        synch_logging::setup_log_no_panic_hook();
        let mut thread =
            Thread::create_and_start("panicker", |_| -> i32 { panic!("boom") }, ()).unwrap();

        match thread.wait() {
            Err(SyncError::Panicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    // larger than any 64-bit user address space, whatever the overcommit policy
    #[cfg(target_pointer_width = "64")]
    const UNSPAWNABLE_STACK: usize = 1 << 62;

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn failed_spawn_can_be_retried() {
        synch_logging::setup_log_no_panic_hook();
        let mut thread = Thread::create_with("retry", |ctx| *ctx.arg(), 11).unwrap();
        thread
            .configure(ThreadConfig {
                stack_size: Some(UNSPAWNABLE_STACK),
            })
            .unwrap();

        match thread.start() {
            Err(err @ SyncError::Spawn(_)) => assert_ne!(err.code(), 0),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(thread.status(), ThreadStatus::Unstarted);
        assert!(thread.context().is_some());
        assert!(matches!(thread.wait(), Err(SyncError::NotStarted)));

        thread.configure(ThreadConfig::default()).unwrap();
        thread.start().unwrap();
        assert_eq!(thread.wait().unwrap(), 11);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn failed_spawn_never_yields_a_handle() {
        synch_logging::setup_log_no_panic_hook();
        let arg = Arc::new(());
        let result = Thread::create_and_start_with_config(
            "unspawnable",
            ThreadConfig {
                stack_size: Some(UNSPAWNABLE_STACK),
            },
            |_| 0,
            arg.clone(),
        );

        match result {
            Err(err @ SyncError::Spawn(_)) => assert_ne!(err.code(), 0),
            other => panic!("unexpected result: {other:?}"),
        }
        // neither the handle nor its context survived
        assert_eq!(Arc::strong_count(&arg), 1);
    }

    #[test]
    fn configure_before_start_only() {
        let mut thread = Thread::create_with("configured", |_| 3, ()).unwrap();
        thread
            .configure(ThreadConfig {
                stack_size: Some(256 * 1024),
            })
            .unwrap();
        assert_eq!(thread.config().stack_size, Some(256 * 1024));

        thread.start().unwrap();
        assert!(matches!(
            thread.configure(ThreadConfig::default()),
            Err(SyncError::AlreadyStarted)
        ));
        assert_eq!(thread.wait().unwrap(), 3);
    }

    #[test]
    fn destroy_releases_the_context() {
        let arg = Arc::new(());
        let mut thread = Thread::create_with(
            "owner",
            |ctx| Arc::strong_count(ctx.arg()) as i32,
            arg.clone(),
        )
        .unwrap();
        assert_eq!(Arc::strong_count(&arg), 2);
        thread.start().unwrap();
        assert_eq!(thread.wait().unwrap(), 2);
        thread.destroy();
        assert_eq!(Arc::strong_count(&arg), 1);

        Thread::<()>::create("never-started").unwrap().destroy();
    }

    #[test]
    fn destroy_detaches_a_running_thread() {
        synch_logging::setup_log_no_panic_hook();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<String>();

        let thread = Thread::create_and_start(
            "detached",
            move |ctx| {
                go_rx.recv().unwrap();
                done_tx.send(ctx.name().to_string()).unwrap();
                0
            },
            (),
        )
        .unwrap();

        thread.destroy();
        go_tx.send(()).unwrap();
        assert_eq!(done_rx.recv().unwrap(), "detached");
    }
}

//! Log setup shared by the `synch` crates and their tests.
//!
//! The library crates emit records through the `log` facade under the
//! `"synch"` target; the subscriber installed here picks those up through
//! `tracing-subscriber`'s log bridge and filters them with `RUST_LOG`.
pub use tracing::{self, debug, error, info, instrument, trace, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Sets up the logging for any crate
pub fn setup_log() {
    std::panic::set_hook(Box::new(|info| {
        error!(target: "synch", "Panic occurred: {}", info);
        std::process::exit(1);
    }));

    setup_log_no_panic_hook()
}

/// Same as [`setup_log`], but leaves the default panic hook alone. Tests that
/// expect a spawned thread to panic must use this variant.
pub fn setup_log_no_panic_hook() {
    let _ = SubscriberBuilder::default()
        .with_line_number(true)
        .with_file(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::NONE)
        .with_env_filter(EnvFilter::from_default_env())
        .finish()
        .try_init();
}

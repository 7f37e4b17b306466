//! Process-wide verbosity flag.
//!
//! Toggled by the command-line glue. It only gates extra diagnostic
//! events emitted through [`verbose!`](crate::verbose!); request handling
//! never depends on it.

use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Emits an `info` event only while verbose mode is on.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)+) => {
        if $crate::verbose::is_verbose() {
            ::tracing::info!($($arg)+);
        }
    };
}

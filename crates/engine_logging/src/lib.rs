#![deny(missing_docs)]
//! Shared logging utilities for the transcript workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every macro accepts
//! an optional `job = <id>;` prefix that tags the line with the job it
//! belongs to, so interleaved worker output stays attributable.

#[doc(hidden)]
pub use log as __log;

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::__log::trace!("[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::__log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::__log::info!("[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::__log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::__log::debug!("[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::__log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::__log::warn!("[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::__log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    (job = $job:expr; $($arg:tt)*) => {{
        $crate::__log::error!("[job {}] {}", $job, format_args!($($arg)*));
    }};
    ($($arg:tt)*) => {{
        $crate::__log::error!($($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Worker threads log concurrently; keep the thread id visible.
    let config = ConfigBuilder::new()
        .set_thread_level(log::LevelFilter::Debug)
        .build();

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

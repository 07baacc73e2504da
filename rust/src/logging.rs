//! Logging macros for the scheduler with verbosity level control.
//!
//! Events go through `tracing`; the verbosity level decides which of them are
//! emitted at all, so a silent run skips formatting entirely.
//! - 0: SILENT (only warnings and errors)
//! - 1: CHANGES (status transitions, run start/finish)
//! - 2: CHECKS (ready-set and dispatch decisions)
//! - 3: DEBUG (full algorithm internals)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1).
///
/// Used for: status transitions, run summaries.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            ::tracing::info!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
///
/// Used for: dispatch decisions, operations becoming ready.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            ::tracing::debug!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
///
/// Used for: completion channel traffic, queue internals.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            ::tracing::trace!($($arg)*);
        }
    };
}

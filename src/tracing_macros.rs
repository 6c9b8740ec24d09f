//! Logging shims that compile to nothing when the `tracing` feature is disabled.

/// Emit a trace-level event.
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!($($arg)*);
    };
}

/// Emit a debug-level event.
macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
    };
}

pub(crate) use debug;
pub(crate) use trace;

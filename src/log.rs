//! Logging facade.
//!
//! The macros forward to [`defmt`] when the `defmt` feature is enabled and
//! expand to nothing that survives optimization otherwise.

// The declarative macros are required because the defmt macros expect defmt to be in scope.

/// Logs a message at the trace level.
#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)*) => {{
        defmt::trace!($($arg)*);
    }};
}

/// Logs a message at the debug level.
#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)*) => {{
        defmt::debug!($($arg)*);
    }};
}

/// Logs a message at the info level.
#[cfg(feature = "defmt")]
macro_rules! info {
    ($($arg:tt)*) => {{
        defmt::info!($($arg)*);
    }};
}

/// Logs a message at the warn level.
#[cfg(feature = "defmt")]
macro_rules! warn_ {
    ($($arg:tt)*) => {{
        defmt::warn!($($arg)*);
    }};
}

/// No-op log macro.
#[cfg(not(feature = "defmt"))]
macro_rules! trace {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

/// No-op log macro.
#[cfg(not(feature = "defmt"))]
macro_rules! debug {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

/// No-op log macro.
#[cfg(not(feature = "defmt"))]
macro_rules! info {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

/// No-op log macro.
#[cfg(not(feature = "defmt"))]
macro_rules! warn_ {
    ($($arg:tt)*) => {{
        let _ = ($($arg)*);
    }};
}

pub(crate) use {debug, info, trace, warn_ as warn};

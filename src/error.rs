//! Error types for the Argent specialization core
//!
//! Two classes of failure exist and they are deliberately kept apart:
//!
//! - Recoverable embedder mistakes (appending to a sealed log, interning a
//!   malformed callsite) surface as [`Error`] values.
//! - Internal invariant violations (popping an empty simulation stack, a
//!   probe distance overflowing during insertion) are not recoverable and go
//!   through the [`oops!`](crate::error::oops) abort channel, which logs a
//!   diagnostic and terminates.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Argent core
#[derive(Error, Debug)]
pub enum Error {
    /// The profile log has been sealed; no further events may be recorded
    #[error("profile log is sealed; no further events may be recorded")]
    LogSealed,

    /// A callsite descriptor was structurally invalid
    #[error("malformed callsite: {0}")]
    MalformedCallsite(String),
}

/// Aborts on a fatal internal invariant violation.
///
/// Logs the diagnostic at error level before panicking so that it reaches
/// whatever sink the embedder wired up, even when panics are reported
/// elsewhere.
macro_rules! oops {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        panic!($($arg)*);
    }};
}
pub(crate) use oops;

//! Error types for stepline
//!
//! All setup failures are detected synchronously, before a statement ever
//! reaches the scheduler; nothing in this crate reports an error through an
//! asynchronous path.

use thiserror::Error;

/// Result type alias for stepline operations
pub type Result<T> = std::result::Result<T, SqlError>;

/// Errors surfaced by connection and statement setup.
///
/// Once a statement is executing, the native engine's terminal statuses are
/// treated as completion, not failure; see the `stepper` module docs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// The native connection could not be opened. Carries the engine's
    /// own error message.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Operation attempted on empty SQL text or on a closed/unavailable
    /// handle.
    #[error("connection closed or unavailable: {0}")]
    Closed(String),

    /// Native statement preparation failed. Carries the engine's own
    /// error message.
    #[error("failed to prepare statement: {0}")]
    Prepare(String),

    /// Preparation reported success but produced no statement (for
    /// example, input that is only an SQL comment), or another state
    /// that should be unreachable.
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid scheduler configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

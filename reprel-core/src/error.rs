//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
///
/// Fallible functions return [`anyhow::Result`]; errors raised by the library itself
/// are values of this enum and can be recovered with `err.downcast_ref::<HrlError>()`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HrlError {
    /// Invalid setup, e.g., mismatched observation or action dimensions.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Sampling from a replay buffer holding fewer transitions than requested.
    #[error("Insufficient data in replay buffer of {operator}: requested {requested}, available {available}")]
    InsufficientData {
        /// Name of the operator owning the buffer, empty when unknown.
        operator: String,

        /// Requested batch size.
        requested: usize,

        /// Number of transitions in the buffer.
        available: usize,
    },

    /// Error raised by an environment during a step or reset.
    #[error("Environment error: {0}")]
    Environment(String),

    /// Lookup of an operator identifier that is not in the operator bank.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Malformed or incompatible snapshot.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}

//! Error types for entity-locker.

use thiserror::Error;

/// Smallest escalation threshold a locker accepts.
pub const MIN_ESCALATION_THRESHOLD: usize = 2;

/// Locker error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Escalation threshold below [`MIN_ESCALATION_THRESHOLD`].
    #[error("Lock escalation threshold is too small: {threshold} (minimum is {minimum})")]
    InvalidThreshold {
        /// Rejected threshold.
        threshold: usize,
        /// Smallest accepted threshold.
        minimum: usize,
    },

    /// Configuration could not be loaded or extracted.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for locker operations.
pub type Result<T> = std::result::Result<T, Error>;

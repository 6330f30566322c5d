//! Error types for ledger-core

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger error types
///
/// The first four variants are tool-level failures: their `Display` text is
/// what a caller sees in a `{success: false, error}` reply, so it is written
/// for a human rather than a log.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{label} not found: \"{query}\".\nAvailable:\n{available}")]
    AccountNotFound {
        /// "Account" or "Card", depending on what the caller asked for
        label: &'static str,
        query: String,
        available: String,
    },

    #[error("{0}")]
    MissingArgument(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("Invalid ledger snapshot: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

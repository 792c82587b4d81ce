//! # AppError
//!
//! Centralized error handling for the AutoSync core.
//! Maps synchronization and storage failures to actionable error types.

use thiserror::Error;

/// The primary error type for all as-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Rejected input (e.g., empty text body, empty filename, empty payload).
    /// No state is mutated when this is returned.
    #[error("validation error: {0}")]
    Validation(String),

    /// A blob could not be written (e.g., disk full, permission denied).
    /// No ledger entry is appended when this is returned.
    #[error("storage write failed: {0}")]
    StorageWrite(String),

    /// The requested stored file does not resolve to an existing blob.
    #[error("{0} not found")]
    NotFound(String),

    /// A streaming download failed mid-transfer.
    #[error("transfer aborted: {0}")]
    Transfer(String),

    /// The engine has been torn down and accepts no further writes.
    #[error("service is shutting down")]
    ShuttingDown,

    /// Infrastructure failure that fits none of the above.
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

/// A specialized Result type for AutoSync logic.
pub type Result<T> = std::result::Result<T, AppError>;

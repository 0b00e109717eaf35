//! Reconciliation error types.

use thiserror::Error;

/// Result type alias using `ReconcileError`.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors raised by the reconciliation engine and destination tables.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The destination schema could not be read.
    #[error("Schema discovery failed: {message}")]
    SchemaDiscovery { message: String },

    /// The destination table lacks a column the diff depends on.
    #[error("Destination table is missing key columns: {}", columns.join(", "))]
    MissingKeyColumns { columns: Vec<String> },

    /// New rows carry columns the destination table does not have.
    #[error("Rows contain columns unknown to the destination table: {}", columns.join(", "))]
    UnknownColumns { columns: Vec<String> },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReconcileError {
    /// Create a schema discovery error.
    pub fn schema_discovery(message: impl Into<String>) -> Self {
        Self::SchemaDiscovery {
            message: message.into(),
        }
    }
}

//! Error types for the ordersync run.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the run orchestrator and its artifact writers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connector error: {0}")]
    Connector(#[from] ordersync_connector::ConnectorError),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Report failed: {0}")]
    Report(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! Error types for the order API connector.

use thiserror::Error;

/// Result type alias using `ConnectorError`.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Errors that can occur when talking to the order management API.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential acquisition or refresh failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The API answered with a non-success status.
    #[error("API error: HTTP {status} - {message}")]
    Api { status: u16, message: String },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl ConnectorError {
    /// Create an API error from a status and response body.
    pub fn api(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::Api {
            status: status.as_u16(),
            message: body.into(),
        }
    }

    /// True if this is a credential failure, which aborts the whole run.
    #[must_use]
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

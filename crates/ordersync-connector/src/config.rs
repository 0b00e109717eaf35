//! Connector configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ConnectorError, ConnectorResult};

/// Order statuses queried for each market, in query order.
pub const DEFAULT_STATUSES: &[&str] = &[
    "APPROVED",
    "PROCESSING",
    "SUBMITTED",
    "PENDING",
    "PENDING_PAYMENT",
    "PENDING_APPROVAL",
    "FAILED",
    "REMOVED",
    "INCOMPLETE",
];

/// Login credentials for the order management API.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub username: String,
    pub password: SecretString,
}

impl ApiCredentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Configuration for the order API connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the API, e.g. `https://host/ccadmin/v1`.
    pub base_url: String,
    /// Order statuses queried per market.
    #[serde(default = "default_statuses")]
    pub statuses: Vec<String>,
    /// Page size for order searches.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    /// Pages fetched per status; 1 issues a single limited query.
    #[serde(default = "default_max_pages")]
    pub max_pages_per_status: u32,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Refresh the access token this many seconds before it expires.
    #[serde(default = "default_token_grace_secs")]
    pub token_grace_secs: i64,
    /// Version tag stamped on every produced row.
    #[serde(default = "default_source_version")]
    pub source_version: String,
    /// Log enrichment progress every N orders.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

fn default_statuses() -> Vec<String> {
    DEFAULT_STATUSES.iter().map(|s| (*s).to_string()).collect()
}

fn default_search_limit() -> u32 {
    250
}

fn default_max_pages() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_token_grace_secs() -> i64 {
    60
}

fn default_source_version() -> String {
    "Pipeline_V3".to_string()
}

fn default_progress_interval() -> usize {
    50
}

impl ApiConfig {
    /// Creates a configuration with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            statuses: default_statuses(),
            search_limit: default_search_limit(),
            max_pages_per_status: default_max_pages(),
            timeout_secs: default_timeout_secs(),
            token_grace_secs: default_token_grace_secs(),
            source_version: default_source_version(),
            progress_interval: default_progress_interval(),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is malformed or a limit is zero.
    pub fn validate(&self) -> ConnectorResult<()> {
        self.parsed_base_url()?;
        if self.statuses.is_empty() {
            return Err(ConnectorError::Config(
                "at least one order status is required".to_string(),
            ));
        }
        if self.search_limit == 0 {
            return Err(ConnectorError::Config(
                "search_limit must be greater than 0".to_string(),
            ));
        }
        if self.max_pages_per_status == 0 {
            return Err(ConnectorError::Config(
                "max_pages_per_status must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses the base URL.
    pub(crate) fn parsed_base_url(&self) -> ConnectorResult<Url> {
        let url = Url::parse(&self.base_url)?;
        if url.cannot_be_a_base() {
            return Err(ConnectorError::Config(format!(
                "base URL cannot be used as a base: {}",
                self.base_url
            )));
        }
        Ok(url)
    }
}

//! Password-grant authentication for the order management API.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use url::Url;

use crate::{ApiConfig, ApiCredentials, ConnectorError, ConnectorResult};

/// Supplies bearer credentials to API calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns a valid access token, refreshing it if needed.
    async fn get(&self) -> ConnectorResult<String>;

    /// Discards any cached token and acquires a new one.
    async fn force_refresh(&self) -> ConnectorResult<String>;
}

/// Token response from the login endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// Cached access token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true if the token is expired or will expire within the grace period.
    fn is_expired(&self, grace_period: Duration) -> bool {
        Utc::now() + grace_period >= self.expires_at
    }
}

/// Token cache for the order API.
#[derive(Debug)]
pub struct TokenCache {
    credentials: ApiCredentials,
    login_url: Url,
    http_client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// Grace period before expiry to trigger refresh (default: 60 seconds).
    grace_period: Duration,
}

impl TokenCache {
    /// Creates a new token cache whose login requests use the configured
    /// API timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL in `config` is invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: &ApiConfig, credentials: ApiCredentials) -> ConnectorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConnectorError::Config(format!("Failed to create HTTP client: {e}")))?;
        Self::with_client(config, credentials, http_client)
    }

    /// Creates a token cache that shares an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL in `config` is invalid.
    pub fn with_client(
        config: &ApiConfig,
        credentials: ApiCredentials,
        http_client: reqwest::Client,
    ) -> ConnectorResult<Self> {
        let mut login_url = config.parsed_base_url()?;
        login_url
            .path_segments_mut()
            .map_err(|()| ConnectorError::Config("invalid base URL".to_string()))?
            .pop_if_empty()
            .push("login")
            .push("");

        Ok(Self {
            credentials,
            login_url,
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            grace_period: Duration::seconds(config.token_grace_secs),
        })
    }

    /// Acquires a new access token using the password grant.
    #[instrument(skip(self), fields(username = %self.credentials.username))]
    async fn acquire_token(&self) -> ConnectorResult<CachedToken> {
        use secrecy::ExposeSecret;

        let params = [
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.expose_secret()),
        ];

        let response = self
            .http_client
            .post(self.login_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| ConnectorError::Auth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Auth(format!(
                "Token request failed with status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::Auth(format!("Failed to parse token response: {}", e)))?;

        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

        debug!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    async fn refresh(&self) -> ConnectorResult<String> {
        let new_token = self.acquire_token().await?;
        let access_token = new_token.access_token.clone();
        *self.cached_token.write().await = Some(new_token);
        Ok(access_token)
    }

    /// Invalidates the cached token, forcing a refresh on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}

#[async_trait]
impl CredentialProvider for TokenCache {
    #[instrument(skip(self))]
    async fn get(&self) -> ConnectorResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.grace_period) {
                    debug!("Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Refreshing access token");
        self.refresh().await
    }

    #[instrument(skip(self))]
    async fn force_refresh(&self) -> ConnectorResult<String> {
        self.invalidate().await;
        self.refresh().await
    }
}

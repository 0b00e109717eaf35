//! HTTP client for the order management API.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::{ApiConfig, ConnectorError, ConnectorResult, CredentialProvider};

/// One page of order search results.
#[derive(Debug, Default, Deserialize)]
pub struct SearchPage {
    /// Order summaries.
    #[serde(default)]
    pub items: Vec<Value>,
    /// Total matching orders, when the API reports it.
    #[serde(rename = "totalResults", default)]
    pub total_results: Option<u64>,
}

/// Order management API client.
pub struct OrderApiClient {
    http_client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: Url,
    config: ApiConfig,
}

impl std::fmt::Debug for OrderApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl OrderApiClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: ApiConfig, credentials: Arc<dyn CredentialProvider>) -> ConnectorResult<Self> {
        config.validate()?;
        let http_client = build_http_client(&config)?;
        Ok(Self {
            base_url: config.parsed_base_url()?,
            http_client,
            credentials,
            config,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Builds the SCIM filter used for order searches.
    #[must_use]
    pub fn search_filter(market: &str, status: &str) -> String {
        format!("siteId sw \"{market}\" and state eq \"{status}\"")
    }

    /// Fetches one page of orders for a market and status.
    ///
    /// # Errors
    ///
    /// Returns an error on credential, transport, status or decoding failure.
    #[instrument(skip(self))]
    pub async fn search_orders(
        &self,
        market: &str,
        status: &str,
        offset: u64,
    ) -> ConnectorResult<SearchPage> {
        let url = self.endpoint(&["orders"])?;
        let mut query = vec![
            ("q".to_string(), Self::search_filter(market, status)),
            ("queryFormat".to_string(), "SCIM".to_string()),
            ("limit".to_string(), self.config.search_limit.to_string()),
            ("sort".to_string(), "submittedDate:desc".to_string()),
        ];
        if offset > 0 {
            query.push(("offset".to_string(), offset.to_string()));
        }

        let body = self.get_json(url, &query).await?;
        let page: SearchPage = serde_json::from_value(body)?;
        debug!(count = page.items.len(), "Fetched order page");
        Ok(page)
    }

    /// Fetches the full detail document of one order.
    ///
    /// # Errors
    ///
    /// Returns an error on credential, transport, status or decoding failure.
    #[instrument(skip(self))]
    pub async fn get_order_detail(&self, order_id: &str) -> ConnectorResult<Value> {
        let url = self.endpoint(&["orders", order_id])?;
        let query = [("includeResult".to_string(), "full".to_string())];
        self.get_json(url, &query).await
    }

    fn endpoint(&self, segments: &[&str]) -> ConnectorResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ConnectorError::Config("invalid base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url, query: &[(String, String)]) -> ConnectorResult<Value> {
        let token = self.credentials.get().await?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                // The rejected token is replaced for subsequent calls; this call still fails.
                warn!("API rejected access token, refreshing");
                self.credentials.force_refresh().await?;
            }
            return Err(ConnectorError::api(status, body));
        }

        Ok(response.json().await?)
    }
}

fn build_http_client(config: &ApiConfig) -> ConnectorResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ConnectorError::Config(format!("Failed to create HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_filter() {
        assert_eq!(
            OrderApiClient::search_filter("region_a", "APPROVED"),
            r#"siteId sw "region_a" and state eq "APPROVED""#
        );
    }

    #[test]
    fn test_search_page_defaults() {
        let page: SearchPage = serde_json::from_str("{}").unwrap();
        assert!(page.items.is_empty());
        assert!(page.total_results.is_none());
    }
}

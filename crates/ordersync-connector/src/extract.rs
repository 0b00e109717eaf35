//! Per-market extraction across all order statuses.

use ordersync_core::Record;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{ConnectorResult, Enricher, OrderApiClient};

/// Collects and enriches the orders of a market.
#[derive(Debug, Clone, Copy)]
pub struct Extractor<'a> {
    client: &'a OrderApiClient,
    enricher: Enricher<'a>,
}

impl<'a> Extractor<'a> {
    /// Creates an extractor.
    #[must_use]
    pub fn new(client: &'a OrderApiClient, enricher: Enricher<'a>) -> Self {
        Self { client, enricher }
    }

    /// Searches every configured status for a market.
    ///
    /// A failed status query is logged and contributes no summaries.
    ///
    /// # Errors
    ///
    /// Returns an error only for credential failures.
    #[instrument(skip(self))]
    pub async fn search_market(&self, market: &str) -> ConnectorResult<Vec<Value>> {
        let config = self.client.config();
        let limit = u64::from(config.search_limit);
        let mut summaries = Vec::new();

        for status in &config.statuses {
            let mut fetched: u64 = 0;
            for page in 0..config.max_pages_per_status {
                let offset = u64::from(page) * limit;
                let result = match self.client.search_orders(market, status, offset).await {
                    Ok(result) => result,
                    Err(e) if e.is_credential_failure() => return Err(e),
                    Err(e) => {
                        warn!(market, status = %status, error = %e, "Order search failed");
                        break;
                    }
                };

                let count = result.items.len() as u64;
                fetched += count;
                summaries.extend(result.items);

                let exhausted = result.total_results.is_some_and(|total| fetched >= total);
                if count < limit || exhausted {
                    break;
                }
            }
        }

        info!(market, orders = summaries.len(), "Collected order summaries");
        Ok(summaries)
    }

    /// Extracts every row for a market.
    ///
    /// # Errors
    ///
    /// Returns an error only for credential failures.
    #[instrument(skip(self))]
    pub async fn extract_market(&self, market: &str) -> ConnectorResult<Vec<Record>> {
        let summaries = self.search_market(market).await?;
        let total = summaries.len();
        let interval = self.client.config().progress_interval.max(1);
        let mut rows = Vec::new();

        for (i, summary) in summaries.iter().enumerate() {
            rows.extend(self.enricher.enrich(summary).await?);
            if (i + 1) % interval == 0 {
                info!(market, processed = i + 1, total, "Enrichment progress");
            }
        }

        info!(market, orders = total, rows = rows.len(), "Market extraction complete");
        Ok(rows)
    }
}

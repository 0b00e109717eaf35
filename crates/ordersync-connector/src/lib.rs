//! Order management API connector.
//!
//! Pulls order summaries per market and status, fetches each order's detail
//! and expands it into flat line-item rows.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ordersync_connector::{
//!     ApiConfig, ApiCredentials, Enricher, Extractor, LocationLookup, OrderApiClient, TokenCache,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::new("https://orders.example.com/ccadmin/v1");
//! let tokens = Arc::new(TokenCache::new(&config, ApiCredentials::new("svc", "secret"))?);
//! let client = OrderApiClient::new(config, tokens)?;
//! let lookup = LocationLookup::empty();
//!
//! let extractor = Extractor::new(&client, Enricher::new(&client, &lookup));
//! let rows = extractor.extract_market("region_a").await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod enrich;
mod error;
mod extract;
mod location;

pub use auth::{CredentialProvider, TokenCache};
pub use client::{OrderApiClient, SearchPage};
pub use config::{ApiConfig, ApiCredentials, DEFAULT_STATUSES};
pub use enrich::{
    expand_order, Enricher, CITY_NAME_FIELD, PROCESSED_AT_FIELD, SHIPPING_CITY_FIELD,
    SHIPPING_PREFIX, SOURCE_VERSION_FIELD,
};
pub use error::{ConnectorError, ConnectorResult};
pub use extract::Extractor;
pub use location::LocationLookup;

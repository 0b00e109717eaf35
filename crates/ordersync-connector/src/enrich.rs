//! Order enrichment: detail fetch, address flattening and line-item expansion.

use chrono::{DateTime, Utc};
use ordersync_core::{flatten_default, FieldValue, Record, ORDER_ID_FIELD};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{ConnectorResult, LocationLookup, OrderApiClient};

/// Prefix applied to flattened shipping-address fields.
pub const SHIPPING_PREFIX: &str = "ship";
/// Flattened field holding the raw city id.
pub const SHIPPING_CITY_FIELD: &str = "ship_city";
/// Field receiving the resolved city name.
pub const CITY_NAME_FIELD: &str = "city_name_normalized";
/// Field receiving the processing timestamp.
pub const PROCESSED_AT_FIELD: &str = "processed_at";
/// Field receiving the pipeline version tag.
pub const SOURCE_VERSION_FIELD: &str = "source_v";

/// Line-item attribute to output column mapping.
const LINE_ITEM_FIELDS: &[(&str, &str)] = &[
    ("catRefId", "product_sku"),
    ("displayName", "product_name"),
    ("quantity", "quantity"),
    ("unitPrice", "unit_price"),
    ("rawTotalPrice", "total_price"),
];

/// Expands order summaries into denormalized line-item rows.
#[derive(Debug, Clone, Copy)]
pub struct Enricher<'a> {
    client: &'a OrderApiClient,
    lookup: &'a LocationLookup,
}

impl<'a> Enricher<'a> {
    /// Creates an enricher.
    #[must_use]
    pub fn new(client: &'a OrderApiClient, lookup: &'a LocationLookup) -> Self {
        Self { client, lookup }
    }

    /// Fetches the detail of one order and expands it into rows.
    ///
    /// Fetch failures are logged and yield no rows.
    ///
    /// # Errors
    ///
    /// Returns an error only for credential failures.
    #[instrument(skip(self, summary), fields(order_id = tracing::field::Empty))]
    pub async fn enrich(&self, summary: &Value) -> ConnectorResult<Vec<Record>> {
        let Some(order_id) = summary_id(summary) else {
            warn!("Order summary has no id, skipping");
            return Ok(Vec::new());
        };
        tracing::Span::current().record("order_id", order_id.as_str());

        match self.client.get_order_detail(&order_id).await {
            Ok(detail) => {
                let rows = expand_order(
                    summary,
                    &detail,
                    self.lookup,
                    Utc::now(),
                    &self.client.config().source_version,
                );
                debug!(rows = rows.len(), "Expanded order");
                Ok(rows)
            }
            Err(e) if e.is_credential_failure() => Err(e),
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "Failed to fetch order detail");
                Ok(Vec::new())
            }
        }
    }
}

/// Order id of a summary, as text.
fn summary_id(summary: &Value) -> Option<String> {
    FieldValue::from_json(summary.get(ORDER_ID_FIELD)?)
        .as_text()
        .filter(|id| !id.is_empty())
}

/// Builds the rows of one order from its summary and detail documents.
///
/// Emits one row per line item, or a single metadata row when the order
/// has no line items.
#[must_use]
pub fn expand_order(
    summary: &Value,
    detail: &Value,
    lookup: &LocationLookup,
    processed_at: DateTime<Utc>,
    source_version: &str,
) -> Vec<Record> {
    let shipping = flatten_default(
        detail.get("shippingAddress").unwrap_or(&Value::Null),
        SHIPPING_PREFIX,
    );

    let mut base = Record::from_json_object(summary);
    let city_name = shipping
        .get(SHIPPING_CITY_FIELD)
        .and_then(|city| lookup.resolve(city))
        .map(str::to_string);
    base.extend(shipping);
    if let Some(name) = city_name {
        base.insert(CITY_NAME_FIELD, name);
    }
    base.insert(PROCESSED_AT_FIELD, processed_at);
    base.insert(SOURCE_VERSION_FIELD, source_version);

    let items = detail
        .pointer("/shoppingCart/items")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty());

    let Some(items) = items else {
        return vec![base];
    };

    items
        .iter()
        .map(|item| {
            let mut row = base.clone();
            for (source, target) in LINE_ITEM_FIELDS {
                let value = item.get(*source).map_or(FieldValue::Null, FieldValue::from_json);
                row.insert(*target, value);
            }
            row
        })
        .collect()
}

//! Composite reconciliation key.

use std::fmt;

use crate::record::Record;

/// Field holding the order identifier.
pub const ORDER_ID_FIELD: &str = "id";
/// Field holding the product SKU.
pub const PRODUCT_SKU_FIELD: &str = "product_sku";
/// Field holding the order lifecycle state.
pub const STATE_FIELD: &str = "state";

/// The `(order id, product SKU)` pair identifying one destination row.
///
/// Both halves are compared by their text rendering; a missing SKU is the
/// empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    pub order_id: String,
    pub product_sku: String,
}

impl CompositeKey {
    /// Separator used by the display form.
    pub const SEPARATOR: &'static str = "_";

    /// Creates a key, treating a missing SKU as empty.
    pub fn new(order_id: impl Into<String>, product_sku: Option<String>) -> Self {
        Self {
            order_id: order_id.into(),
            product_sku: product_sku.unwrap_or_default(),
        }
    }

    /// Derives the key of a row.
    ///
    /// Returns `None` when the row has no usable order id.
    #[must_use]
    pub fn from_record(record: &Record) -> Option<Self> {
        let order_id = record
            .text(ORDER_ID_FIELD)
            .filter(|id| !id.is_empty())?;
        Some(Self::new(order_id, record.text(PRODUCT_SKU_FIELD)))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.order_id, Self::SEPARATOR, self.product_sku)
    }
}

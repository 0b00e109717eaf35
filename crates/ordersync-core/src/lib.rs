//! # ordersync-core
//!
//! Shared data model for the order sync pipeline:
//!
//! - [`Record`] and [`FieldValue`]: schema-on-read rows
//! - [`flatten`]: nested JSON to flat key-value mappings
//! - [`CompositeKey`]: `(order id, product SKU)` reconciliation identity
//! - [`rowset`]: helpers over row collections

pub mod flatten;
pub mod key;
pub mod record;
pub mod rowset;

pub use flatten::{flatten, flatten_default, DEFAULT_SEPARATOR};
pub use key::{CompositeKey, ORDER_ID_FIELD, PRODUCT_SKU_FIELD, STATE_FIELD};
pub use record::{FieldValue, Record};

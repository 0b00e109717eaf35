//! Destination table abstraction.

use async_trait::async_trait;
use ordersync_core::CompositeKey;

use crate::{AlignedBatch, ReconcileResult, SchemaDescriptor};

/// Diff projection of a persisted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRow {
    pub key: CompositeKey,
    pub state: Option<String>,
}

/// Writes for one batch, applied atomically.
#[derive(Debug, Clone, Default)]
pub struct BatchChange {
    /// Keys whose rows are deleted before appending.
    pub deletes: Vec<CompositeKey>,
    /// Rows appended after the deletes.
    pub appends: AlignedBatch,
}

/// Destination fact table.
#[async_trait]
pub trait DestinationTable: Send + Sync {
    /// Reads the table's column list.
    async fn describe(&self) -> ReconcileResult<SchemaDescriptor>;

    /// Reads the key and state of every row whose order id is in `order_ids`.
    async fn fetch_existing(
        &self,
        schema: &SchemaDescriptor,
        order_ids: &[String],
    ) -> ReconcileResult<Vec<ExistingRow>>;

    /// Deletes then appends in a single transaction.
    ///
    /// Either both take effect or neither does.
    async fn apply(&self, schema: &SchemaDescriptor, change: &BatchChange) -> ReconcileResult<()>;
}

//! Reconciliation engine.
//!
//! Batches new rows by order id, diffs each batch against the destination
//! and applies inserts and state replacements one transaction per batch.

use std::collections::HashMap;

use ordersync_core::{CompositeKey, Record, STATE_FIELD};
use tracing::{debug, error, info, instrument, warn};

use crate::diff::{diff_batch, KeyedRow};
use crate::{
    BatchChange, BatchOutcome, BatchStatus, DestinationTable, ReconcileConfig, ReconcileError,
    ReconcileReport, ReconcileResult, SchemaDescriptor, UnknownColumnPolicy,
};

/// Smart-upsert engine over a destination table.
pub struct ReconciliationEngine<T> {
    table: T,
    config: ReconcileConfig,
}

impl<T: DestinationTable> ReconciliationEngine<T> {
    /// Create a new engine with default configuration.
    #[must_use]
    pub fn new(table: T) -> Self {
        Self {
            table,
            config: ReconcileConfig::default(),
        }
    }

    /// Create with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(table: T, config: ReconcileConfig) -> ReconcileResult<Self> {
        config.validate()?;
        Ok(Self { table, config })
    }

    /// Returns the destination table.
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Reconciles `rows` into the destination table.
    ///
    /// Per-batch failures are recorded in the report and do not stop later
    /// batches.
    ///
    /// # Errors
    ///
    /// Returns an error only when the run cannot start: the schema cannot
    /// be read, lacks key columns, or the rows carry unknown columns under
    /// [`UnknownColumnPolicy::Reject`].
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn reconcile(&self, rows: &[Record]) -> ReconcileResult<ReconcileReport> {
        let mut report = ReconcileReport::new();
        if rows.is_empty() {
            info!("No rows to reconcile");
            return Ok(report);
        }

        let schema = self.table.describe().await?;
        schema.require_key_columns()?;

        let unknown = schema.unknown_columns(rows);
        if !unknown.is_empty() {
            match self.config.unknown_columns {
                UnknownColumnPolicy::Reject => {
                    return Err(ReconcileError::UnknownColumns { columns: unknown });
                }
                UnknownColumnPolicy::Warn => {
                    warn!(columns = ?unknown, "Dropping columns unknown to the destination table");
                    report.dropped_columns = unknown;
                }
            }
        }

        let (keyed, skipped) = key_rows(rows);
        if skipped > 0 {
            warn!(skipped, "Skipping rows without an order id");
        }
        report.skipped_rows = skipped;

        let (order_ids, rows_by_id) = group_by_order(&keyed);
        let total_batches = order_ids.len().div_ceil(self.config.batch_size);
        info!(
            orders = order_ids.len(),
            batches = total_batches,
            batch_size = self.config.batch_size,
            "Starting reconciliation"
        );

        for (index, ids) in order_ids.chunks(self.config.batch_size).enumerate() {
            let batch: Vec<KeyedRow<'_>> = ids
                .iter()
                .flat_map(|id| rows_by_id[id.as_str()].iter().map(|&i| keyed[i].clone()))
                .collect();

            let outcome = self.process_batch(index, ids, &batch, &schema).await;
            if let BatchStatus::Failed { ref error } = outcome.status {
                error!(batch = index, error = %error, "Batch failed, continuing with next batch");
            }
            report.add(outcome);
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            failed_batches = report.failed_batches(),
            "Reconciliation complete"
        );
        Ok(report)
    }

    async fn process_batch(
        &self,
        index: usize,
        order_ids: &[String],
        batch: &[KeyedRow<'_>],
        schema: &SchemaDescriptor,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            index,
            orders: order_ids.len(),
            rows: batch.len(),
            inserted: 0,
            updated: 0,
            unchanged: 0,
            status: BatchStatus::Committed,
        };

        let existing = match self.table.fetch_existing(schema, order_ids).await {
            Ok(existing) => existing,
            Err(e) => {
                outcome.status = BatchStatus::Failed {
                    error: e.to_string(),
                };
                return outcome;
            }
        };

        let diff = diff_batch(batch, &existing);
        outcome.unchanged = diff.unchanged;
        if diff.is_noop() {
            debug!(batch = index, "Batch has no changes");
            return outcome;
        }

        let appends: Vec<&Record> = diff
            .to_insert
            .iter()
            .chain(diff.to_update.iter())
            .copied()
            .collect();
        let change = BatchChange {
            deletes: diff.update_keys.clone(),
            appends: schema.align(&appends),
        };

        match self.table.apply(schema, &change).await {
            Ok(()) => {
                outcome.inserted = diff.to_insert.len();
                outcome.updated = diff.to_update.len();
                debug!(
                    batch = index,
                    inserted = outcome.inserted,
                    updated = outcome.updated,
                    "Batch committed"
                );
            }
            Err(e) => {
                outcome.status = BatchStatus::Failed {
                    error: e.to_string(),
                };
            }
        }
        outcome
    }
}

/// Derives keys, returning the keyed rows and the count of rows without an id.
fn key_rows(rows: &[Record]) -> (Vec<KeyedRow<'_>>, usize) {
    let mut keyed = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for record in rows {
        match CompositeKey::from_record(record) {
            Some(key) => keyed.push(KeyedRow {
                key,
                state: record.text(STATE_FIELD),
                record,
            }),
            None => skipped += 1,
        }
    }
    (keyed, skipped)
}

/// Distinct order ids in first-appearance order, with row indices per id.
fn group_by_order<'k>(keyed: &'k [KeyedRow<'_>]) -> (Vec<String>, HashMap<&'k str, Vec<usize>>) {
    let mut order = Vec::new();
    let mut by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, row) in keyed.iter().enumerate() {
        let id = row.key.order_id.as_str();
        let entry = by_id.entry(id).or_default();
        if entry.is_empty() {
            order.push(id.to_string());
        }
        entry.push(i);
    }
    (order, by_id)
}

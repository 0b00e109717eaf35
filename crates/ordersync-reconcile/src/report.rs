//! Batch outcomes and run totals.

use serde::{Deserialize, Serialize};

/// Result of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// The batch transaction committed (or had nothing to write).
    Committed,
    /// The batch was abandoned; nothing was written.
    Failed { error: String },
}

/// Outcome of one reconciliation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Zero-based batch index.
    pub index: usize,
    /// Distinct order ids in the batch.
    pub orders: usize,
    /// New rows in the batch.
    pub rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub status: BatchStatus,
}

impl BatchOutcome {
    /// True if the batch failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status, BatchStatus::Failed { .. })
    }
}

/// Run-level reconciliation report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub batches: Vec<BatchOutcome>,
    /// Rows inserted by committed batches.
    pub inserted: usize,
    /// Rows replaced by committed batches.
    pub updated: usize,
    pub unchanged: usize,
    /// Rows without a usable order id.
    pub skipped_rows: usize,
    /// Row columns dropped because the table lacks them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<String>,
}

impl ReconcileReport {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a batch outcome and adds its counts to the totals.
    ///
    /// Failed batches contribute nothing to the totals.
    pub fn add(&mut self, outcome: BatchOutcome) {
        if !outcome.is_failed() {
            self.inserted += outcome.inserted;
            self.updated += outcome.updated;
            self.unchanged += outcome.unchanged;
        }
        self.batches.push(outcome);
    }

    /// Number of failed batches.
    #[must_use]
    pub fn failed_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.is_failed()).count()
    }

    /// True if at least one batch failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed_batches() > 0
    }
}

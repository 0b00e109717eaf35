//! Reconciliation configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ReconcileError, ReconcileResult};

/// What to do with row columns the destination table does not have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownColumnPolicy {
    /// Drop them, naming them in the log and the run report.
    #[default]
    Warn,
    /// Fail the run before any batch is processed.
    Reject,
}

impl UnknownColumnPolicy {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for UnknownColumnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnknownColumnPolicy {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" | "drop" => Ok(Self::Warn),
            "reject" | "strict" => Ok(Self::Reject),
            other => Err(ReconcileError::Config(format!(
                "unknown column policy '{other}', expected 'warn' or 'reject'"
            ))),
        }
    }
}

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Order ids per existence-check batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum rows per INSERT statement.
    #[serde(default = "default_insert_chunk_rows")]
    pub insert_chunk_rows: usize,
    /// Handling of columns unknown to the destination table.
    #[serde(default)]
    pub unknown_columns: UnknownColumnPolicy,
}

fn default_batch_size() -> usize {
    1000
}

fn default_insert_chunk_rows() -> usize {
    1000
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            insert_chunk_rows: default_insert_chunk_rows(),
            unknown_columns: UnknownColumnPolicy::default(),
        }
    }
}

impl ReconcileConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a size is zero.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.batch_size == 0 {
            return Err(ReconcileError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.insert_chunk_rows == 0 {
            return Err(ReconcileError::Config(
                "insert_chunk_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

//! Destination schema descriptor and row alignment.

use std::collections::HashSet;

use ordersync_core::{rowset, FieldValue, Record, ORDER_ID_FIELD, PRODUCT_SKU_FIELD, STATE_FIELD};
use serde::{Deserialize, Serialize};

use crate::{ReconcileError, ReconcileResult};

/// One destination column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// SQL data type, e.g. `character varying`.
    pub data_type: String,
    /// Underlying type name, e.g. `varchar`, `int8`.
    pub udt_name: String,
    pub is_nullable: bool,
}

impl ColumnDescriptor {
    /// Creates a nullable column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, udt_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            udt_name: udt_name.into(),
            is_nullable: true,
        }
    }

    /// True for integer column types.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self.udt_name.as_str(), "int2" | "int4" | "int8")
    }
}

/// Ordered column list of the destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    columns: Vec<ColumnDescriptor>,
}

impl SchemaDescriptor {
    /// Creates a descriptor from columns in table order.
    #[must_use]
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    /// Columns in table order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// True if the table has the column.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Checks that the columns used for diffing exist.
    ///
    /// # Errors
    ///
    /// Returns `MissingKeyColumns` naming every absent column.
    pub fn require_key_columns(&self) -> ReconcileResult<()> {
        let missing: Vec<String> = [ORDER_ID_FIELD, PRODUCT_SKU_FIELD, STATE_FIELD]
            .iter()
            .filter(|c| !self.contains(c))
            .map(|c| (*c).to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ReconcileError::MissingKeyColumns { columns: missing })
        }
    }

    /// Row columns that the table does not have, in first-seen order.
    #[must_use]
    pub fn unknown_columns(&self, rows: &[Record]) -> Vec<String> {
        rowset::columns(rows)
            .into_iter()
            .filter(|c| !self.contains(c))
            .collect()
    }

    /// Projects rows onto the destination columns.
    ///
    /// The column list is every table column that at least one row carries,
    /// in table order. Missing values and `NaN` become `Null`.
    #[must_use]
    pub fn align(&self, rows: &[&Record]) -> AlignedBatch {
        let present: HashSet<&str> = rows.iter().flat_map(|r| r.keys()).collect();
        let columns: Vec<String> = self
            .columns
            .iter()
            .filter(|c| present.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();

        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(FieldValue::Null).normalized())
                    .collect()
            })
            .collect();

        AlignedBatch { columns, rows }
    }
}

/// Rows projected onto a fixed column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl AlignedBatch {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the value of `column` in row `index`.
    #[must_use]
    pub fn value(&self, index: usize, column: &str) -> Option<&FieldValue> {
        let pos = self.columns.iter().position(|c| c == column)?;
        self.rows.get(index)?.get(pos)
    }
}

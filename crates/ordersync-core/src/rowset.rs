//! Helpers over a collection of rows.

use std::collections::HashSet;

use crate::record::{FieldValue, Record};

/// Union of the column names of `rows`, in first-seen order.
#[must_use]
pub fn columns(rows: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key) {
                out.push(key.to_string());
            }
        }
    }
    out
}

/// Removes every column that is missing or null in all rows.
///
/// Returns the removed column names.
pub fn drop_all_null_columns(rows: &mut [Record]) -> Vec<String> {
    let empty: Vec<String> = columns(rows)
        .into_iter()
        .filter(|col| {
            rows.iter()
                .all(|row| row.get(col).map_or(true, FieldValue::is_missing))
        })
        .collect();

    for row in rows.iter_mut() {
        for col in &empty {
            row.remove(col);
        }
    }
    empty
}

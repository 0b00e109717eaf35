//! Per-batch composite-key diff.

use std::collections::{HashMap, HashSet};

use ordersync_core::{CompositeKey, Record};

use crate::store::ExistingRow;

/// A new row with its derived key and state.
#[derive(Debug, Clone)]
pub struct KeyedRow<'a> {
    pub key: CompositeKey,
    pub state: Option<String>,
    pub record: &'a Record,
}

/// Classification of a batch of new rows against existing rows.
#[derive(Debug, Default)]
pub struct BatchDiff<'a> {
    /// Rows whose key is not in the destination.
    pub to_insert: Vec<&'a Record>,
    /// Rows whose key exists with a different state.
    pub to_update: Vec<&'a Record>,
    /// Distinct keys of `to_update`, in first-seen order.
    pub update_keys: Vec<CompositeKey>,
    /// Rows whose key exists with the same state.
    pub unchanged: usize,
}

impl BatchDiff<'_> {
    /// True if nothing needs to be written.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty()
    }
}

/// Splits new rows into inserts, updates and unchanged rows.
///
/// A row is an update when any existing row with the same key has a
/// different state. Duplicate keys among the new rows are classified
/// independently.
#[must_use]
pub fn diff_batch<'a>(rows: &[KeyedRow<'a>], existing: &[ExistingRow]) -> BatchDiff<'a> {
    let mut existing_states: HashMap<&CompositeKey, Vec<Option<&str>>> = HashMap::new();
    for row in existing {
        existing_states
            .entry(&row.key)
            .or_default()
            .push(row.state.as_deref());
    }

    let mut diff = BatchDiff::default();
    let mut seen_updates = HashSet::new();

    for row in rows {
        match existing_states.get(&row.key) {
            None => diff.to_insert.push(row.record),
            Some(states) => {
                let state = row.state.as_deref();
                if states.iter().any(|s| *s != state) {
                    diff.to_update.push(row.record);
                    if seen_updates.insert(&row.key) {
                        diff.update_keys.push(row.key.clone());
                    }
                } else {
                    diff.unchanged += 1;
                }
            }
        }
    }

    diff
}

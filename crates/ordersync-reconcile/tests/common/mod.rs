//! Shared test fixtures for reconciliation tests.

#![allow(dead_code)]

pub mod pg;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ordersync_core::{CompositeKey, Record};
use ordersync_reconcile::{
    BatchChange, ColumnDescriptor, DestinationTable, ExistingRow, ReconcileError, ReconcileResult,
    SchemaDescriptor,
};

/// Write recorded by the in-memory table, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Delete(Vec<CompositeKey>),
    Append(usize),
}

/// In-memory destination table with call counters and failure injection.
pub struct MemoryTable {
    schema: SchemaDescriptor,
    rows: Mutex<Vec<Record>>,
    ops: Mutex<Vec<WriteOp>>,
    describe_call_count: AtomicUsize,
    fetch_call_count: AtomicUsize,
    apply_call_count: AtomicUsize,
    /// 1-based apply call that fails; 0 disables.
    fail_apply_on: AtomicUsize,
    fail_describe: bool,
}

impl MemoryTable {
    pub fn new(schema: SchemaDescriptor) -> Self {
        Self {
            schema,
            rows: Mutex::new(Vec::new()),
            ops: Mutex::new(Vec::new()),
            describe_call_count: AtomicUsize::new(0),
            fetch_call_count: AtomicUsize::new(0),
            apply_call_count: AtomicUsize::new(0),
            fail_apply_on: AtomicUsize::new(0),
            fail_describe: false,
        }
    }

    pub fn with_rows(self, rows: Vec<Record>) -> Self {
        *self.rows.lock().unwrap() = rows;
        self
    }

    pub fn with_apply_failure_on(self, call: usize) -> Self {
        self.fail_apply_on.store(call, Ordering::SeqCst);
        self
    }

    pub fn with_describe_failure(mut self) -> Self {
        self.fail_describe = true;
        self
    }

    pub fn rows(&self) -> Vec<Record> {
        self.rows.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<WriteOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_call_count.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_call_count.load(Ordering::SeqCst)
    }

    /// `(id, sku, state)` of every stored row, sorted.
    pub fn snapshot(&self) -> Vec<(String, String, Option<String>)> {
        let mut out: Vec<_> = self
            .rows()
            .iter()
            .map(|r| {
                (
                    r.text("id").unwrap_or_default(),
                    r.text("product_sku").unwrap_or_default(),
                    r.text("state"),
                )
            })
            .collect();
        out.sort();
        out
    }
}

#[async_trait]
impl DestinationTable for MemoryTable {
    async fn describe(&self) -> ReconcileResult<SchemaDescriptor> {
        self.describe_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_describe {
            return Err(ReconcileError::schema_discovery("connection refused"));
        }
        Ok(self.schema.clone())
    }

    async fn fetch_existing(
        &self,
        _schema: &SchemaDescriptor,
        order_ids: &[String],
    ) -> ReconcileResult<Vec<ExistingRow>> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| {
                let id = r.text("id")?;
                order_ids.contains(&id).then(|| ExistingRow {
                    key: CompositeKey::new(id, r.text("product_sku")),
                    state: r.text("state"),
                })
            })
            .collect())
    }

    async fn apply(&self, _schema: &SchemaDescriptor, change: &BatchChange) -> ReconcileResult<()> {
        let call = self.apply_call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_apply_on.load(Ordering::SeqCst) {
            return Err(ReconcileError::Config(format!("injected failure on apply {call}")));
        }

        let mut staged = self.rows();
        if !change.deletes.is_empty() {
            staged.retain(|r| {
                CompositeKey::from_record(r).map_or(true, |k| !change.deletes.contains(&k))
            });
        }
        for values in &change.appends.rows {
            let row: Record = change
                .appends
                .columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();
            staged.push(row);
        }

        let mut ops = self.ops.lock().unwrap();
        if !change.deletes.is_empty() {
            ops.push(WriteOp::Delete(change.deletes.clone()));
        }
        if !change.appends.is_empty() {
            ops.push(WriteOp::Append(change.appends.len()));
        }
        *self.rows.lock().unwrap() = staged;
        Ok(())
    }
}

/// Destination schema used across tests.
pub fn fact_schema() -> SchemaDescriptor {
    SchemaDescriptor::new(vec![
        ColumnDescriptor::new("id", "text", "text"),
        ColumnDescriptor::new("product_sku", "text", "text"),
        ColumnDescriptor::new("state", "text", "text"),
        ColumnDescriptor::new("quantity", "bigint", "int8"),
        ColumnDescriptor::new("unit_price", "numeric", "numeric"),
    ])
}

/// Builds an `(id, sku, state)` row.
pub fn row(id: &str, sku: &str, state: &str) -> Record {
    [("id", id), ("product_sku", sku), ("state", state)]
        .into_iter()
        .collect()
}

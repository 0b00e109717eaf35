//! Reconciliation engine tests against an in-memory destination table.

mod common;

use common::{fact_schema, row, MemoryTable, WriteOp};
use ordersync_core::{CompositeKey, FieldValue, Record};
use ordersync_reconcile::{
    BatchStatus, ReconcileConfig, ReconcileError, ReconciliationEngine, UnknownColumnPolicy,
};

fn engine(table: MemoryTable, batch_size: usize) -> ReconciliationEngine<MemoryTable> {
    let config = ReconcileConfig {
        batch_size,
        ..ReconcileConfig::default()
    };
    ReconciliationEngine::with_config(table, config).unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_new_row_is_inserted() {
    let engine = engine(MemoryTable::new(fact_schema()), 1000);

    let report = engine.reconcile(&[row("1", "A", "PENDING")]).await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(
        engine.table().snapshot(),
        vec![("1".into(), "A".into(), Some("PENDING".into()))]
    );
}

#[tokio::test]
async fn test_state_change_deletes_then_appends() {
    let table = MemoryTable::new(fact_schema()).with_rows(vec![row("1", "A", "PENDING")]);
    let engine = engine(table, 1000);

    let report = engine.reconcile(&[row("1", "A", "APPROVED")]).await.unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 1);
    assert_eq!(engine.table().apply_calls(), 1);
    assert_eq!(
        engine.table().ops(),
        vec![
            WriteOp::Delete(vec![CompositeKey::new("1", Some("A".into()))]),
            WriteOp::Append(1),
        ]
    );
    assert_eq!(
        engine.table().snapshot(),
        vec![("1".into(), "A".into(), Some("APPROVED".into()))]
    );
}

#[tokio::test]
async fn test_unchanged_state_is_noop() {
    let table = MemoryTable::new(fact_schema()).with_rows(vec![row("1", "A", "PENDING")]);
    let engine = engine(table, 1000);

    let report = engine.reconcile(&[row("1", "A", "PENDING")]).await.unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.unchanged, 1);
    assert_eq!(engine.table().apply_calls(), 0);
}

#[tokio::test]
async fn test_empty_input_touches_nothing() {
    let engine = engine(MemoryTable::new(fact_schema()), 1000);

    let report = engine.reconcile(&[]).await.unwrap();

    assert!(report.batches.is_empty());
    assert_eq!(engine.table().describe_calls(), 0);
    assert_eq!(engine.table().fetch_calls(), 0);
}

#[tokio::test]
async fn test_metadata_row_without_sku_round_trips() {
    let stored: Record = [("id", "7"), ("state", "PENDING")].into_iter().collect();
    let table = MemoryTable::new(fact_schema()).with_rows(vec![stored.clone()]);
    let engine = engine(table, 1000);

    let report = engine.reconcile(&[stored]).await.unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(engine.table().rows().len(), 1);
}

// =============================================================================
// Batching
// =============================================================================

#[tokio::test]
async fn test_one_existence_query_per_batch() {
    let rows: Vec<Record> = (0..7)
        .flat_map(|i| {
            let id = i.to_string();
            vec![row(&id, "A", "PENDING"), row(&id, "B", "PENDING")]
        })
        .collect();
    let engine = engine(MemoryTable::new(fact_schema()), 3);

    let report = engine.reconcile(&rows).await.unwrap();

    assert_eq!(engine.table().fetch_calls(), 3);
    assert_eq!(engine.table().describe_calls(), 1);
    assert_eq!(report.batches.len(), 3);
    assert_eq!(report.batches[2].orders, 1);
    assert_eq!(report.inserted, 14);
}

#[tokio::test]
async fn test_failed_batch_does_not_stop_later_batches() {
    let rows = vec![
        row("1", "A", "PENDING"),
        row("2", "A", "PENDING"),
        row("3", "A", "PENDING"),
    ];
    let table = MemoryTable::new(fact_schema()).with_apply_failure_on(2);
    let engine = engine(table, 1);

    let report = engine.reconcile(&rows).await.unwrap();

    assert_eq!(report.batches.len(), 3);
    assert_eq!(report.failed_batches(), 1);
    assert!(matches!(report.batches[1].status, BatchStatus::Failed { .. }));
    assert_eq!(report.inserted, 2);
    assert_eq!(
        engine.table().snapshot(),
        vec![
            ("1".into(), "A".into(), Some("PENDING".into())),
            ("3".into(), "A".into(), Some("PENDING".into())),
        ]
    );
}

#[tokio::test]
async fn test_rows_without_id_are_skipped() {
    let orphan: Record = [("product_sku", "A"), ("state", "PENDING")].into_iter().collect();
    let engine = engine(MemoryTable::new(fact_schema()), 1000);

    let report = engine
        .reconcile(&[orphan, row("1", "A", "PENDING")])
        .await
        .unwrap();

    assert_eq!(report.skipped_rows, 1);
    assert_eq!(report.inserted, 1);
}

// =============================================================================
// Schema handling
// =============================================================================

#[tokio::test]
async fn test_unknown_columns_dropped_under_warn_policy() {
    let mut new_row = row("1", "A", "PENDING");
    new_row.insert("ship_geo", "x");
    new_row.insert("quantity", 2_i64);
    let engine = engine(MemoryTable::new(fact_schema()), 1000);

    let report = engine.reconcile(&[new_row]).await.unwrap();

    assert_eq!(report.dropped_columns, vec!["ship_geo"]);
    let stored = engine.table().rows();
    assert!(!stored[0].contains_key("ship_geo"));
    assert_eq!(stored[0].get("quantity"), Some(&FieldValue::Integer(2)));
}

#[tokio::test]
async fn test_unknown_columns_rejected_before_any_batch() {
    let mut new_row = row("1", "A", "PENDING");
    new_row.insert("ship_geo", "x");
    let config = ReconcileConfig {
        unknown_columns: UnknownColumnPolicy::Reject,
        ..ReconcileConfig::default()
    };
    let engine =
        ReconciliationEngine::with_config(MemoryTable::new(fact_schema()), config).unwrap();

    let err = engine.reconcile(&[new_row]).await.unwrap_err();

    assert!(matches!(err, ReconcileError::UnknownColumns { .. }));
    assert_eq!(engine.table().fetch_calls(), 0);
}

#[tokio::test]
async fn test_schema_failure_is_entry_error() {
    let table = MemoryTable::new(fact_schema()).with_describe_failure();
    let engine = engine(table, 1000);

    let err = engine.reconcile(&[row("1", "A", "PENDING")]).await.unwrap_err();

    assert!(matches!(err, ReconcileError::SchemaDiscovery { .. }));
    assert_eq!(engine.table().fetch_calls(), 0);
}

#[tokio::test]
async fn test_nan_is_stored_as_null() {
    let mut existing = row("1", "A", "PENDING");
    existing.insert("unit_price", 4.5);
    let mut new_row = row("1", "A", "APPROVED");
    new_row.insert("unit_price", f64::NAN);
    new_row.insert("quantity", FieldValue::Null);
    let engine = engine(MemoryTable::new(fact_schema()).with_rows(vec![existing]), 1000);

    let report = engine.reconcile(&[new_row]).await.unwrap();

    assert_eq!(report.updated, 1);
    let stored = engine.table().rows();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].text("state").as_deref(), Some("APPROVED"));
    assert_eq!(stored[0].get("unit_price"), Some(&FieldValue::Null));
    assert_eq!(stored[0].get("quantity"), Some(&FieldValue::Null));
}

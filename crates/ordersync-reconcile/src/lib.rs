//! # ordersync-reconcile
//!
//! Composite-key smart upsert of order rows into a destination fact table.
//!
//! Rows are batched by order id. For each batch the engine reads the
//! `(id, product_sku, state)` projection of the existing rows, inserts rows
//! with new keys, and replaces rows whose state changed by deleting and
//! re-appending them inside one transaction. Rows with an unchanged state
//! are left alone.
//!
//! # Example
//!
//! ```no_run
//! use ordersync_reconcile::{PgDestinationTable, ReconcileConfig, ReconciliationEngine};
//!
//! # async fn example(pool: sqlx::PgPool, rows: Vec<ordersync_core::Record>) -> Result<(), Box<dyn std::error::Error>> {
//! let table = PgDestinationTable::new(pool, "public", "fact_sales_orders");
//! let engine = ReconciliationEngine::with_config(table, ReconcileConfig::default())?;
//! let report = engine.reconcile(&rows).await?;
//! println!("inserted {} updated {}", report.inserted, report.updated);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod postgres;
pub mod report;
pub mod schema;
pub mod store;

pub use config::{ReconcileConfig, UnknownColumnPolicy};
pub use diff::{diff_batch, BatchDiff, KeyedRow};
pub use engine::ReconciliationEngine;
pub use error::{ReconcileError, ReconcileResult};
pub use postgres::PgDestinationTable;
pub use report::{BatchOutcome, BatchStatus, ReconcileReport};
pub use schema::{AlignedBatch, ColumnDescriptor, SchemaDescriptor};
pub use store::{BatchChange, DestinationTable, ExistingRow};

//! `PostgreSQL` destination table.

use async_trait::async_trait;
use ordersync_core::{CompositeKey, FieldValue, ORDER_ID_FIELD};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, instrument};

use crate::{
    BatchChange, ColumnDescriptor, DestinationTable, ExistingRow, ReconcileError, ReconcileResult,
    SchemaDescriptor,
};

/// Postgres bind-parameter limit per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Fact table stored in `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgDestinationTable {
    pool: PgPool,
    schema: String,
    table: String,
    insert_chunk_rows: usize,
}

impl PgDestinationTable {
    /// Creates a table handle.
    pub fn new(pool: PgPool, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
            table: table.into(),
            insert_chunk_rows: 1000,
        }
    }

    /// Sets the maximum rows per INSERT statement.
    #[must_use]
    pub fn with_insert_chunk_rows(mut self, rows: usize) -> Self {
        self.insert_chunk_rows = rows.max(1);
        self
    }

    /// Escape a SQL identifier to prevent injection.
    fn escape_identifier(identifier: &str) -> String {
        identifier.replace('"', "\"\"")
    }

    fn qualified_name(&self) -> String {
        format!(
            "\"{}\".\"{}\"",
            Self::escape_identifier(&self.schema),
            Self::escape_identifier(&self.table)
        )
    }

    /// Quoted type of the `id` column, so keys are compared in the column's
    /// own type and its index stays usable.
    fn id_type(schema: &SchemaDescriptor) -> ReconcileResult<String> {
        schema
            .column(ORDER_ID_FIELD)
            .map(|c| format!("\"{}\"", Self::escape_identifier(&c.udt_name)))
            .ok_or_else(|| ReconcileError::MissingKeyColumns {
                columns: vec![ORDER_ID_FIELD.to_string()],
            })
    }

    fn rows_per_statement(&self, columns: usize) -> usize {
        (MAX_BIND_PARAMS / columns.max(1)).min(self.insert_chunk_rows).max(1)
    }
}

/// Text form of a value as bound for `column`.
fn bind_text(value: &FieldValue, column: &ColumnDescriptor) -> Option<String> {
    match value {
        FieldValue::Float(f) if column.is_integer() && f.is_finite() && f.fract() == 0.0 => {
            Some(format!("{f:.0}"))
        }
        other => other.as_text(),
    }
}

#[async_trait]
impl DestinationTable for PgDestinationTable {
    #[instrument(skip(self), fields(schema = %self.schema, table = %self.table))]
    async fn describe(&self) -> ReconcileResult<SchemaDescriptor> {
        let columns_query = r"
            SELECT
                column_name::text AS column_name,
                data_type::text AS data_type,
                udt_name::text AS udt_name,
                is_nullable::text AS is_nullable
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        ";

        let rows: Vec<sqlx::postgres::PgRow> = sqlx::query(columns_query)
            .bind(&self.schema)
            .bind(&self.table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                ReconcileError::schema_discovery(format!(
                    "Failed to query columns for table {}: {e}",
                    self.qualified_name()
                ))
            })?;

        if rows.is_empty() {
            return Err(ReconcileError::schema_discovery(format!(
                "Table {} not found or has no columns",
                self.qualified_name()
            )));
        }

        let columns = rows
            .iter()
            .map(|row| {
                Ok(ColumnDescriptor {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    udt_name: row.try_get("udt_name")?,
                    is_nullable: row.try_get::<String, _>("is_nullable")? == "YES",
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        debug!(columns = columns.len(), "Discovered destination schema");
        Ok(SchemaDescriptor::new(columns))
    }

    #[instrument(skip(self, schema, order_ids), fields(orders = order_ids.len()))]
    async fn fetch_existing(
        &self,
        schema: &SchemaDescriptor,
        order_ids: &[String],
    ) -> ReconcileResult<Vec<ExistingRow>> {
        let query = format!(
            "SELECT CAST(id AS TEXT) AS id, \
                    COALESCE(CAST(product_sku AS TEXT), '') AS product_sku, \
                    CAST(state AS TEXT) AS state \
             FROM {} WHERE id = ANY(CAST($1 AS {}[]))",
            self.qualified_name(),
            Self::id_type(schema)?
        );

        let rows: Vec<sqlx::postgres::PgRow> = sqlx::query(&query)
            .bind(order_ids)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ExistingRow {
                    key: CompositeKey::new(
                        row.try_get::<String, _>("id")?,
                        Some(row.try_get("product_sku")?),
                    ),
                    state: row.try_get("state")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, schema, change), fields(deletes = change.deletes.len(), appends = change.appends.len()))]
    async fn apply(&self, schema: &SchemaDescriptor, change: &BatchChange) -> ReconcileResult<()> {
        let table = self.qualified_name();
        let id_type = Self::id_type(schema)?;
        let mut tx = self.pool.begin().await?;

        if !change.deletes.is_empty() {
            let (ids, skus): (Vec<String>, Vec<String>) = change
                .deletes
                .iter()
                .map(|k| (k.order_id.clone(), k.product_sku.clone()))
                .unzip();

            let deleted = sqlx::query(&format!(
                "DELETE FROM {table} AS t \
                 USING UNNEST($1::text[], $2::text[]) AS k(id, product_sku) \
                 WHERE t.id = CAST(k.id AS {id_type}) \
                   AND COALESCE(CAST(t.product_sku AS TEXT), '') = k.product_sku"
            ))
            .bind(&ids)
            .bind(&skus)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            debug!(deleted, "Deleted superseded rows");
        }

        let appends = &change.appends;
        if !appends.is_empty() && !appends.columns.is_empty() {
            let columns: Vec<&ColumnDescriptor> = appends
                .columns
                .iter()
                .map(|name| {
                    schema.column(name).ok_or_else(|| {
                        ReconcileError::Config(format!("column '{name}' is not in the destination schema"))
                    })
                })
                .collect::<ReconcileResult<_>>()?;

            let column_list = columns
                .iter()
                .map(|c| format!("\"{}\"", Self::escape_identifier(&c.name)))
                .collect::<Vec<_>>()
                .join(", ");

            for chunk in appends.rows.chunks(self.rows_per_statement(columns.len())) {
                let mut builder: QueryBuilder<'_, Postgres> =
                    QueryBuilder::new(format!("INSERT INTO {table} ({column_list}) "));
                builder.push_values(chunk, |mut b, row| {
                    for (value, column) in row.iter().zip(&columns) {
                        b.push("CAST(")
                            .push_bind_unseparated(bind_text(value, column))
                            .push_unseparated(format!(
                                " AS \"{}\")",
                                Self::escape_identifier(&column.udt_name)
                            ));
                    }
                });
                builder.build().execute(&mut *tx).await?;
            }
            debug!(rows = appends.len(), "Appended rows");
        }

        tx.commit().await?;
        Ok(())
    }
}

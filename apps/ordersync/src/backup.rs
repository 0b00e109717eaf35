//! Columnar backup of the consolidated row set.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use ordersync_core::{rowset, FieldValue, Record};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Backup file name for a run date.
#[must_use]
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("backup_{}.parquet", date.format("%Y%m%d"))
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(concat!("ordersync ", env!("CARGO_PKG_VERSION")).to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Column type chosen from the values present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int64,
    Float64,
    Boolean,
    Timestamp,
    Utf8,
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a FieldValue>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in values.filter(|v| !v.is_missing()) {
        let this = match value {
            FieldValue::Integer(_) => ColumnKind::Int64,
            FieldValue::Float(_) => ColumnKind::Float64,
            FieldValue::Boolean(_) => ColumnKind::Boolean,
            FieldValue::Timestamp(_) => ColumnKind::Timestamp,
            _ => return ColumnKind::Utf8,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int64 | ColumnKind::Float64), ColumnKind::Int64 | ColumnKind::Float64) => {
                ColumnKind::Float64
            }
            _ => return ColumnKind::Utf8,
        });
    }
    kind.unwrap_or(ColumnKind::Utf8)
}

static NULL: FieldValue = FieldValue::Null;

fn build_column(rows: &[Record], name: &str) -> (Field, ArrayRef) {
    let values = || rows.iter().map(move |r| r.get(name).unwrap_or(&NULL));
    let kind = infer_kind(values());

    let (data_type, array): (DataType, ArrayRef) = match kind {
        ColumnKind::Int64 => (
            DataType::Int64,
            Arc::new(Int64Array::from_iter(values().map(|v| match v {
                FieldValue::Integer(i) => Some(*i),
                _ => None,
            }))),
        ),
        ColumnKind::Float64 => (
            DataType::Float64,
            Arc::new(Float64Array::from_iter(values().map(|v| match v {
                FieldValue::Integer(i) => Some(*i as f64),
                FieldValue::Float(f) if !f.is_nan() => Some(*f),
                _ => None,
            }))),
        ),
        ColumnKind::Boolean => (
            DataType::Boolean,
            Arc::new(BooleanArray::from_iter(values().map(|v| match v {
                FieldValue::Boolean(b) => Some(*b),
                _ => None,
            }))),
        ),
        ColumnKind::Timestamp => (
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            Arc::new(
                TimestampMicrosecondArray::from_iter(values().map(|v| match v {
                    FieldValue::Timestamp(ts) => Some(ts.timestamp_micros()),
                    _ => None,
                }))
                .with_timezone("UTC"),
            ),
        ),
        ColumnKind::Utf8 => (
            DataType::Utf8,
            Arc::new(StringArray::from_iter(values().map(FieldValue::as_text))),
        ),
    };

    (Field::new(name, data_type, true), array)
}

/// Builds an Arrow batch with one nullable column per row-set column.
///
/// # Errors
///
/// Returns an error if the batch cannot be assembled.
pub fn to_record_batch(rows: &[Record]) -> AppResult<RecordBatch> {
    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = rowset::columns(rows)
        .iter()
        .map(|name| build_column(rows, name))
        .unzip();

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| AppError::Backup(format!("record batch build failed: {e}")))
}

/// Writes the row set to `dir/backup_YYYYMMDD.parquet`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or the Parquet write fails.
pub fn write_backup(rows: &[Record], dir: &Path, date: NaiveDate) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(backup_file_name(date));
    let batch = to_record_batch(rows)?;

    let file = File::create(&path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()))
        .map_err(|e| AppError::Backup(format!("parquet writer init failed: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| AppError::Backup(format!("parquet write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| AppError::Backup(format!("parquet close failed: {e}")))?;

    info!(path = %path.display(), rows = batch.num_rows(), "Backup written");
    Ok(path)
}

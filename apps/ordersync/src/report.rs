//! Compressed tabular run report.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use ordersync_core::{rowset, Record};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{AppError, AppResult};

/// Report artifact written for a run.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub file_name: String,
    pub rows: usize,
    pub size_bytes: usize,
}

/// Report base name for a run timestamp.
#[must_use]
pub fn report_stem(at: NaiveDateTime) -> String {
    format!("report_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Renders rows as CSV with a header of the union columns.
///
/// # Errors
///
/// Returns an error if a record cannot be written.
pub fn to_csv(rows: &[Record]) -> AppResult<Vec<u8>> {
    let columns = rowset::columns(rows);
    let mut wtr = csv::Writer::from_writer(Vec::new());

    wtr.write_record(&columns)
        .map_err(|e| AppError::Report(format!("CSV header write failed: {e}")))?;
    for row in rows {
        let fields = columns
            .iter()
            .map(|c| row.get(c).map(ToString::to_string).unwrap_or_default());
        wtr.write_record(fields)
            .map_err(|e| AppError::Report(format!("CSV row write failed: {e}")))?;
    }

    wtr.into_inner()
        .map_err(|e| AppError::Report(format!("CSV flush failed: {e}")))
}

/// Writes `dir/report_YYYYMMDD_HHMMSS.zip` holding a single CSV entry.
///
/// # Errors
///
/// Returns an error if the CSV, archive or file write fails.
pub fn write_report(rows: &[Record], dir: &Path, at: NaiveDateTime) -> AppResult<ReportArtifact> {
    let stem = report_stem(at);
    let csv_bytes = to_csv(rows)?;

    let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
    let zip_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(6));

    let entry = format!("{stem}.csv");
    zip_writer
        .start_file(entry.as_str(), zip_options)
        .map_err(|e| AppError::Report(format!("Failed to add {entry} to archive: {e}")))?;
    zip_writer.write_all(&csv_bytes)?;
    let zip_bytes = zip_writer
        .finish()
        .map_err(|e| AppError::Report(format!("Failed to finalize archive: {e}")))?
        .into_inner();

    std::fs::create_dir_all(dir)?;
    let file_name = format!("{stem}.zip");
    let path = dir.join(&file_name);
    std::fs::write(&path, &zip_bytes)?;

    info!(
        path = %path.display(),
        rows = rows.len(),
        size_bytes = zip_bytes.len(),
        "Report written"
    );

    Ok(ReportArtifact {
        path,
        file_name,
        rows: rows.len(),
        size_bytes: zip_bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ordersync_core::FieldValue;
    use std::io::Read;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(6, 30, 5)
            .unwrap()
    }

    fn rows() -> Vec<Record> {
        vec![
            [("id", FieldValue::from("o1")), ("quantity", FieldValue::Integer(2))]
                .into_iter()
                .collect(),
            [("id", FieldValue::from("o2")), ("note", FieldValue::from("a,b"))]
                .into_iter()
                .collect(),
        ]
    }

    #[test]
    fn test_report_stem() {
        assert_eq!(report_stem(at()), "report_20240501_063005");
    }

    #[test]
    fn test_csv_union_header_and_quoting() {
        let csv = String::from_utf8(to_csv(&rows()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["id,quantity,note", "o1,2,", "o2,,\"a,b\""]);
    }

    #[test]
    fn test_zip_contains_single_csv() {
        let dir = tempfile::tempdir().unwrap();

        let artifact = write_report(&rows(), dir.path(), at()).unwrap();

        assert_eq!(artifact.file_name, "report_20240501_063005.zip");
        let file = std::fs::File::open(&artifact.path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 1);

        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "report_20240501_063005.csv");
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert!(content.starts_with("id,quantity,note\n"));
    }
}

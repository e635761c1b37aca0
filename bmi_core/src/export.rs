//! CSV export of a user's measurement history.

use crate::{HistoryService, MeasurementRecord, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    weight: f64,
    height: f64,
    bmi: f64,
    category: &'static str,
}

impl From<&MeasurementRecord> for CsvRow {
    fn from(record: &MeasurementRecord) -> Self {
        CsvRow {
            date: record.date_string(),
            weight: record.weight_kg(),
            height: record.height_cm(),
            bmi: record.bmi(),
            category: record.category().label(),
        }
    }
}

/// Write records as CSV (with header) and return the number of rows
pub fn write_csv<W: Write>(records: &[MeasurementRecord], writer: W) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);

    if records.is_empty() {
        writer.write_record(["date", "weight", "height", "bmi", "category"])?;
    }
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer.flush()?;
    Ok(records.len())
}

/// Export `user_id`'s full chronological history to a CSV file
pub fn export_user_csv(service: &HistoryService, user_id: &str, path: &Path) -> Result<usize> {
    let records = service.full_history(user_id);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let count = write_csv(&records, &file)?;
    file.sync_all()?;

    tracing::info!("Exported {} records for {:?} to {:?}", count, user_id, path);
    Ok(count)
}

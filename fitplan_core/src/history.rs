//! Session history queries and CSV export.

use crate::{Result, SessionRecord};
use chrono::{DateTime, Duration, Utc};
use std::fs::File;
use std::path::Path;

/// A row in the exported CSV
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    workout_id: String,
    started_at: String,
    completed_at: String,
    exercises: usize,
    skipped: usize,
    duration_seconds: u32,
    duration_minutes: u32,
    calories: u32,
    rating: u8,
}

impl From<&SessionRecord> for CsvRow {
    fn from(record: &SessionRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            workout_id: record.workout_id.to_string(),
            started_at: record.started_at.to_rfc3339(),
            completed_at: record.completed_at.to_rfc3339(),
            exercises: record.exercises.len(),
            skipped: record.skipped_count(),
            duration_seconds: record.total_duration_seconds,
            duration_minutes: record.total_duration_minutes,
            calories: record.calories_burned,
            rating: record.rating,
        }
    }
}

/// Load all recorded sessions, newest first
pub fn load_history(wal_path: &Path) -> Result<Vec<SessionRecord>> {
    let mut records = crate::wal::read_records(wal_path)?;
    records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    tracing::debug!("Loaded {} sessions of history", records.len());
    Ok(records)
}

/// Sessions completed within the last `days` days of `now`
pub fn recent(records: &[SessionRecord], now: DateTime<Utc>, days: i64) -> Vec<&SessionRecord> {
    let cutoff = now - Duration::days(days);
    records.iter().filter(|r| r.completed_at >= cutoff).collect()
}

/// Write one CSV row per session, replacing `csv_path`
///
/// Returns the number of rows written.
pub fn export_csv(records: &[SessionRecord], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(csv_path)?;
    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;

    let file = writer
        .into_inner()
        .map_err(|e| crate::Error::Persistence(e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} sessions to {:?}", records.len(), csv_path);
    Ok(records.len())
}

//! Write-ahead log of session records.
//!
//! Records are appended to a JSONL file under an exclusive lock. Readers take
//! a shared lock, skip malformed lines and drop duplicate record ids, so a
//! record appended twice by a retry is still counted once.

use crate::{Result, SessionRecord};
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for finished session records
pub trait SessionSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()>;
}

/// JSONL-backed sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionSink for JsonlSink {
    fn append(&mut self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let written = {
            let mut writer = std::io::BufWriter::new(&file);
            writer
                .write_all(line.as_bytes())
                .and_then(|_| writer.flush())
        };
        let synced = written.and_then(|_| file.sync_data());

        file.unlock()?;
        synced?;

        tracing::debug!("Appended session {} to {:?}", record.id, self.path);
        Ok(())
    }
}

/// Read every record from a WAL, oldest first, without duplicates
pub fn read_records(path: &Path) -> Result<Vec<SessionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Stopped reading {:?} at line {}: {}", path, line_num + 1, e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SessionRecord>(&line) {
            Ok(record) => {
                if seen.insert(record.id) {
                    records.push(record);
                } else {
                    tracing::debug!("Duplicate session {} at line {}", record.id, line_num + 1);
                }
            }
            Err(e) => {
                tracing::warn!("Failed to parse session at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sessions from {:?}", records.len(), path);
    Ok(records)
}

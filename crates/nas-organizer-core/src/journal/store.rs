use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::record::JournalRecord;
use crate::error::Result;
use crate::storage::models::utc_timestamp;

/// NDJSON file of run records. Lines are only ever appended.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, stamping `timestamp_utc` when it is empty.
    pub fn append(&self, record: &JournalRecord) -> Result<()> {
        let mut record = record.clone();
        if record.timestamp_utc.is_empty() {
            record.timestamp_utc = utc_timestamp();
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        debug!("Journal record appended to {}", self.path.display());
        Ok(())
    }

    /// All parsable records, newest first. Records sharing a timestamp keep
    /// the later line first. A missing file yields no records.
    pub fn read_records(&self) -> Result<Vec<JournalRecord>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unparsable journal line {}: {}", idx + 1, e),
            }
        }

        records.reverse();
        records.sort_by(|a, b| b.timestamp_utc.cmp(&a.timestamp_utc));
        Ok(records)
    }
}

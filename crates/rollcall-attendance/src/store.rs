//! Backing storage for the ledger table.
//!
//! The concrete store is a CSV file with the header
//! `Name,Date,In_Time,Out_Time`. A blank time cell means "unset".

use crate::record::{format_time, AttendanceRecord, DATE_FORMAT, TIME_FORMAT};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Column names, in file order.
pub const HEADER: [&str; 4] = ["Name", "Date", "In_Time", "Out_Time"];

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("cannot read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed ledger {path} at line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },
    #[error("failed to write ledger {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load and persist the whole attendance table.
///
/// `save` must be all-or-nothing: after an error the previously persisted
/// table is still the one on storage.
pub trait LedgerStore {
    /// All persisted records, or `None` when the store does not exist yet.
    fn load(&self) -> Result<Option<Vec<AttendanceRecord>>, LedgerError>;

    fn save(&self, records: &[AttendanceRecord]) -> Result<(), LedgerError>;
}

/// CSV file store. Writes go to a temp file that is renamed over the ledger.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Write { path: self.path.clone(), source }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Row {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "In_Time", default)]
    in_time: String,
    #[serde(rename = "Out_Time", default)]
    out_time: String,
}

impl Row {
    fn from_record(record: &AttendanceRecord) -> Self {
        Self {
            name: record.name.clone(),
            date: record.date.format(DATE_FORMAT).to_string(),
            in_time: format_time(record.in_time),
            out_time: format_time(record.out_time),
        }
    }

    /// Names are identities and are kept byte for byte; only the date and
    /// time cells tolerate surrounding whitespace.
    fn into_record(self) -> Result<AttendanceRecord, String> {
        if self.name.trim().is_empty() {
            return Err("empty Name".to_string());
        }
        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT)
            .map_err(|e| format!("bad Date {:?}: {e}", self.date))?;
        Ok(AttendanceRecord {
            name: self.name,
            date,
            in_time: parse_time("In_Time", &self.in_time)?,
            out_time: parse_time("Out_Time", &self.out_time)?,
        })
    }
}

fn parse_time(column: &str, cell: &str) -> Result<Option<NaiveTime>, String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    NaiveTime::parse_from_str(cell, TIME_FORMAT)
        .map(Some)
        .map_err(|e| format!("bad {column} {cell:?}: {e}"))
}

impl LedgerStore for CsvStore {
    fn load(&self) -> Result<Option<Vec<AttendanceRecord>>, LedgerError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let read_error = |source| LedgerError::Read { path: self.path.clone(), source };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(&self.path)
            .map_err(read_error)?;
        let headers = reader.headers().map_err(read_error)?.clone();

        let mut records = Vec::new();
        for raw in reader.records() {
            let raw = raw.map_err(read_error)?;
            // Physical line where the row starts; quoted fields may span lines.
            let line = raw.position().map_or(0, |p| p.line());
            let row: Row = raw.deserialize(Some(&headers)).map_err(read_error)?;
            let record = row.into_record().map_err(|reason| LedgerError::Malformed {
                path: self.path.clone(),
                line,
                reason,
            })?;
            records.push(record);
        }

        tracing::debug!(path = %self.path.display(), records = records.len(), "ledger loaded");
        Ok(Some(records))
    }

    fn save(&self, records: &[AttendanceRecord]) -> Result<(), LedgerError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer
                .write_record(HEADER)
                .map_err(|e| self.write_error(e.into()))?;
            for record in records {
                writer
                    .serialize(Row::from_record(record))
                    .map_err(|e| self.write_error(e.into()))?;
            }
            writer.flush().map_err(|e| self.write_error(e))?;
        }

        // The temp file is created 0600; keep whatever mode the ledger had.
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| self.write_error(e))?;
        }
        tmp.as_file().sync_all().map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_error(e.error))?;
        Ok(())
    }
}

//! Append-only record of delivery outcomes.
//!
//! The log is the resume checkpoint: every delivery attempt appends one row,
//! flushed and synced before the run moves on, and an address with a `sent`
//! row is never a candidate again. Rows are never rewritten or removed by
//! this program.

use chrono::{DateTime, Local};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::contacts::normalize_email;

const HEADER: [&str; 4] = ["Email", "Timestamp", "Status", "Error"];

#[derive(Debug, thiserror::Error)]
pub enum SentLogError {
    #[error("Failed to read sent log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Sent log {path} is corrupt at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("Failed to append to sent log {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentStatus {
    Sent,
    Failed,
    Skipped,
}

impl SentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SentStatus::Sent => "sent",
            SentStatus::Failed => "failed",
            SentStatus::Skipped => "skipped",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sent" => Some(SentStatus::Sent),
            "failed" => Some(SentStatus::Failed),
            "skipped" => Some(SentStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for SentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outcome row
#[derive(Debug, Clone)]
pub struct SentRecord {
    pub email: String,
    pub timestamp: DateTime<Local>,
    pub status: SentStatus,
    pub error: Option<String>,
}

impl SentRecord {
    pub fn new(email: &str, status: SentStatus) -> Self {
        Self {
            email: email.trim().to_string(),
            timestamp: Local::now(),
            status,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Header names are lowercased before deserializing, which also accepts the
/// `email,status,timestamp,error` layout of older logs.
#[derive(Debug, Deserialize)]
struct LogRow {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

pub struct SentLog {
    path: PathBuf,
}

impl SentLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Addresses (normalized) that already have a `sent` row.
    pub fn load(&self) -> Result<HashSet<String>, SentLogError> {
        Ok(self
            .load_statuses()?
            .into_iter()
            .filter(|(_, status)| *status == SentStatus::Sent)
            .map(|(email, _)| email)
            .collect())
    }

    /// Effective status per normalized address.
    ///
    /// `sent` is sticky; otherwise the latest row wins. A missing log is an
    /// empty map.
    pub fn load_statuses(&self) -> Result<HashMap<String, SentStatus>, SentLogError> {
        let mut statuses = HashMap::new();
        if !self.path.exists() {
            return Ok(statuses);
        }

        let read_err = |source| SentLogError::Read {
            path: self.path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(read_err)?;

        let headers: csv::StringRecord = reader
            .headers()
            .map_err(read_err)?
            .iter()
            .map(str::to_lowercase)
            .collect();
        if headers.is_empty() {
            // Created but never written
            return Ok(statuses);
        }
        if !headers.iter().any(|h| h == "email") || !headers.iter().any(|h| h == "status") {
            return Err(self.corrupt(1, "header must contain Email and Status columns"));
        }
        reader.set_headers(headers.clone());

        for record in reader.records() {
            let record = record.map_err(read_err)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.len() > headers.len() {
                return Err(self.corrupt(
                    line,
                    format!(
                        "{} fields for {} columns (rows joined on one line?)",
                        record.len(),
                        headers.len()
                    ),
                ));
            }

            let row: LogRow = record
                .deserialize(Some(&headers))
                .map_err(|e| self.corrupt(line, e.to_string()))?;

            let email = row
                .email
                .map(|e| normalize_email(&e))
                .filter(|e| !e.is_empty())
                .ok_or_else(|| self.corrupt(line, "row has no email"))?;
            let raw_status = row.status.unwrap_or_default();
            let status = SentStatus::parse(&raw_status)
                .ok_or_else(|| self.corrupt(line, format!("unknown status '{raw_status}'")))?;

            let entry = statuses.entry(email).or_insert(status);
            if *entry != SentStatus::Sent {
                *entry = status;
            }
        }

        Ok(statuses)
    }

    fn corrupt(&self, line: u64, reason: impl Into<String>) -> SentLogError {
        SentLogError::Corrupt {
            path: self.path.clone(),
            line,
            reason: reason.into(),
        }
    }

    /// Append one row, durable before this returns.
    ///
    /// The file handle is opened, written, flushed, synced and dropped within
    /// this call, so a crash later in the run cannot lose the row.
    pub fn append(&self, record: &SentRecord) -> Result<(), SentLogError> {
        let append_err = |source| SentLogError::Append {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(append_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(append_err)?;
        let len = file.metadata().map_err(append_err)?.len();
        let needs_header = len == 0;

        // A hand-edited log may end without a newline
        if len > 0 && !ends_with_newline(&mut file).map_err(append_err)? {
            file.write_all(b"\n").map_err(append_err)?;
        }

        let mut writer = csv::Writer::from_writer(file);
        let timestamp = record.timestamp.to_rfc3339();
        let error = record.error.as_deref().unwrap_or_default();

        let write = |writer: &mut csv::Writer<fs::File>| -> csv::Result<()> {
            if needs_header {
                writer.write_record(HEADER)?;
            }
            writer.write_record([
                record.email.as_str(),
                timestamp.as_str(),
                record.status.as_str(),
                error,
            ])?;
            Ok(())
        };
        write(&mut writer).map_err(|e| append_err(e.into()))?;

        let file = writer
            .into_inner()
            .map_err(|e| append_err(e.into_error()))?;
        file.sync_all().map_err(append_err)?;

        tracing::debug!(
            "Logged {} for {} in {}",
            record.status,
            record.email,
            self.path.display()
        );
        Ok(())
    }
}

fn ends_with_newline(file: &mut fs::File) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_in(dir: &tempfile::TempDir) -> SentLog {
        SentLog::new(dir.path().join("sent_log.csv"))
    }

    #[test]
    fn test_missing_log_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn test_append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);

        log.append(&SentRecord::new("Alice@Acme.com", SentStatus::Sent))
            .unwrap();
        log.append(&SentRecord::new("bob@acme.com", SentStatus::Failed).with_error("550 no such user"))
            .unwrap();

        let sent = log.load().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent.contains("alice@acme.com"));

        let statuses = log.load_statuses().unwrap();
        assert_eq!(statuses.get("bob@acme.com"), Some(&SentStatus::Failed));
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);

        log.append(&SentRecord::new("a@acme.com", SentStatus::Sent)).unwrap();
        log.append(&SentRecord::new("b@acme.com", SentStatus::Sent)).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Email,Timestamp,Status,Error");
        assert!(lines[1].starts_with("a@acme.com,"));
        assert!(lines[1].ends_with(",sent,"));
    }

    #[test]
    fn test_sent_is_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);

        log.append(&SentRecord::new("a@acme.com", SentStatus::Failed)).unwrap();
        log.append(&SentRecord::new("a@acme.com", SentStatus::Sent)).unwrap();
        // Hand-edited logs can contain anything after a send
        log.append(&SentRecord::new("a@acme.com", SentStatus::Failed)).unwrap();

        let statuses = log.load_statuses().unwrap();
        assert_eq!(statuses.get("a@acme.com"), Some(&SentStatus::Sent));
    }

    #[test]
    fn test_failed_then_failed_keeps_latest() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(&dir);

        log.append(&SentRecord::new("a@acme.com", SentStatus::Skipped)).unwrap();
        log.append(&SentRecord::new("a@acme.com", SentStatus::Failed)).unwrap();

        let statuses = log.load_statuses().unwrap();
        assert_eq!(statuses.get("a@acme.com"), Some(&SentStatus::Failed));
    }

    #[test]
    fn test_reads_legacy_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_log.csv");
        fs::write(
            &path,
            "email,status,timestamp,error\n\
             old@acme.com,sent,2025-01-06T09:00:00,\n\
             gone@acme.com,failed,2025-01-06T09:05:00,timeout\n",
        )
        .unwrap();

        let log = SentLog::new(&path);
        let sent = log.load().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent.contains("old@acme.com"));
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_log.csv");
        fs::write(&path, "Email,Timestamp,Status\na@acme.com,2025-01-06,maybe\n").unwrap();

        let err = SentLog::new(&path).load().unwrap_err();
        assert!(matches!(err, SentLogError::Corrupt { line: 2, .. }));
    }

    #[test]
    fn test_header_without_status_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_log.csv");
        fs::write(&path, "Email,Timestamp\na@acme.com,2025-01-06\n").unwrap();

        assert!(SentLog::new(&path).load().is_err());
    }

    #[test]
    fn test_empty_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_log.csv");
        fs::write(&path, "").unwrap();

        let log = SentLog::new(&path);
        assert!(log.load().unwrap().is_empty());
        log.append(&SentRecord::new("a@acme.com", SentStatus::Sent)).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("Email,"));
    }

    #[test]
    fn test_append_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log = SentLog::new(dir.path().join("state").join("sent_log.csv"));
        log.append(&SentRecord::new("a@acme.com", SentStatus::Sent)).unwrap();
        assert_eq!(log.load().unwrap().len(), 1);
    }

    #[test]
    fn test_append_after_missing_final_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_log.csv");
        fs::write(
            &path,
            "Email,Timestamp,Status,Error\na@acme.com,2025-01-06T09:00:00+00:00,sent,",
        )
        .unwrap();

        let log = SentLog::new(&path);
        log.append(&SentRecord::new("b@acme.com", SentStatus::Sent)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().nth(2).unwrap().starts_with("b@acme.com,"));

        let sent = log.load().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent.contains("b@acme.com"));
    }

    #[test]
    fn test_joined_rows_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_log.csv");
        fs::write(
            &path,
            "Email,Timestamp,Status,Error\n\
             a@acme.com,2025-01-06T09:00:00+00:00,sent,b@acme.com,2025-01-06T09:05:00+00:00,sent,\n",
        )
        .unwrap();

        let err = SentLog::new(&path).load().unwrap_err();
        assert!(matches!(err, SentLogError::Corrupt { line: 2, .. }));
    }
}

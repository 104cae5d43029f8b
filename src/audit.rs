//! Append-only per-job outcome log (CSV).
//!
//! One row per processed manifest row:
//! `path, filename, elapsed_seconds, message, completion_timestamp, outcome`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{Error, Result};

/// Header written when the log file is first created.
pub const LOG_HEADER: [&str; 6] = [
    "Filepath",
    "Filename",
    "Elapsed Time",
    "Message",
    "Completion Time",
    "Endstate",
];

/// Completion timestamp layout.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Terminal state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Success,
    Error,
}

/// One audit row. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub path: String,
    pub file_name: String,
    pub elapsed_seconds: f64,
    pub message: String,
    pub completed_at: String,
    pub outcome: Outcome,
}

impl AuditRecord {
    pub fn new(
        path: impl Into<String>,
        file_name: impl Into<String>,
        elapsed: Duration,
        message: impl Into<String>,
        completed_at: DateTime<Local>,
        outcome: Outcome,
    ) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            elapsed_seconds: elapsed.as_secs_f64(),
            message: message.into(),
            completed_at: completed_at.format(TIMESTAMP_FORMAT).to_string(),
            outcome,
        }
    }
}

/// Appends [`AuditRecord`]s to a CSV sink, flushing after every row.
pub struct AuditLogger<W: Write = File> {
    writer: csv::Writer<W>,
}

impl AuditLogger<File> {
    /// Open (or create) the log at `path` for appending.
    ///
    /// A newly created or empty log gets a header row; an existing log is appended to as-is.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| Error::OutputLog {
                path: path.to_path_buf(),
                source,
            })?;

        let fresh = file
            .metadata()
            .map_err(|source| Error::OutputLog {
                path: path.to_path_buf(),
                source,
            })?
            .len()
            == 0;

        let mut logger = Self::from_writer(file);
        if fresh {
            logger.writer.write_record(LOG_HEADER)?;
            logger.writer.flush()?;
        }
        Ok(logger)
    }
}

impl<W: Write> AuditLogger<W> {
    /// Wrap an arbitrary writer. No header is written.
    pub fn from_writer(w: W) -> Self {
        let writer = csv::WriterBuilder::new().has_headers(false).from_writer(w);
        Self { writer }
    }

    /// Append one record and flush it to the sink.
    pub fn append(&mut self, record: &AuditRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    /// Everything appended so far; `append` flushes, so the buffer is complete.
    fn written(log: &AuditLogger<Vec<u8>>) -> anyhow::Result<String> {
        Ok(String::from_utf8(log.writer.get_ref().clone())?)
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 27, 21, 5, 9).unwrap()
    }

    #[test]
    fn serializes_rows_in_log_column_order() -> anyhow::Result<()> {
        let mut log = AuditLogger::from_writer(Vec::new());
        log.append(&AuditRecord::new(
            "/in/a.wav",
            "a.wav",
            Duration::from_millis(1500),
            "Blank file. Skipping file.",
            at(),
            Outcome::Error,
        ))?;
        log.append(&AuditRecord::new(
            "/out/b.vtt",
            "b.vtt",
            Duration::from_secs(2),
            "Successful transcription",
            at(),
            Outcome::Success,
        ))?;

        let text = written(&log)?;
        assert_eq!(
            text,
            "/in/a.wav,a.wav,1.5,Blank file. Skipping file.,2025/06/27 21:05:09,ERROR\n\
             /out/b.vtt,b.vtt,2.0,Successful transcription,2025/06/27 21:05:09,SUCCESS\n"
        );
        Ok(())
    }

    #[test]
    fn messages_with_commas_are_quoted() -> anyhow::Result<()> {
        let mut log = AuditLogger::from_writer(Vec::new());
        log.append(&AuditRecord::new(
            "p",
            "n",
            Duration::ZERO,
            "Duplicate VTT of a, b.wav",
            at(),
            Outcome::Error,
        ))?;
        let text = written(&log)?;
        assert!(text.contains("\"Duplicate VTT of a, b.wav\""));
        Ok(())
    }

    #[test]
    fn header_is_written_only_on_creation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("log.csv");

        let rec = AuditRecord::new("p", "n", Duration::ZERO, "m", at(), Outcome::Success);
        AuditLogger::open(&path)?.append(&rec)?;
        AuditLogger::open(&path)?.append(&rec)?;

        let text = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Filepath,Filename,Elapsed Time,Message,Completion Time,Endstate"
        );
        assert_eq!(text.matches("Filepath").count(), 1);
        Ok(())
    }

    #[test]
    fn uncreatable_log_is_fatal() {
        let err = AuditLogger::open(Path::new("/no/such/dir/log.csv"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::OutputLog { .. }));
    }
}

//! Input manifest (CSV) reading.
//!
//! The manifest is a header row followed by one data row per job. Columns are positional:
//!
//! | index | column                     |
//! |-------|----------------------------|
//! | 0     | source path                |
//! | 1     | source file name           |
//! | 2     | reserved                   |
//! | 3     | responsible party 2        |
//! | 4     | media identifier           |
//! | 5     | media identifier type      |
//! | 6     | title                      |
//! | 7     | origin history             |
//! | 8-11  | local key/value pairs 1, 2 |

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};

use crate::Result;

/// Minimum number of columns a data row must carry.
pub const REQUIRED_COLUMNS: usize = 12;

/// One data row of the input manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub source_path: PathBuf,
    pub source_name: String,
    pub party2: String,
    pub media_identifier: String,
    pub media_identifier_type: String,
    pub title: String,
    pub origin_history: String,
    pub local_key1: String,
    pub local_value1: String,
    pub local_key2: String,
    pub local_value2: String,
}

/// A row that could not be mapped onto [`ManifestRow`].
///
/// We keep whatever path/name the row did carry so the audit record still identifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortRow {
    pub source_path: String,
    pub source_name: String,
    pub columns: usize,
}

impl ManifestRow {
    /// Map a raw CSV record onto a row, by position.
    pub fn from_record(record: &StringRecord) -> std::result::Result<Self, ShortRow> {
        if record.len() < REQUIRED_COLUMNS {
            return Err(ShortRow {
                source_path: record.get(0).unwrap_or_default().to_owned(),
                source_name: record.get(1).unwrap_or_default().to_owned(),
                columns: record.len(),
            });
        }

        let col = |i: usize| record.get(i).unwrap_or_default().to_owned();

        Ok(Self {
            source_path: PathBuf::from(col(0)),
            source_name: col(1),
            party2: col(3),
            media_identifier: col(4),
            media_identifier_type: col(5),
            title: col(6),
            origin_history: col(7),
            local_key1: col(8),
            local_value1: col(9),
            local_key2: col(10),
            local_value2: col(11),
        })
    }

    /// The subtitle file name derived from the source name (`<stem>.vtt`).
    pub fn output_name(&self) -> String {
        let stem = Path::new(&self.source_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{stem}.vtt")
    }
}

/// Streaming reader over a manifest file's data rows.
///
/// A row that fails to parse is yielded as an error and reading continues with the next row.
/// An I/O error ends the stream.
pub struct ManifestReader {
    records: StringRecordsIntoIter<File>,
    done: bool,
}

impl ManifestReader {
    /// Open a manifest and skip its header row.
    ///
    /// Rows may have differing column counts; short rows surface per row, not here.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(crate::Error::ManifestNotFound(path.to_path_buf()));
        }

        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        Ok(Self {
            records: reader.into_records(),
            done: false,
        })
    }
}

impl Iterator for ManifestReader {
    type Item = Result<StringRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let record = self.records.next()?;
        if let Err(err) = &record {
            if matches!(err.kind(), csv::ErrorKind::Io(_)) {
                self.done = true;
            }
        }
        Some(record.map_err(Into::into))
    }
}

/// Count the data rows in a manifest (used for progress reporting).
///
/// Rows that fail to parse still count: the batch turns each one into a job of its own.
pub fn count_rows(path: &Path) -> Result<u64> {
    Ok(ManifestReader::open(path)?.count() as u64)
}

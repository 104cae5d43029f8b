//! FADGI header embedding for WebVTT files.
//!
//! Follows the FADGI *Guidelines for Embedding Metadata in WebVTT Files* (June 7, 2024):
//! the header block goes directly after the `WEBVTT` line, separated from it by one blank line.
//!
//! Output layout:
//!
//! ```text
//! <original line 1, unchanged>
//!
//! Type: caption
//! Language: eng
//! ...header lines...
//! <original lines 2..N, unchanged>
//! ```
//!
//! Embedding is not idempotent; running it twice inserts two blocks.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::metadata::MetadataRecord;

/// Why a header could not be embedded.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("subtitle file does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("expected a .vtt file: {}", .0.display())]
    NotVtt(PathBuf),

    #[error("subtitle file is empty: {}", .0.display())]
    Empty(PathBuf),

    #[error("failed to rewrite subtitle file: {0}")]
    Io(#[from] std::io::Error),
}

/// Embed `record` into the subtitle file, dated today (local time).
pub fn embed(path: &Path, record: &MetadataRecord) -> Result<(), EmbedError> {
    embed_with_date(path, record, Local::now().date_naive())
}

/// Embed `record` into the subtitle file with an explicit `File Creation Date`.
///
/// The rewrite goes through a temporary file in the same directory that replaces the original
/// only once it is fully written.
pub fn embed_with_date(
    path: &Path,
    record: &MetadataRecord,
    created: NaiveDate,
) -> Result<(), EmbedError> {
    if !path.exists() {
        return Err(EmbedError::Missing(path.to_path_buf()));
    }
    if path.extension().and_then(|e| e.to_str()) != Some("vtt") {
        return Err(EmbedError::NotVtt(path.to_path_buf()));
    }

    let original = std::fs::read_to_string(path)?;
    if original.is_empty() {
        return Err(EmbedError::Empty(path.to_path_buf()));
    }

    let embedded = insert_header(&original, &record.header_lines(created));

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    // Temp files are created owner-only; keep the original file's mode.
    tmp.as_file()
        .set_permissions(std::fs::metadata(path)?.permissions())?;
    tmp.write_all(embedded.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Insert `header` after the first line of `original`, preceded by a blank line.
///
/// Everything after the first line is copied byte-for-byte.
fn insert_header(original: &str, header: &[String]) -> String {
    let (first, rest) = match original.find('\n') {
        Some(i) => original.split_at(i + 1),
        None => (original, ""),
    };

    let mut out = String::with_capacity(original.len() + header.len() * 32);
    out.push_str(first);
    if !first.ends_with('\n') {
        out.push('\n');
    }

    out.push('\n');
    for line in header {
        out.push_str(line);
        out.push('\n');
    }

    out.push_str(rest);
    out
}

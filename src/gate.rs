//! Pre-flight checks run before any expensive work is attempted.
//!
//! Checks run in a fixed order and the first failure wins. Each failure has its own
//! [`GateRejection`] so the audit log can tell causes apart.

use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::probe::MediaProbe;

/// Source extensions we accept (exact, case-sensitive, without the leading dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "mov", "mp4", "webm", "m4v", "mpeg4"];

/// Why a file did not pass the gate. The `Display` text is the audit-log reason.
#[derive(Debug, Error)]
pub enum GateRejection {
    #[error("Target filepath does not exist. Skipping file.")]
    Missing,

    #[error("Unable to read file metadata ({0}). Skipping file.")]
    Inaccessible(String),

    #[error("Not a supported A/V file. Skipping file.")]
    UnsupportedExtension,

    #[error("Blank file. Skipping file.")]
    Empty,

    #[error("This file has already been transcribed. Skipping file.")]
    AlreadyTranscribed,

    #[error("Unable to read media container ({0}). Skipping file.")]
    Unreadable(String),

    #[error("No audio tracks to transcribe. Skipping file.")]
    NoAudioTracks,

    #[error("All audio tracks blank. Skipping file.")]
    SilentTracks,
}

/// Run the ordered pre-flight checks for one job.
///
/// `file_name` is the manifest's file name column; its extension is what the whitelist sees.
/// The gate only reads: it never creates, moves, or modifies files.
pub fn check(
    source_path: &Path,
    file_name: &str,
    out_path: &Path,
    probe: &dyn MediaProbe,
) -> Result<(), GateRejection> {
    let meta = match std::fs::metadata(source_path) {
        Ok(meta) => meta,
        Err(err) if matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            return Err(GateRejection::Missing);
        }
        Err(err) => return Err(GateRejection::Inaccessible(err.to_string())),
    };

    let ext = Path::new(file_name).extension().and_then(|e| e.to_str());
    if !ext.is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e)) {
        return Err(GateRejection::UnsupportedExtension);
    }

    if meta.len() == 0 {
        return Err(GateRejection::Empty);
    }

    if out_path.exists() {
        return Err(GateRejection::AlreadyTranscribed);
    }

    let info = probe
        .probe(source_path)
        .map_err(|err| GateRejection::Unreadable(format!("{err:#}")))?;
    debug!(tracks = info.audio_tracks.len(), "probed media container");

    if !info.has_audio() {
        return Err(GateRejection::NoAudioTracks);
    }
    if !info.has_audible_track() {
        return Err(GateRejection::SilentTracks);
    }

    Ok(())
}

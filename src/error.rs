use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// The crate-wide result type for batch-fatal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a whole batch run.
///
/// Per-job failures never surface through this type; they are folded into a
/// [`crate::batch::JobError`] and written to the audit log instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("input manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("unable to create output directory at '{}': {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to open output log at '{}': {source}", .path.display())]
    OutputLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("bad settings line {line_number}: '{line}'")]
    SettingsLine { line_number: usize, line: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

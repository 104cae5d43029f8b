//! `fadgi_scribe` batch-transcribes archival audio/video into WebVTT subtitle files carrying an
//! embedded FADGI metadata header.
//!
//! A CSV manifest drives the run. Each row is one job that goes through
//! metadata validation, pre-flight file checks, transcription, output-integrity checks,
//! subtitle writing, and header embedding, and leaves exactly one row in the audit log.
//! See [`batch::Batch`] for the loop itself.

mod error;

pub use error::{Error, Result};

// Batch loop and per-job bookkeeping.
pub mod audit;
pub mod batch;

// Input manifest and FADGI metadata.
pub mod codes;
pub mod manifest;
pub mod metadata;

// Pre-flight checks and media probing.
pub mod demux;
pub mod gate;
pub mod probe;

// Transcription engines and their configuration.
pub mod backend;
pub mod backends;
pub mod opts;
pub mod transcript;

// Audio decoding for engines that consume raw PCM.
pub mod audio_pipeline;
pub mod decoder;

// Output-integrity checks, subtitle writing, and header embedding.
pub mod content;
pub mod embed;
pub mod vtt_encoder;

// Logging configuration.
#[cfg(feature = "logging")]
pub mod logging;

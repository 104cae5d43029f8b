use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use whisper_rs::{WhisperContext, WhisperState};

use crate::backend::TranscriptionEngine;
use crate::decoder::decode_file;
use crate::opts::Opts;
use crate::transcript::TranscriptResult;

mod ctx;
mod segments;

use segments::{collect_result, run_whisper_full};

/// Built-in engine powered by `whisper-rs` / `whisper.cpp`.
///
/// The model is loaded once. Each job decodes the whole file to 16 kHz mono and runs a single
/// `full()` pass over it.
pub struct WhisperEngine {
    ctx: WhisperContext,

    /// Decoder state of the last run, kept until [`TranscriptionEngine::release`].
    last_state: Option<WhisperState>,
}

impl WhisperEngine {
    /// Load the model named by `opts.model_path` onto `opts.device`.
    pub fn new(opts: &Opts) -> Result<Self> {
        let ctx = ctx::get_context(&opts.model_path, opts.device)?;
        Ok(Self {
            ctx,
            last_state: None,
        })
    }
}

impl TranscriptionEngine for WhisperEngine {
    fn transcribe(&mut self, path: &Path, opts: &Opts) -> Result<TranscriptResult> {
        let samples = decode_file(path)
            .with_context(|| format!("failed to decode audio from '{}'", path.display()))?;

        if samples.is_empty() {
            return Ok(TranscriptResult::from_segments(
                opts.language.clone().unwrap_or_default(),
                Vec::new(),
            ));
        }

        let state = run_whisper_full(&self.ctx, opts, &samples)?;
        let result = collect_result(&state, opts)?;
        self.last_state = Some(state);

        debug!(
            path = %path.display(),
            segments = result.segments.len(),
            language = %result.language,
            "whisper run complete"
        );
        Ok(result)
    }

    fn release(&mut self) {
        self.last_state = None;
    }
}

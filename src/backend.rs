use std::path::Path;

use anyhow::Result;

use crate::opts::Opts;
use crate::transcript::TranscriptResult;

/// Pluggable transcription engine used by [`crate::batch::Batch`].
///
/// An engine is loaded once per process and reused for every job. The batch loop calls
/// [`TranscriptionEngine::transcribe`] synchronously, once per job, and never retries: any
/// error is a terminal failure for that job.
///
/// Engines with different native call shapes (single file, batched, remote) all fit behind this
/// one method, so the pipeline never has to know which engine it is driving.
pub trait TranscriptionEngine {
    /// Transcribe the audio of the media file at `path`.
    fn transcribe(&mut self, path: &Path, opts: &Opts) -> Result<TranscriptResult>;

    /// Release transient device memory tied to the previous call.
    ///
    /// Called after every transcription attempt, whatever its outcome, before the next job
    /// starts. Engines without per-call caches can rely on the default no-op.
    fn release(&mut self) {}
}

impl<E: TranscriptionEngine + ?Sized> TranscriptionEngine for Box<E> {
    fn transcribe(&mut self, path: &Path, opts: &Opts) -> Result<TranscriptResult> {
        (**self).transcribe(path, opts)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::transcript::{Segment, TranscriptResult};

/// Serializes segments into WebVTT.
///
/// Design:
/// - We stream output directly to a `Write` implementation.
/// - The `WEBVTT` header is written on the first segment, or on `close` when there were no
///   segments, so every closed encoder leaves a well-formed file behind.
pub struct VttEncoder<W: Write> {
    /// The underlying writer we stream VTT into.
    w: W,

    /// Whether we've written the `WEBVTT` header.
    started: bool,

    /// Whether the encoder has been closed.
    closed: bool,
}

impl<W: Write> VttEncoder<W> {
    /// Create a new VTT encoder that writes to the provided writer.
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            closed: false,
        }
    }

    /// Write the WebVTT header if we haven't written it yet.
    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            // WebVTT files begin with a mandatory header line followed by a blank line.
            self.w.write_all(b"WEBVTT\n\n")?;
            self.started = true;
        }
        Ok(())
    }

    /// Write a single cue.
    pub fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            anyhow::bail!("cannot write segment: encoder is already closed");
        }

        self.start_if_needed()?;

        let start = format_timestamp_vtt(seg.start_seconds);
        let end = format_timestamp_vtt(seg.end_seconds);

        writeln!(&mut self.w, "{start} --> {end}")?;
        writeln!(&mut self.w, "{}", seg.text.trim())?;

        // Blank line separates cues.
        writeln!(&mut self.w)?;

        Ok(())
    }

    /// Write the header if needed and flush. This is idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;
        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

/// Write a transcript to a hidden `.vtt` file in `dir`.
///
/// The file is deleted when the handle drops; callers move it into place with
/// [`NamedTempFile::persist_noclobber`] once it is complete.
pub fn stage_subtitle_file(dir: &Path, result: &TranscriptResult) -> Result<NamedTempFile> {
    let mut staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".vtt")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create subtitle file in '{}'", dir.display()))?;

    // Temp files start owner-only; subtitles are ordinary deliverables.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }

    {
        let mut encoder = VttEncoder::new(BufWriter::new(staged.as_file_mut()));
        for seg in &result.segments {
            encoder.write_segment(seg)?;
        }
        encoder.close()?;
    }

    Ok(staged)
}

/// Format seconds into a WebVTT timestamp (`HH:MM:SS.mmm`).
///
/// We round to the nearest millisecond to reduce drift when converting from `f32`.
fn format_timestamp_vtt(seconds: f32) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;

    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;

    let s = total_s % 60;
    let total_m = total_s / 60;

    let m = total_m % 60;
    let h = total_m / 60;

    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

// src/demux.rs

//! Demux helpers for Symphonia.
//!
//! This module keeps container probing and packet iteration logic isolated from the
//! gate's probe and the engine's decoder.
//!
//! Responsibilities:
//! - Open a media file as a *seekable* source (many MP4/MOV files keep `moov` at the end)
//! - Enumerate audio tracks
//! - Provide a `next_packet` helper that treats IO errors as end-of-stream

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, Track};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Open a media file and probe its container.
///
/// The file extension (if any) is passed to Symphonia as a probe hint.
pub fn open_container(path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open media file '{}'", path.display()))?;

    let mss_opts = MediaSourceStreamOptions {
        // Symphonia expects a power-of-two buffer > 32KiB for good probing behavior.
        buffer_len: 256 * 1024,
    };
    let mss = MediaSourceStream::new(Box::new(file), mss_opts);

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format_opts: FormatOptions = Default::default();
    let metadata_opts: MetadataOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| anyhow!(e))
        .context("failed to probe media container")?;

    Ok(probed.format)
}

/// Returns `true` for tracks that carry decodable audio.
///
/// Policy: codec is known and a sample rate is present. Video and data tracks either
/// report no codec or no sample rate.
pub fn is_audio_track(track: &Track) -> bool {
    track.codec_params.codec != CODEC_TYPE_NULL && track.codec_params.sample_rate.is_some()
}

/// All audio tracks in container order.
pub fn audio_tracks(format: &dyn FormatReader) -> Vec<Track> {
    format
        .tracks()
        .iter()
        .filter(|t| is_audio_track(t))
        .cloned()
        .collect()
}

/// Read the next packet, treating IO errors as "end of stream".
///
/// - `Ok(None)` means EOF or stream ended
/// - other errors are surfaced with context
pub fn next_packet(format: &mut dyn FormatReader) -> Result<Option<Packet>> {
    match format.next_packet() {
        Ok(p) => Ok(Some(p)),
        Err(SymphoniaError::IoError(_)) => Ok(None),
        Err(e) => Err(anyhow!(e)).context("failed reading packet"),
    }
}

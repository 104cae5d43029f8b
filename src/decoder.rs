// src/decoder.rs

//! Decode a media file (audio or video container) into mono `f32` at the engine's target
//! sample rate.
//!
//! - `demux` handles opening + packet iteration
//! - codec setup and Symphonia's decode error model live here
//! - `audio_pipeline` handles PCM normalization (downmix + resample)
//!
//! Inputs are opened *seekable* so containers that keep their index at the end of the file
//! (MP4/MOV with a trailing `moov`) decode correctly.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{Packet, Track};
use tracing::debug;

use crate::audio_pipeline::AudioPipeline;
use crate::demux::{audio_tracks, next_packet, open_container};

/// Decode the first audio track of `path` that has a non-zero frame count (or the first audio
/// track if none report one) into mono 16 kHz samples.
pub fn decode_file(path: &Path) -> Result<Vec<f32>> {
    let mut format = open_container(path)?;

    let tracks = audio_tracks(format.as_ref());
    let track = tracks
        .iter()
        .find(|t| t.codec_params.n_frames.is_some_and(|n| n > 0))
        .or_else(|| tracks.first())
        .cloned()
        .ok_or_else(|| anyhow!("no audio track found"))?;

    let mut decoder = make_decoder_for_track(&track)?;
    let mut pipeline = AudioPipeline::new();
    let mut skipped = 0usize;

    while let Some(packet) = next_packet(format.as_mut())? {
        // Ignore packets from other tracks.
        if packet.track_id() != track.id {
            continue;
        }

        let decoded = decode_packet_and_then(&mut decoder, &packet, |buf| {
            pipeline
                .push(&buf)
                .context("audio pipeline failed while processing decoded samples")
        })?;
        if !decoded {
            skipped += 1;
        }
    }

    let samples = pipeline.finish().context("audio pipeline failed during finish")?;
    debug!(
        path = %path.display(),
        samples = samples.len(),
        skipped_packets = skipped,
        "decoded media file"
    );

    Ok(samples)
}

/// Create a decoder for the given audio track from Symphonia's default codec registry.
fn make_decoder_for_track(track: &Track) -> Result<Box<dyn Decoder>> {
    let decoder_opts: DecoderOptions = Default::default();

    symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| anyhow!(e))
        .context("failed to create decoder for audio track")
}

/// Decode a packet and immediately hand the decoded buffer to a callback.
///
/// Return value semantics:
/// - `Ok(true)`  → a decoded audio buffer was produced and `on_decoded` ran
/// - `Ok(false)` → packet was skipped (recoverable condition)
/// - `Err(_)`    → fatal decoder error
///
/// Error handling policy:
/// - `DecodeError` → skip bad frame (common with some codecs)
/// - `IoError`     → treat as end-of-stream
/// - other errors  → bubble up with context
fn decode_packet_and_then(
    decoder: &mut Box<dyn Decoder>,
    packet: &Packet,
    mut on_decoded: impl FnMut(AudioBufferRef<'_>) -> Result<()>,
) -> Result<bool> {
    match decoder.decode(packet) {
        Ok(buf) => {
            on_decoded(buf)?;
            Ok(true)
        }

        // Recoverable: corrupted frame, but decoding can continue.
        Err(SymphoniaError::DecodeError(_)) => Ok(false),

        Err(SymphoniaError::IoError(_)) => Ok(false),

        Err(e) => Err(anyhow!(e)).context("decoder failure"),
    }
}

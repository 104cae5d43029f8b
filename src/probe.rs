//! Container inspection without decoding audio.
//!
//! The gate only needs two facts about a candidate file: how many audio tracks it has and
//! whether any of them has a non-zero duration. [`MediaProbe`] is the seam; the default
//! implementation reads container headers with Symphonia.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use symphonia::core::formats::Track;

use crate::demux::{audio_tracks, next_packet, open_container};

/// Summary of one audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrackInfo {
    pub track_id: u32,
    pub duration: Duration,
}

/// What a probe learned about a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub audio_tracks: Vec<AudioTrackInfo>,
}

impl MediaInfo {
    pub fn has_audio(&self) -> bool {
        !self.audio_tracks.is_empty()
    }

    pub fn has_audible_track(&self) -> bool {
        self.audio_tracks.iter().any(|t| !t.duration.is_zero())
    }
}

/// Inspects a file's container metadata.
pub trait MediaProbe {
    fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// [`MediaProbe`] backed by Symphonia's container readers.
///
/// Track durations come from the container header. When a header does not carry a frame count
/// (common for VBR MP3 without a Xing/Info frame), we sum packet durations instead; packets are
/// demuxed but never decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaProbe;

impl MediaProbe for SymphoniaProbe {
    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let mut format = open_container(path)?;
        let tracks = audio_tracks(format.as_ref());

        let mut known = HashMap::new();
        let mut unknown = Vec::new();
        for track in &tracks {
            match header_duration(track) {
                Some(d) => {
                    known.insert(track.id, d);
                }
                None => unknown.push(track.id),
            }
        }

        if !unknown.is_empty() {
            let mut frames: HashMap<u32, u64> = unknown.iter().map(|id| (*id, 0)).collect();
            while let Some(packet) = next_packet(format.as_mut())? {
                if let Some(n) = frames.get_mut(&packet.track_id()) {
                    *n += packet.dur;
                }
            }

            for track in tracks.iter().filter(|t| unknown.contains(&t.id)) {
                let n = frames.get(&track.id).copied().unwrap_or(0);
                known.insert(track.id, frames_to_duration(n, track));
            }
        }

        let audio_tracks = tracks
            .iter()
            .map(|t| AudioTrackInfo {
                track_id: t.id,
                duration: known.get(&t.id).copied().unwrap_or_default(),
            })
            .collect();

        Ok(MediaInfo { audio_tracks })
    }
}

fn header_duration(track: &Track) -> Option<Duration> {
    let n_frames = track.codec_params.n_frames?;
    Some(frames_to_duration(n_frames, track))
}

fn frames_to_duration(n_frames: u64, track: &Track) -> Duration {
    if let Some(tb) = track.codec_params.time_base {
        let t = tb.calc_time(n_frames);
        return Duration::from_secs(t.seconds) + Duration::from_secs_f64(t.frac);
    }

    match track.codec_params.sample_rate {
        Some(rate) if rate > 0 => Duration::from_secs_f64(n_frames as f64 / rate as f64),
        _ => Duration::ZERO,
    }
}

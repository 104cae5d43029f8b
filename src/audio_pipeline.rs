//! Audio normalization for the transcription engine.
//!
//! Responsibilities:
//! - Convert Symphonia-decoded PCM into interleaved `f32`
//! - Downmix to mono
//! - Resample to the engine's target sample rate (when needed)
//! - Accumulate the whole file's samples (the engine runs one full pass per file)
//!
//! `finish()` must be called at end-of-stream to flush any remaining resampler input.
//! Resampled output is aligned with the source: the resampler's leading delay is dropped and
//! the tail is flushed, so `n` source frames yield `round(n * ratio)` output frames.

use anyhow::{Context, Result, anyhow, bail};
use rubato::{Resampler, SincFixedIn, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

/// Target mono sample rate (Hz) expected by whisper.cpp.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Source frames fed to rubato per `process()` call.
const RESAMPLE_BLOCK_FRAMES: usize = 2048;

/// Upper bound on silent blocks pushed by `finish()` to drain the resampler delay.
const MAX_FLUSH_BLOCKS: usize = 4;

/// Converts decoded audio into one contiguous mono 16 kHz buffer.
#[derive(Default)]
pub struct AudioPipeline {
    // Scratch buffer used to copy decoded PCM into an interleaved `Vec<f32>`.
    sample_buf: Option<SampleBuffer<f32>>,

    // Frame capacity `sample_buf` was allocated for.
    sample_buf_frames: u64,

    // Lazily initialized resampler (only needed when the source rate != 16 kHz).
    resampler: Option<SincFixedIn<f32>>,

    // Mono source samples waiting for a full rubato block.
    pending: Vec<f32>,

    // Target rate over source rate, set with the resampler.
    ratio: f64,

    // Source frames handed to the resampler path, padding excluded.
    fed_frames: u64,

    // Leading resampler output frames still to be dropped.
    delay_left: usize,

    // Resampled frames kept in `out`.
    resampled: usize,

    // Mono samples at the target rate.
    out: Vec<f32>,
}

impl AudioPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one decoded Symphonia buffer through downmix + resample.
    pub fn push(&mut self, decoded: &AudioBufferRef<'_>) -> Result<()> {
        let (interleaved, src_rate, channels) = self.to_interleaved(decoded)?;
        let mono = downmix_to_mono(&interleaved, channels);

        if src_rate == TARGET_SAMPLE_RATE {
            self.out.extend_from_slice(&mono);
            return Ok(());
        }

        self.ensure_resampler(src_rate)?;
        self.feed(&mono)
    }

    /// Queue mono source samples for the resampler, processing every full block.
    fn feed(&mut self, mono: &[f32]) -> Result<()> {
        self.fed_frames += mono.len() as u64;
        self.pending.extend_from_slice(mono);

        while self.pending.len() >= RESAMPLE_BLOCK_FRAMES {
            let block: Vec<f32> = self.pending.drain(..RESAMPLE_BLOCK_FRAMES).collect();
            self.resample_block(block)?;
        }

        Ok(())
    }

    /// Flush the resampler tail and return every sample produced.
    pub fn finish(mut self) -> Result<Vec<f32>> {
        if self.resampler.is_none() {
            return Ok(self.out);
        }
        let expected = (self.fed_frames as f64 * self.ratio).round() as usize;

        if !self.pending.is_empty() {
            // rubato expects exact block sizes; pad the remainder with silence.
            let mut block = std::mem::take(&mut self.pending);
            block.resize(RESAMPLE_BLOCK_FRAMES, 0.0);
            self.resample_block(block)?;
        }

        // Push silence through until the delayed tail has come out.
        let mut flushes = 0;
        while self.resampled < expected {
            if flushes > MAX_FLUSH_BLOCKS {
                bail!(
                    "resampler produced {} of {expected} frames after flushing",
                    self.resampled
                );
            }
            self.resample_block(vec![0.0; RESAMPLE_BLOCK_FRAMES])?;
            flushes += 1;
        }

        let excess = self.resampled - expected;
        self.out.truncate(self.out.len() - excess);
        Ok(self.out)
    }

    fn to_interleaved(&mut self, decoded: &AudioBufferRef<'_>) -> Result<(Vec<f32>, u32, usize)> {
        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            bail!("decoded audio had zero channels");
        }

        // Reallocate the scratch buffer if a later packet is larger than the first one.
        let needed = decoded.capacity() as u64;
        if self.sample_buf.is_none() || needed > self.sample_buf_frames {
            self.sample_buf = Some(SampleBuffer::<f32>::new(needed, spec));
            self.sample_buf_frames = needed;
        }

        let buf = self
            .sample_buf
            .as_mut()
            .ok_or_else(|| anyhow!("sample buffer not initialized"))?;
        buf.copy_interleaved_ref(decoded.clone());

        Ok((buf.samples().to_vec(), spec.rate, channels))
    }

    fn ensure_resampler(&mut self, src_rate: u32) -> Result<()> {
        if self.resampler.is_some() {
            return Ok(());
        }

        let ratio = TARGET_SAMPLE_RATE as f64 / src_rate as f64;
        let rs = SincFixedIn::<f32>::new(
            ratio,
            2.0,
            rubato::SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: rubato::SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
            RESAMPLE_BLOCK_FRAMES,
            1, // mono
        )
        .map_err(|e| anyhow!(e))
        .context("failed to init resampler")?;

        self.ratio = ratio;
        self.delay_left = rs.output_delay();
        self.resampler = Some(rs);
        Ok(())
    }

    fn resample_block(&mut self, block: Vec<f32>) -> Result<()> {
        let rs = self
            .resampler
            .as_mut()
            .ok_or_else(|| anyhow!("resampler not initialized"))?;

        let input = vec![block];
        let out = rs
            .process(&input, None)
            .map_err(|e| anyhow!(e))
            .context("resampler process failed")?;

        let [mono] = out.as_slice() else {
            bail!("expected mono output from resampler");
        };

        let skip = self.delay_left.min(mono.len());
        self.delay_left -= skip;
        self.out.extend_from_slice(&mono[skip..]);
        self.resampled += mono.len() - skip;
        Ok(())
    }
}

/// Downmix interleaved samples into mono by averaging channels.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

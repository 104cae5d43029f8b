use anyhow::{Context, Result, anyhow};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperSegment, WhisperState};

use crate::opts::{Opts, Task};
use crate::transcript::{Segment, TranscriptResult};

/// Passed to whisper.cpp to request language detection.
const AUTO_LANGUAGE: &str = "auto";

/// whisper.cpp reports segment timestamps in centiseconds (10 ms units).
fn centiseconds_to_seconds(t: i64) -> f32 {
    t.max(0) as f32 / 100.0
}

pub(super) fn to_segment(segment: &WhisperSegment) -> Result<Segment> {
    let text = segment
        .to_str()
        .context("failed to get segment text")?
        .to_owned();

    Ok(Segment {
        start_seconds: centiseconds_to_seconds(segment.start_timestamp()),
        end_seconds: centiseconds_to_seconds(segment.end_timestamp()),
        text,
    })
}

fn build_full_params(opts: &Opts) -> FullParams<'_, '_> {
    let strategy = match opts.beam_size {
        Some(beam_size) => SamplingStrategy::BeamSearch {
            beam_size,
            patience: opts.patience.unwrap_or(-1.0),
        },
        None => SamplingStrategy::Greedy {
            best_of: opts.best_of.unwrap_or(1),
        },
    };
    let mut params = FullParams::new(strategy);

    params.set_n_threads(num_cpus::get() as i32);
    params.set_translate(opts.task == Task::Translate);
    params.set_language(Some(opts.language.as_deref().unwrap_or(AUTO_LANGUAGE)));
    params.set_no_context(!opts.condition_on_previous_text);
    params.set_single_segment(false);

    // First rung of the ladder is the starting temperature; the step to the second rung is
    // the fallback increment.
    let first = opts.temperature.first().copied().unwrap_or(0.0);
    let inc = opts
        .temperature
        .get(1)
        .map(|second| second - first)
        .unwrap_or(0.0);
    params.set_temperature(first);
    params.set_temperature_inc(inc);

    params.set_logprob_thold(opts.logprob_threshold);
    params.set_no_speech_thold(opts.no_speech_threshold);
    params.set_suppress_blank(opts.suppress_blank);
    params.set_no_timestamps(opts.without_timestamps);
    params.set_max_initial_ts(opts.max_initial_timestamp);
    params.set_token_timestamps(opts.word_timestamps);

    if let Some(penalty) = opts.length_penalty {
        params.set_length_penalty(penalty);
    }
    if let Some(max_tokens) = opts.sample_len {
        params.set_max_tokens(max_tokens);
    }
    if let Some(prompt) = opts.initial_prompt.as_deref() {
        params.set_initial_prompt(prompt);
    }

    params.set_print_progress(opts.verbose);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params
}

pub(super) fn run_whisper_full(
    ctx: &WhisperContext,
    opts: &Opts,
    samples: &[f32],
) -> Result<WhisperState> {
    let params = build_full_params(opts);

    let mut state = ctx
        .create_state()
        .context("failed to create whisper state")?;

    state
        .full(params, samples)
        .context("failed to run whisper full()")?;

    Ok(state)
}

/// Collect every segment of a finished run along with the language it was decoded in.
pub(super) fn collect_result(state: &WhisperState, opts: &Opts) -> Result<TranscriptResult> {
    let segments = state
        .as_iter()
        .map(|s| to_segment(&s))
        .collect::<Result<Vec<_>>>()?;

    let language = match opts.language.as_deref() {
        Some(lang) => lang.to_owned(),
        None => {
            let id = state.full_lang_id_from_state();
            whisper_rs::get_lang_str(id)
                .ok_or_else(|| anyhow!("whisper reported unknown language id {id}"))?
                .to_owned()
        }
    };

    Ok(TranscriptResult::from_segments(language, segments))
}

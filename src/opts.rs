//! Engine configuration.
//!
//! [`Opts`] is *library-level configuration*, not CLI flags directly. Batch operators supply it
//! as a plain `key=value` settings file; [`parse_settings`] coerces each value and
//! [`Opts::from_settings`] maps the recognized keys onto typed fields. Anything left unset falls
//! back to the engine defaults below.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use crate::{Error, Result};

/// Default whisper.cpp model file.
pub const DEFAULT_MODEL_PATH: &str = "./models/ggml-large-v3.bin";

/// Default temperature fallback ladder.
pub const DEFAULT_TEMPERATURES: &[f32] = &[0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

/// Keys the settings format knows about but the bundled engine cannot honor.
const UNSUPPORTED_KEYS: &[&str] = &[
    "prefix",
    "suppress_tokens",
    "clip_timestamps",
    "hallucination_silence_threshold",
];

/// A coerced settings value.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl SettingValue {
    /// Coerce a raw value: boolean literal, then integer, then float, else string.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "True" | "true" => return SettingValue::Bool(true),
            "False" | "false" => return SettingValue::Bool(false),
            _ => {}
        }

        if let Ok(i) = raw.parse::<i64>() {
            return SettingValue::Int(i);
        }

        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => SettingValue::Float(f),
            _ => SettingValue::Str(raw.to_owned()),
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_i32(&self) -> Option<i32> {
        match self {
            SettingValue::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }

    fn as_f32(&self) -> Option<f32> {
        match self {
            SettingValue::Int(i) => Some(*i as f32),
            SettingValue::Float(f) => Some(*f as f32),
            _ => None,
        }
    }

    fn as_text(&self) -> String {
        match self {
            SettingValue::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Int(i) => write!(f, "{i}"),
            SettingValue::Float(x) => write!(f, "{x}"),
            SettingValue::Str(s) => f.write_str(s),
        }
    }
}

/// Parsed settings, keyed by setting name.
pub type Settings = BTreeMap<String, SettingValue>;

/// Parse a `key=value` settings document.
///
/// Blank lines and `#` comments are skipped. The value is everything after the first `=`.
/// Any other line without `=` is an error.
pub fn parse_settings(text: &str) -> Result<Settings> {
    let mut settings = Settings::new();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(Error::SettingsLine {
                line_number: idx + 1,
                line: line.to_owned(),
            });
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(Error::SettingsLine {
                line_number: idx + 1,
                line: line.to_owned(),
            });
        }

        let value = SettingValue::coerce(value.trim());
        debug!(key, %value, "engine setting");
        settings.insert(key.to_owned(), value);
    }

    Ok(settings)
}

/// Transcribe verbatim or translate to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Task {
    #[default]
    Transcribe,
    Translate,
}

/// Which compute device the engine should load onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Gpu,
    Cpu,
}

/// Options that control how a transcription is performed.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    /// Model file the engine loads once at startup.
    pub model_path: String,

    pub device: Device,

    pub task: Task,

    /// Language override (e.g. `"en"`). When `None`, the engine auto-detects.
    pub language: Option<String>,

    /// Maximum tokens sampled per segment.
    pub sample_len: Option<i32>,

    /// Candidates when sampling with non-zero temperature (greedy decoding).
    pub best_of: Option<i32>,

    /// Beam width. When set, beam search is used instead of greedy decoding.
    pub beam_size: Option<i32>,

    /// Beam search patience.
    pub patience: Option<f32>,

    pub length_penalty: Option<f32>,

    /// Text prompt that conditions the first window.
    pub initial_prompt: Option<String>,

    pub suppress_blank: bool,

    pub without_timestamps: bool,

    pub max_initial_timestamp: f32,

    /// Half-precision inference. Engines that fix precision in the model file ignore this.
    pub fp16: bool,

    /// Temperature fallback ladder, tried in order when decoding fails thresholds.
    pub temperature: Vec<f32>,

    pub logprob_threshold: f32,

    pub no_speech_threshold: f32,

    pub condition_on_previous_text: bool,

    pub word_timestamps: bool,

    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_owned(),
            device: Device::Gpu,
            task: Task::Transcribe,
            language: None,
            sample_len: None,
            best_of: None,
            beam_size: None,
            patience: None,
            length_penalty: None,
            initial_prompt: None,
            suppress_blank: true,
            without_timestamps: false,
            max_initial_timestamp: 1.0,
            fp16: true,
            temperature: DEFAULT_TEMPERATURES.to_vec(),
            logprob_threshold: -1.0,
            no_speech_threshold: 0.6,
            condition_on_previous_text: false,
            word_timestamps: false,
            verbose: false,
        }
    }
}

impl Opts {
    /// Load options from an optional settings file.
    ///
    /// A missing path (or a path that does not exist) yields defaults. A malformed file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            warn!(path = %path.display(), "engine settings file not found; using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_settings(&parse_settings(&text)?))
    }

    /// Map parsed settings onto options. Unknown keys and mistyped values are logged and skipped.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut opts = Self::default();

        for (key, value) in settings {
            let applied = opts.apply(key, value);
            if !applied {
                if UNSUPPORTED_KEYS.contains(&key.as_str()) {
                    warn!(key = key.as_str(), "engine setting not supported by this engine; ignored");
                } else {
                    warn!(key = key.as_str(), %value, "unrecognized or mistyped engine setting; ignored");
                }
            }
        }

        opts
    }

    fn apply(&mut self, key: &str, value: &SettingValue) -> bool {
        fn set<T>(slot: &mut T, v: Option<T>) -> bool {
            match v {
                Some(v) => {
                    *slot = v;
                    true
                }
                None => false,
            }
        }

        match key {
            "model" => {
                self.model_path = value.as_text();
                true
            }
            "device" => set(&mut self.device, parse_device(&value.as_text())),
            "task" => set(&mut self.task, parse_task(&value.as_text())),
            "language" => {
                let text = value.as_text();
                self.language = (!text.is_empty() && text != "None").then_some(text);
                true
            }
            "sample_len" => set(&mut self.sample_len, value.as_i32().map(Some)),
            "best_of" => set(&mut self.best_of, value.as_i32().map(Some)),
            "beam_size" => set(&mut self.beam_size, value.as_i32().map(Some)),
            "patience" => set(&mut self.patience, value.as_f32().map(Some)),
            "length_penalty" => set(&mut self.length_penalty, value.as_f32().map(Some)),
            "prompt" | "initial_prompt" => {
                self.initial_prompt = Some(value.as_text());
                true
            }
            "suppress_blank" => set(&mut self.suppress_blank, value.as_bool()),
            "without_timestamps" => set(&mut self.without_timestamps, value.as_bool()),
            "max_initial_timestamp" => set(&mut self.max_initial_timestamp, value.as_f32()),
            "fp16" => set(&mut self.fp16, value.as_bool()),
            "temperature" => set(&mut self.temperature, parse_temperatures(value)),
            "logprob_threshold" => set(&mut self.logprob_threshold, value.as_f32()),
            "no_speech_threshold" => set(&mut self.no_speech_threshold, value.as_f32()),
            "condition_on_previous_text" => {
                set(&mut self.condition_on_previous_text, value.as_bool())
            }
            "word_timestamps" => set(&mut self.word_timestamps, value.as_bool()),
            "verbose" => set(&mut self.verbose, value.as_bool()),
            _ => false,
        }
    }
}

fn parse_device(s: &str) -> Option<Device> {
    match s {
        "cpu" => Some(Device::Cpu),
        "gpu" | "cuda" => Some(Device::Gpu),
        s if s.starts_with("cuda:") => Some(Device::Gpu),
        _ => None,
    }
}

fn parse_task(s: &str) -> Option<Task> {
    match s {
        "transcribe" => Some(Task::Transcribe),
        "translate" => Some(Task::Translate),
        _ => None,
    }
}

/// Accept a single number or a list such as `(0.0, 0.2, 0.4)` / `0.0,0.2`.
fn parse_temperatures(value: &SettingValue) -> Option<Vec<f32>> {
    if let Some(t) = value.as_f32() {
        return Some(vec![t]);
    }

    let SettingValue::Str(s) = value else {
        return None;
    };

    let inner = s.trim().trim_start_matches(['(', '[']).trim_end_matches([')', ']']);
    let ladder = inner
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<f32>().ok())
        .collect::<Option<Vec<_>>>()?;

    (!ladder.is_empty()).then_some(ladder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_values() {
        assert_eq!(SettingValue::coerce("True"), SettingValue::Bool(true));
        assert_eq!(SettingValue::coerce("false"), SettingValue::Bool(false));
        assert_eq!(SettingValue::coerce("5"), SettingValue::Int(5));
        assert_eq!(SettingValue::coerce("-1.5"), SettingValue::Float(-1.5));
        assert_eq!(SettingValue::coerce("en"), SettingValue::Str("en".into()));
        assert_eq!(SettingValue::coerce("inf"), SettingValue::Str("inf".into()));
    }

    #[test]
    fn parses_lines_and_skips_comments() -> anyhow::Result<()> {
        let settings = parse_settings(
            "# engine\nbeam_size=5\n\nlanguage = en\ninitial_prompt=a=b\n",
        )?;
        assert_eq!(settings["beam_size"], SettingValue::Int(5));
        assert_eq!(settings["language"], SettingValue::Str("en".into()));
        assert_eq!(settings["initial_prompt"], SettingValue::Str("a=b".into()));
        Ok(())
    }

    #[test]
    fn line_without_separator_is_an_error() {
        let err = parse_settings("beam_size=5\nbogus\n").unwrap_err();
        match err {
            Error::SettingsLine { line_number, line } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "bogus");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn maps_settings_onto_opts() -> anyhow::Result<()> {
        let settings = parse_settings(
            "model=/m/ggml-base.bin\ndevice=cpu\ntask=translate\nbeam_size=5\npatience=1\n\
             temperature=(0.0, 0.5)\nno_speech_threshold=0.4\nfp16=False\nlanguage=None\n",
        )?;
        let opts = Opts::from_settings(&settings);

        assert_eq!(opts.model_path, "/m/ggml-base.bin");
        assert_eq!(opts.device, Device::Cpu);
        assert_eq!(opts.task, Task::Translate);
        assert_eq!(opts.beam_size, Some(5));
        assert_eq!(opts.patience, Some(1.0));
        assert_eq!(opts.temperature, vec![0.0, 0.5]);
        assert_eq!(opts.no_speech_threshold, 0.4);
        assert!(!opts.fp16);
        assert_eq!(opts.language, None);
        Ok(())
    }

    #[test]
    fn mistyped_and_unknown_keys_keep_defaults() -> anyhow::Result<()> {
        let settings = parse_settings("beam_size=wide\nsuppress_tokens=-1\nshiny=1\n")?;
        assert_eq!(Opts::from_settings(&settings), Opts::default());
        Ok(())
    }

    #[test]
    fn single_temperature_disables_the_ladder() {
        assert_eq!(
            parse_temperatures(&SettingValue::Float(0.3)),
            Some(vec![0.3])
        );
        assert_eq!(parse_temperatures(&SettingValue::Str("hot".into())), None);
    }

    #[test]
    fn load_without_file_uses_defaults() -> anyhow::Result<()> {
        assert_eq!(Opts::load(None)?, Opts::default());
        assert_eq!(
            Opts::load(Some(Path::new("/no/such/settings.txt")))?,
            Opts::default()
        );
        Ok(())
    }
}

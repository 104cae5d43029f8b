/// Built-in transcription engines.
#[cfg(feature = "whisper")]
pub mod whisper;

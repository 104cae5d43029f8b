//! The sequential batch loop.
//!
//! Every manifest row is one job. A job walks a strictly linear state sequence
//!
//! ```text
//! Pending -> MetadataBuilt -> GatePassed -> Transcribed -> ContentChecked -> Written -> Embedded
//! ```
//!
//! and ends with exactly one audit record: `SUCCESS` after `Embedded`, or `ERROR` at the first
//! stage that fails. A failing job never aborts the batch; only setup errors do.
//!
//! The subtitle is written and embedded under a hidden temporary name and only moved to
//! `<stem>.vtt` once complete, so a job that fails leaves no output file and is retried on the
//! next run.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::audit::{AuditLogger, AuditRecord, Outcome};
use crate::backend::TranscriptionEngine;
use crate::content::{ContentError, DuplicateDetector};
use crate::embed::{EmbedError, embed};
use crate::gate::{self, GateRejection};
use crate::manifest::{ManifestReader, ManifestRow, REQUIRED_COLUMNS};
use crate::metadata::{MetadataDefaults, MetadataError, MetadataRecord, validate};
use crate::opts::Opts;
use crate::probe::{MediaProbe, SymphoniaProbe};
use crate::vtt_encoder::stage_subtitle_file;
use crate::{Error, Result};

/// Audit message for a job that reached the end of the pipeline.
pub const SUCCESS_MESSAGE: &str = "Successful transcription";

/// Where a job is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobState {
    Pending,
    MetadataBuilt,
    GatePassed,
    Transcribed,
    ContentChecked,
    Written,
    Embedded,
}

/// A per-job failure. The `Display` text is the audit-log message.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Unreadable manifest row: {0}")]
    Row(String),

    #[error("Manifest row has {columns} columns, expected at least {REQUIRED_COLUMNS}")]
    ShortRow { columns: usize },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Gate(#[from] GateRejection),

    #[error("Transcription failed: {0}")]
    Engine(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("Failed to write VTT: {0}")]
    Write(String),

    #[error("Failed to embed metadata to VTT: {0}")]
    Embed(#[from] EmbedError),
}

/// Counts for one finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// The path/name pair a job's audit record reports.
///
/// Before transcription this is the source file; from transcription on it is the subtitle file.
#[derive(Debug, Clone, Default)]
struct JobIdentity {
    path: String,
    name: String,
}

/// Drives manifest rows through the pipeline, one at a time.
///
/// Owns the long-lived engine handle and the previous-transcript slot used for duplicate
/// detection.
pub struct Batch<E, P = SymphoniaProbe> {
    engine: E,
    probe: P,
    detector: DuplicateDetector,
    opts: Opts,
    defaults: MetadataDefaults,
    out_dir: PathBuf,
}

impl<E: TranscriptionEngine> Batch<E> {
    /// A batch writing subtitles into `out_dir`, probing sources with Symphonia.
    pub fn new(engine: E, opts: Opts, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            probe: SymphoniaProbe,
            detector: DuplicateDetector::new(),
            opts,
            defaults: MetadataDefaults::default(),
            out_dir: out_dir.into(),
        }
    }
}

impl<E: TranscriptionEngine, P: MediaProbe> Batch<E, P> {
    /// Swap the media probe used by the gate.
    pub fn with_probe<Q: MediaProbe>(self, probe: Q) -> Batch<E, Q> {
        Batch {
            engine: self.engine,
            probe,
            detector: self.detector,
            opts: self.opts,
            defaults: self.defaults,
            out_dir: self.out_dir,
        }
    }

    pub fn with_defaults(mut self, defaults: MetadataDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Start duplicate detection from a known previous transcript.
    pub fn with_detector(mut self, detector: DuplicateDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn detector(&self) -> &DuplicateDetector {
        &self.detector
    }

    /// Process every row of `manifest`, appending one record per row to the log at `log_path`.
    ///
    /// `on_job` sees each audit record right after it is written. Returns an error only for
    /// setup failures: missing manifest, uncreatable output directory, or unopenable log.
    pub fn run(
        &mut self,
        manifest: &Path,
        log_path: &Path,
        mut on_job: impl FnMut(&AuditRecord),
    ) -> Result<BatchSummary> {
        let rows = ManifestReader::open(manifest)?;
        std::fs::create_dir_all(&self.out_dir).map_err(|source| Error::OutputDir {
            path: self.out_dir.clone(),
            source,
        })?;
        let mut log = AuditLogger::open(log_path)?;

        let mut summary = BatchSummary {
            run_id: Uuid::new_v4(),
            processed: 0,
            succeeded: 0,
            failed: 0,
        };

        let batch_span = info_span!("batch", run_id = %summary.run_id);
        let _batch = batch_span.enter();
        info!(
            manifest = %manifest.display(),
            out_dir = %self.out_dir.display(),
            log = %log_path.display(),
            "batch started"
        );

        for (index, record) in rows.enumerate() {
            let job_span = info_span!("job", row = index + 1);
            let _job = job_span.enter();

            let started = Instant::now();
            let mut ident = JobIdentity::default();

            let result = match record.map(|r| ManifestRow::from_record(&r)) {
                Ok(Ok(row)) => self.run_job(&row, &mut ident),
                Ok(Err(short)) => {
                    ident.path = short.source_path;
                    ident.name = short.source_name;
                    Err(JobError::ShortRow {
                        columns: short.columns,
                    })
                }
                Err(err) => Err(JobError::Row(err.to_string())),
            };

            let audit = finish_job(&ident, started.elapsed(), result);
            if let Err(err) = log.append(&audit) {
                error!(error = %err, "unable to write audit record");
            }

            summary.processed += 1;
            match audit.outcome {
                Outcome::Success => summary.succeeded += 1,
                Outcome::Error => summary.failed += 1,
            }
            on_job(&audit);
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch finished"
        );
        Ok(summary)
    }

    /// Run one job to completion or to its first failure.
    fn run_job(
        &mut self,
        row: &ManifestRow,
        ident: &mut JobIdentity,
    ) -> std::result::Result<(), JobError> {
        let mut state = JobState::Pending;
        ident.path = row.source_path.to_string_lossy().into_owned();
        ident.name = row.source_name.clone();

        let out_name = row.output_name();
        let out_path = self.out_dir.join(&out_name);

        let result = self.advance(row, &out_path, &mut state, || {
            // From transcription on, the audit record points at the subtitle file.
            ident.path = out_path.to_string_lossy().into_owned();
            ident.name = out_name.clone();
        });

        if let Err(err) = &result {
            debug!(failed_at = ?state, reason = %err, "job stopped");
        }
        result
    }

    fn advance(
        &mut self,
        row: &ManifestRow,
        out_path: &Path,
        state: &mut JobState,
        mut on_transcribed: impl FnMut(),
    ) -> std::result::Result<(), JobError> {
        let mut record = MetadataRecord::from_row(row, &self.defaults);
        validate(&record)?;
        *state = JobState::MetadataBuilt;

        gate::check(&row.source_path, &row.source_name, out_path, &self.probe)?;
        *state = JobState::GatePassed;

        info!(file = %row.source_name, "attempting transcription");
        let transcribed = self.engine.transcribe(&row.source_path, &self.opts);
        self.engine.release();
        let result = transcribed.map_err(|err| JobError::Engine(format!("{err:#}")))?;
        *state = JobState::Transcribed;
        on_transcribed();

        let language = self.detector.check(&result, &row.source_name)?;
        record.language = Some(language.to_owned());
        *state = JobState::ContentChecked;

        let staged = stage_subtitle_file(&self.out_dir, &result)
            .map_err(|err| JobError::Write(format!("{err:#}")))?;
        *state = JobState::Written;

        embed(staged.path(), &record)?;
        staged.persist_noclobber(out_path).map_err(|err| {
            JobError::Write(format!("cannot create '{}': {}", out_path.display(), err.error))
        })?;
        *state = JobState::Embedded;

        Ok(())
    }
}

/// Turn a job's result into its audit record and report it.
fn finish_job(
    ident: &JobIdentity,
    elapsed: Duration,
    result: std::result::Result<(), JobError>,
) -> AuditRecord {
    let (outcome, message) = match result {
        Ok(()) => (Outcome::Success, SUCCESS_MESSAGE.to_owned()),
        Err(err) => (Outcome::Error, err.to_string()),
    };

    let elapsed_seconds = elapsed.as_secs_f64();
    match outcome {
        Outcome::Success => info!(
            path = %ident.path,
            file = %ident.name,
            elapsed_seconds,
            "job succeeded"
        ),
        Outcome::Error => warn!(
            path = %ident.path,
            file = %ident.name,
            elapsed_seconds,
            reason = %message,
            "job skipped"
        ),
    }

    AuditRecord::new(
        ident.path.clone(),
        ident.name.clone(),
        elapsed,
        message,
        Local::now(),
        outcome,
    )
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use anyhow::anyhow;

    use super::*;
    use crate::probe::{AudioTrackInfo, MediaInfo};
    use crate::transcript::{Segment, TranscriptResult};

    /// Reports one audible track for any path.
    struct AudibleProbe;

    impl MediaProbe for AudibleProbe {
        fn probe(&self, _path: &Path) -> anyhow::Result<MediaInfo> {
            Ok(MediaInfo {
                audio_tracks: vec![AudioTrackInfo {
                    track_id: 0,
                    duration: Duration::from_secs(10),
                }],
            })
        }
    }

    /// Replays scripted transcripts in order.
    #[derive(Default)]
    struct ScriptedEngine {
        script: VecDeque<anyhow::Result<TranscriptResult>>,
        calls: usize,
        releases: usize,
        /// Runs inside every `transcribe` call, before the scripted result is returned.
        during_transcribe: Option<Box<dyn FnMut()>>,
    }

    impl ScriptedEngine {
        fn new(texts: &[&str]) -> Self {
            Self {
                script: texts
                    .iter()
                    .map(|t| Ok(transcript(t)))
                    .collect(),
                ..Default::default()
            }
        }
    }

    impl TranscriptionEngine for ScriptedEngine {
        fn transcribe(&mut self, _path: &Path, _opts: &Opts) -> anyhow::Result<TranscriptResult> {
            self.calls += 1;
            if let Some(hook) = self.during_transcribe.as_mut() {
                hook();
            }
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }

        fn release(&mut self) {
            self.releases += 1;
        }
    }

    fn transcript(text: &str) -> TranscriptResult {
        TranscriptResult::from_segments(
            "en",
            vec![Segment {
                start_seconds: 0.0,
                end_seconds: 1.0,
                text: text.to_owned(),
            }],
        )
    }

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            Ok(Self {
                dir: tempfile::tempdir()?,
            })
        }

        fn media(&self, name: &str) -> anyhow::Result<PathBuf> {
            let path = self.dir.path().join(name);
            std::fs::write(&path, b"not really audio")?;
            Ok(path)
        }

        fn out_dir(&self) -> PathBuf {
            self.dir.path().join("out")
        }

        fn log(&self) -> PathBuf {
            self.dir.path().join("log.csv")
        }

        fn manifest(&self, rows: &[String]) -> anyhow::Result<PathBuf> {
            let path = self.dir.path().join("manifest.csv");
            let mut text = String::from(
                "path,name,reserved,party2,mi,mi_type,title,history,k1,v1,k2,v2\n",
            );
            for row in rows {
                text.push_str(row);
                text.push('\n');
            }
            std::fs::write(&path, text)?;
            Ok(path)
        }

        fn log_rows(&self) -> anyhow::Result<Vec<csv::StringRecord>> {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .from_path(self.log())?;
            Ok(reader.records().collect::<std::result::Result<_, _>>()?)
        }
    }

    fn row(path: &Path, name: &str, mi: &str) -> String {
        format!(
            "{},{name},,\"US, Archive\",{mi},local,Title,History,,,,",
            path.display()
        )
    }

    #[test]
    fn duplicate_window_skips_over_rejected_jobs() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let rows = [
            row(&fx.media("one.wav")?, "one.wav", "obj_1"),
            row(&fx.media("two.wav")?, "two.wav", "obj_2"),
            row(&fx.media("three.wav")?, "three.wav", "obj_3"),
        ];
        let manifest = fx.manifest(&rows)?;

        let engine = ScriptedEngine::new(&["hello world", "hello world", "goodbye"]);
        let mut batch = Batch::new(engine, Opts::default(), fx.out_dir()).with_probe(AudibleProbe);
        let summary = batch.run(&manifest, &fx.log(), |_| {})?;

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let log = fx.log_rows()?;
        assert_eq!(&log[1][3], "Duplicate VTT of one.wav");
        assert_eq!(&log[1][5], "ERROR");
        assert_eq!(&log[2][5], "SUCCESS");

        assert!(fx.out_dir().join("one.vtt").exists());
        assert!(!fx.out_dir().join("two.vtt").exists());
        assert!(fx.out_dir().join("three.vtt").exists());

        assert_eq!(batch.engine().releases, 3);
        Ok(())
    }

    #[test]
    fn metadata_rejection_never_reaches_the_engine() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let manifest = fx.manifest(&[row(&fx.media("a.wav")?, "a.wav", "obj1023")])?;

        let mut batch = Batch::new(ScriptedEngine::new(&["x"]), Opts::default(), fx.out_dir())
            .with_probe(AudibleProbe);
        batch.run(&manifest, &fx.log(), |_| {})?;

        assert_eq!(batch.engine().calls, 0);
        let log = fx.log_rows()?;
        assert_eq!(log.len(), 1);
        assert_eq!(&log[0][1], "a.wav");
        assert_eq!(&log[0][5], "ERROR");
        Ok(())
    }

    #[test]
    fn engine_failure_is_a_hard_skip_and_still_releases() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let manifest = fx.manifest(&[row(&fx.media("a.wav")?, "a.wav", "obj_1")])?;

        let engine = ScriptedEngine {
            script: VecDeque::from([Err(anyhow!("out of memory"))]),
            ..Default::default()
        };
        let mut batch = Batch::new(engine, Opts::default(), fx.out_dir()).with_probe(AudibleProbe);
        let summary = batch.run(&manifest, &fx.log(), |_| {})?;

        assert_eq!(summary.failed, 1);
        assert_eq!(batch.engine().releases, 1);
        assert_eq!(batch.detector().previous_text(), None);

        let log = fx.log_rows()?;
        assert_eq!(&log[0][3], "Transcription failed: out of memory");
        assert!(!fx.out_dir().join("a.vtt").exists());
        Ok(())
    }

    #[test]
    fn short_rows_are_logged_and_skipped() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let good = row(&fx.media("b.wav")?, "b.wav", "obj_2");
        let manifest = fx.manifest(&["/x/a.wav,a.wav,only".to_owned(), good])?;

        let mut batch = Batch::new(ScriptedEngine::new(&["hi"]), Opts::default(), fx.out_dir())
            .with_probe(AudibleProbe);
        let mut seen = Vec::new();
        batch.run(&manifest, &fx.log(), |rec| seen.push(rec.outcome))?;

        assert_eq!(seen, vec![Outcome::Error, Outcome::Success]);
        let log = fx.log_rows()?;
        assert_eq!(&log[0][0], "/x/a.wav");
        assert_eq!(&log[0][3], "Manifest row has 3 columns, expected at least 12");
        Ok(())
    }

    #[test]
    fn successful_jobs_report_the_subtitle_file() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let manifest = fx.manifest(&[row(&fx.media("tape.mp4")?, "tape.mp4", "obj_7")])?;

        let mut batch = Batch::new(ScriptedEngine::new(&["hi"]), Opts::default(), fx.out_dir())
            .with_probe(AudibleProbe);
        batch.run(&manifest, &fx.log(), |_| {})?;

        let log = fx.log_rows()?;
        let out = fx.out_dir().join("tape.vtt");
        assert_eq!(&log[0][0], out.to_string_lossy());
        assert_eq!(&log[0][1], "tape.vtt");
        assert_eq!(&log[0][3], SUCCESS_MESSAGE);

        let vtt = std::fs::read_to_string(out)?;
        assert!(vtt.contains("Language: eng\n"));
        assert!(vtt.contains("Media Identifier: obj_7, local\n"));
        Ok(())
    }

    #[test]
    fn failed_write_leaves_no_subtitle_and_the_row_is_retried() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let manifest = fx.manifest(&[row(&fx.media("a.wav")?, "a.wav", "obj_1")])?;

        // The output directory turns into a plain file while the engine runs.
        let out_dir = fx.out_dir();
        let mut engine = ScriptedEngine::new(&["hello"]);
        engine.during_transcribe = Some(Box::new(move || {
            std::fs::remove_dir_all(&out_dir).unwrap();
            std::fs::write(&out_dir, b"in the way").unwrap();
        }));
        let mut batch = Batch::new(engine, Opts::default(), fx.out_dir()).with_probe(AudibleProbe);
        let summary = batch.run(&manifest, &fx.log(), |_| {})?;

        assert_eq!(summary.failed, 1);
        let log = fx.log_rows()?;
        assert!(log[0][3].starts_with("Failed to write VTT: "), "got {}", &log[0][3]);
        assert_eq!(&log[0][5], "ERROR");

        std::fs::remove_file(fx.out_dir())?;
        let mut batch = Batch::new(ScriptedEngine::new(&["hello"]), Opts::default(), fx.out_dir())
            .with_probe(AudibleProbe);
        let summary = batch.run(&manifest, &fx.log(), |_| {})?;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(batch.engine().calls, 1);
        let log = fx.log_rows()?;
        assert_eq!(&log[1][3], SUCCESS_MESSAGE);
        assert!(std::fs::read_to_string(fx.out_dir().join("a.vtt"))?.contains("Type: caption\n"));
        Ok(())
    }

    #[test]
    fn subtitle_created_mid_job_is_left_alone() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let manifest = fx.manifest(&[row(&fx.media("a.wav")?, "a.wav", "obj_1")])?;

        let out_path = fx.out_dir().join("a.vtt");
        let target = out_path.clone();
        let mut engine = ScriptedEngine::new(&["hello"]);
        engine.during_transcribe = Some(Box::new(move || {
            std::fs::write(&target, "WEBVTT\n\nsomeone else's\n").unwrap();
        }));
        let mut batch = Batch::new(engine, Opts::default(), fx.out_dir()).with_probe(AudibleProbe);
        let summary = batch.run(&manifest, &fx.log(), |_| {})?;

        assert_eq!(summary.failed, 1);
        let log = fx.log_rows()?;
        assert!(log[0][3].starts_with("Failed to write VTT: "), "got {}", &log[0][3]);
        assert_eq!(
            std::fs::read_to_string(&out_path)?,
            "WEBVTT\n\nsomeone else's\n"
        );
        // Nothing staged is left behind next to it.
        assert_eq!(std::fs::read_dir(fx.out_dir())?.count(), 1);
        Ok(())
    }

    #[test]
    fn unparseable_row_is_its_own_failed_job() -> anyhow::Result<()> {
        let fx = Fixture::new()?;
        let good = row(&fx.media("b.wav")?, "b.wav", "obj_2");
        let manifest = fx.manifest(&[])?;
        let mut bytes = std::fs::read(&manifest)?;
        bytes.extend_from_slice(b"/x/a.wav,");
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(b".wav,,,,,,,,,,\n");
        bytes.extend_from_slice(good.as_bytes());
        bytes.push(b'\n');
        std::fs::write(&manifest, bytes)?;

        assert_eq!(crate::manifest::count_rows(&manifest)?, 2);

        let mut batch = Batch::new(ScriptedEngine::new(&["hi"]), Opts::default(), fx.out_dir())
            .with_probe(AudibleProbe);
        let mut seen = Vec::new();
        let summary = batch.run(&manifest, &fx.log(), |rec| seen.push(rec.outcome))?;

        assert_eq!(summary.processed, 2);
        assert_eq!(seen, vec![Outcome::Error, Outcome::Success]);
        let log = fx.log_rows()?;
        assert!(log[0][3].starts_with("Unreadable manifest row"), "got {}", &log[0][3]);
        Ok(())
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let fx = Fixture::new().unwrap();
        let mut batch = Batch::new(ScriptedEngine::default(), Opts::default(), fx.out_dir());
        let err = batch
            .run(&fx.dir.path().join("nope.csv"), &fx.log(), |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound(_)));
        assert!(!fx.log().exists());
    }

    #[test]
    fn states_are_ordered() {
        assert!(JobState::Pending < JobState::GatePassed);
        assert!(JobState::Written < JobState::Embedded);
    }
}

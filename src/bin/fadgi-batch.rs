use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use fadgi_scribe::backends::whisper::WhisperEngine;
use fadgi_scribe::batch::Batch;
use fadgi_scribe::manifest::count_rows;
use fadgi_scribe::opts::Opts;
use fadgi_scribe::{Result, logging};

fn main() {
    logging::init();
    let params = Params::parse();

    // Setup failures end the run; per-job failures only ever reach the audit log.
    if let Err(err) = run(&params) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(params: &Params) -> Result<()> {
    let opts = Opts::load(params.settings.as_deref())?;
    let total = count_rows(&params.inlist)?;

    let engine = WhisperEngine::new(&opts)?;
    let mut batch = Batch::new(engine, opts, &params.outdir);

    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template("Row {pos} of {len} [{elapsed_precise}] {bar:40} {msg}")
            .map_err(|e| fadgi_scribe::Error::Other(Box::new(e)))?,
    );

    let summary = batch.run(&params.inlist, &params.outlist, |record| {
        progress.set_message(format!(
            "{} {} ({:.1}s)",
            record.file_name, record.message, record.elapsed_seconds
        ));
        progress.inc(1);
    })?;

    progress.finish_with_message(format!(
        "{} processed, {} succeeded, {} failed",
        summary.processed, summary.succeeded, summary.failed
    ));
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "fadgi-batch")]
#[command(about = "Batch-transcribe a manifest of A/V files into FADGI-tagged WebVTT")]
struct Params {
    /// Input manifest (CSV, one header row).
    pub inlist: PathBuf,

    /// Directory subtitle files are written into.
    pub outdir: PathBuf,

    /// Audit log (CSV). Appended to if it already exists.
    pub outlist: PathBuf,

    /// Engine settings file with one `key=value` per line.
    #[arg(short = 's', long = "settings", visible_alias = "w_settings")]
    pub settings: Option<PathBuf>,
}

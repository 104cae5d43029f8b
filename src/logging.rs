//! Structured JSON logging for batch runs.
//!
//! Every event is one JSON line carrying the active `batch` span (run id) and `job` span
//! (manifest row), so a run's log can be filtered per job after the fact.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding `tracing` filter directives, e.g. `fadgi_scribe=debug`.
pub const LOG_ENV_VAR: &str = "FADGI_LOG";

/// Install the JSON subscriber at `info` unless `FADGI_LOG` says otherwise.
pub fn init() {
    init_with_default(LevelFilter::INFO);
}

/// Install the JSON subscriber with `default` as the fallback level.
///
/// Calling this more than once is harmless; only the first call installs a subscriber.
pub fn init_with_default(default: LevelFilter) {
    let directives = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(directives.as_deref(), default);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init();
}

/// Parse `directives` leniently, falling back to `default` for anything they do not cover.
fn build_filter(directives: Option<&str>, default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .parse_lossy(directives.unwrap_or_default())
}

//! Structured logging for the monitoring service
//!
//! Installs the `tracing` subscriber (console plus optional rolling file)
//! and provides endpoint-tagged helpers for the events every view emits:
//! classified fetch failures and per-cycle summaries.

use crate::config::LoggingConfig;
use crate::model::{Endpoint, FetchCause, FetchFailure};
use std::fmt;
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_NAME: &str = "aquaguard-monitor.log";

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. When a log
/// directory is configured and writable, a daily-rotating file layer is
/// added; the returned guard must be kept alive for the file writer to
/// flush.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match config.directory.as_deref() {
        Some(dir) if directory_is_writable(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        Some(dir) => {
            eprintln!("Warning: log directory {} is not writable, file logging disabled", dir);
            (None, None)
        }
        None => (None, None),
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    // A second init (tests, embedding) keeps the existing subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    guard
}

/// `tracing_appender::rolling` panics if it cannot create its file, so
/// check before handing it the directory.
fn directory_is_writable(dir: &str) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = Path::new(dir).join(".aquaguard_write_test");
    let writable = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&probe)
        .is_ok();
    let _ = std::fs::remove_file(&probe);
    writable
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. a dashboard asked for a region the collaborator doesn't know
    Expected,
    /// Unexpected failure - collaborator down or erroring
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a collaborator failure based on the cause and which endpoint
/// produced it.
pub fn classify_fetch_failure(endpoint: &Endpoint, cause: &FetchCause) -> FailureType {
    match cause {
        // 404 on a per-region endpoint just means an unknown region
        FetchCause::Status(404) if endpoint.region().is_some() => FailureType::Expected,
        FetchCause::Status(code) if *code >= 500 => FailureType::Unexpected,
        FetchCause::Transport(_) => FailureType::Unexpected,
        // Malformed bodies suggest an API change upstream
        FetchCause::Malformed(_) => FailureType::Unknown,
        FetchCause::Status(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a collaborator failure with automatic classification
pub fn log_fetch_failure(failure: &FetchFailure) {
    let failure_type = classify_fetch_failure(&failure.endpoint, &failure.cause);

    match failure_type {
        FailureType::Expected => debug!(
            endpoint = %failure.endpoint,
            failure_type = %failure_type,
            "fetch failed: {}", failure.cause
        ),
        FailureType::Unexpected => error!(
            endpoint = %failure.endpoint,
            failure_type = %failure_type,
            "fetch failed: {}", failure.cause
        ),
        FailureType::Unknown => warn!(
            endpoint = %failure.endpoint,
            failure_type = %failure_type,
            "fetch failed: {}", failure.cause
        ),
    }
}

// ---------------------------------------------------------------------------
// Cycle Summary Logging
// ---------------------------------------------------------------------------

/// What a view ingested in one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub regions: usize,
    pub ranking_rows: usize,
    pub elevated_events: usize,
}

/// Log a summary of a successful cycle
pub fn log_cycle_summary(view: &str, summary: CycleSummary) {
    info!(
        view,
        regions = summary.regions,
        ranking_rows = summary.ranking_rows,
        elevated = summary.elevated_events,
        "cycle complete"
    );
}

/// Log a failed cycle. `serving_stale` is true when the view still has a
/// last-known-good result on display.
pub fn log_cycle_failure(view: &str, consecutive_failures: u32, serving_stale: bool, reason: &str) {
    if serving_stale {
        warn!(
            view,
            consecutive_failures,
            "cycle failed, keeping last good view: {}", reason
        );
    } else {
        error!(
            view,
            consecutive_failures,
            "cycle failed with no data to show: {}", reason
        );
    }
}

//! Tracing setup for the ingestion binary.
//!
//! Stdout belongs to `docuhelper-ingest`: it prints exactly one JSON document per input file, and
//! scripts pipe it straight into `jq` or a loader. Every log line therefore goes to stderr, plus a
//! plain-text file for post-mortems of long batch runs. `DOCUHELPER_LOG_FILE` names that file;
//! without it the log lands in `logs/docuhelper.log` next to the working directory.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_ENV: &str = "DOCUHELPER_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "docuhelper.log";

/// Where the file layer writes.
#[derive(Debug, PartialEq, Eq)]
enum LogDestination {
    /// Append to a caller-chosen file.
    Explicit(PathBuf),
    /// Append to `DEFAULT_LOG_FILE` inside a directory created on demand.
    Default { dir: PathBuf, file: &'static str },
}

fn resolve_destination(explicit: Option<String>) -> LogDestination {
    match explicit.filter(|value| !value.trim().is_empty()) {
        Some(path) => LogDestination::Explicit(PathBuf::from(path)),
        None => LogDestination::Default {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE,
        },
    }
}

/// Install the global subscriber: `RUST_LOG` filtering (default `info`), a compact stderr layer,
/// and a file layer when the log file can be opened.
///
/// Call once, after configuration is loaded and before the first document is ingested.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);

    let destination = resolve_destination(std::env::var(LOG_FILE_ENV).ok());
    match open_file_writer(&destination) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

/// Open `destination` behind a non-blocking writer whose guard lives for the process.
///
/// Failures are reported on stderr and disable the file layer; ingestion still runs.
fn open_file_writer(destination: &LogDestination) -> Option<NonBlocking> {
    let (non_blocking, guard) = match destination {
        LogDestination::Explicit(path) => match append_to(path) {
            Ok(file) => tracing_appender::non_blocking(file),
            Err(err) => {
                eprintln!("Failed to open log file {}: {err}", path.display());
                return None;
            }
        },
        LogDestination::Default { dir, file } => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {err}", dir.display());
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, *file))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

fn append_to(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

//! Structured logging to `juliatsacoredyn.log.txt`, appended across runs
//! so a resumed computation's log reads as one continuous history.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Open the log file in append mode and install it as the global
/// subscriber. The returned [`WorkerGuard`] must be kept alive for the
/// process lifetime — dropping it stops the background flush thread.
pub fn init(log_path: &Path) -> std::io::Result<WorkerGuard> {
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("juliatsa=info")))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();

    Ok(guard)
}

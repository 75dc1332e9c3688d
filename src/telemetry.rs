use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing::subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

fn install_subscriber<S>(subscriber: S) -> Result<()>
where
    S: Subscriber + Send + Sync + 'static,
{
    if TRACING_INITIALIZED.get().is_some() {
        return Ok(());
    }

    subscriber::set_global_default(subscriber)?;
    let _ = TRACING_INITIALIZED.set(());
    Ok(())
}

/// Install the process-wide subscriber writing to stdout and appending to `log_file`.
///
/// Failing to open the log file is fatal to the caller. Calling this again is a no-op.
pub fn init_tracing(log_file: &Path, verbose: bool) -> Result<()> {
    if TRACING_INITIALIZED.get().is_some() {
        return Ok(());
    }

    let default_level = if verbose {
        "arena_kiosk=debug"
    } else {
        "arena_kiosk=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard) = open_log_writer(log_file)?;
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer),
        );
    let _ = LOG_GUARD.set(guard);
    install_subscriber(subscriber)
}

fn open_log_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    let file = open_log_file(path)?;
    Ok(tracing_appender::non_blocking(file))
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn log_file_is_appended_not_truncated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("arena-kiosk.log");

        let mut first = open_log_file(&path).unwrap();
        writeln!(first, "first run").unwrap();
        drop(first);

        let mut second = open_log_file(&path).unwrap();
        writeln!(second, "second run").unwrap();
        drop(second);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first run\nsecond run\n");
    }

    #[test]
    fn unopenable_log_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = open_log_file(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to open log file"));
    }
}

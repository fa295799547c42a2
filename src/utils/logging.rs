//! Diagnostic logging through `tracing`.
//!
//! `RUST_LOG` selects what is recorded; without it only this crate's
//! `info` and above is kept.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "charla=info";

pub enum LogTarget<'a> {
    /// Nothing is recorded. The terminal UI uses this when no log file is set.
    Disabled,
    Stderr,
    File(&'a Path),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

pub fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init_logging(target: LogTarget<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let result = match target {
        LogTarget::Disabled => return Ok(()),
        LogTarget::Stderr => tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogTarget::File(path) => {
            let file = open_log_file(path)
                .map_err(|err| format!("Cannot open log file {}: {err}", path.display()))?;
            tracing_subscriber::registry()
                .with(env_filter())
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .try_init()
        }
    };
    if let Err(err) = result {
        tracing::debug!(error = %err, "Logging was already initialized");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn log_file_is_created_and_appended() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("charla.log");

        writeln!(open_log_file(&path).expect("open"), "first").expect("write");
        writeln!(open_log_file(&path).expect("reopen"), "second").expect("write");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn unwritable_log_path_is_reported() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("missing").join("charla.log");

        let err = init_logging(LogTarget::File(&path)).expect_err("should fail");
        assert!(err.to_string().starts_with("Cannot open log file"));
    }
}

//! Logging setup.
//!
//! Writes to `<log_dir>/geocoverage.log` (cleared per session) and to the
//! console. The level comes from `RUST_LOG`, defaulting to `info`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the file writer alive. Dropping it flushes the log.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Creates `log_dir` and truncates `log_file` inside it.
pub fn prepare_log_file(log_dir: &Path, log_file: &str) -> Result<PathBuf, io::Error> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(log_file);
    fs::write(&log_path, "")?;
    Ok(log_path)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initializes file and console logging.
///
/// Console output goes to stderr so command output on stdout stays clean.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    prepare_log_file(log_dir, log_file)?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .pretty();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Console-only logging at `default_level` unless `RUST_LOG` is set.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_console_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// `~/.geocoverage/logs`, or `./logs` without a home directory.
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".geocoverage").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

pub fn default_log_file() -> &'static str {
    "geocoverage.log"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        assert_eq!(default_log_file(), "geocoverage.log");
        assert!(default_log_dir().ends_with("logs"));
    }

    #[test]
    fn test_prepare_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");

        let path = prepare_log_file(&dir, "test.log").unwrap();

        assert!(dir.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_clears_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("test.log"), "old log data").unwrap();

        let path = prepare_log_file(tmp.path(), "test.log").unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn test_console_logging_twice_is_harmless() {
        init_console_logging("warn");
        init_console_logging("debug");
        tracing::info!("still logging");
    }
}

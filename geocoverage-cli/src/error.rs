//! CLI error handling with user-friendly messages.

use std::fmt;
use std::io;
use std::process;

use geocoverage::{BackendError, ConfigFileError, CoverageError};

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be loaded
    Config(ConfigFileError),
    /// Backend could not be created
    Backend(BackendError),
    /// Coverage open or read failed
    Coverage(CoverageError),
    /// Failed to read an input file
    Input { path: String, error: io::Error },
    /// Malformed point line
    Parse { line: usize, message: String },
    /// A batch finished but reported failure
    BatchFailed,
}

impl CliError {
    /// Exit the process with an error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the [backend] section of your config file.");
                eprintln!("Run 'geocoverage config path' to see which file is used.");
            }
            CliError::Coverage(CoverageError::BackendRead { .. }) => {
                eprintln!();
                eprintln!("The data source kept failing. Tune [retry] max_attempts and delay_ms.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Backend(e) => write!(f, "Failed to create backend: {}", e),
            CliError::Coverage(e) => write!(f, "Coverage error: {}", e),
            CliError::Input { path, error } => write!(f, "Failed to read '{}': {}", path, error),
            CliError::Parse { line, message } => write!(f, "Line {}: {}", line, message),
            CliError::BatchFailed => write!(f, "Batch completed with failures"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Backend(e) => Some(e),
            CliError::Coverage(e) => Some(e),
            CliError::Input { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<BackendError> for CliError {
    fn from(e: BackendError) -> Self {
        CliError::Backend(e)
    }
}

impl From<CoverageError> for CliError {
    fn from(e: CoverageError) -> Self {
        CliError::Coverage(e)
    }
}

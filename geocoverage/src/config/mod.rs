//! Configuration file handling for `~/.geocoverage/config.ini`.
//!
//! A missing file yields defaults. Parsing lives in [`parser`], one place
//! mapping INI keys to settings fields.
//!
//! ```ini
//! [backend]
//! kind = raw
//! path = /data/dem.raw
//! width = 1000
//! height = 1000
//! sample_type = uint16
//!
//! [coverage]
//! forced_no_data = 0
//!
//! [retry]
//! max_attempts = 10
//! delay_ms = 1000
//!
//! [cache]
//! buffer_ceiling = 100MB
//! ```

mod parser;
mod size;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::backend::{BackendConfig, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::batch::{BatchConfig, DEFAULT_CHUNK_SIZE, DEFAULT_POINTS_PER_TASK};
use crate::buffer::{DEFAULT_BUFFER_CEILING, DEFAULT_CACHE_CAPACITY, DEFAULT_TRIM_TO};
use crate::coord::SpatialReference;
use crate::coverage::CoverageConfig;
use crate::loader::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};
use crate::overview::OverviewConfig;

pub use size::{format_size, parse_size, SizeParseError};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A key the chosen backend needs is absent
    #[error("Missing configuration: {section}.{key}")]
    MissingValue { section: String, key: String },
}

/// `[coverage]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageSettings {
    pub bands: Vec<usize>,
    pub srs: Option<SpatialReference>,
    pub axis_limit: Option<u32>,
    pub forced_no_data: Option<f64>,
    pub wrap_x: Option<bool>,
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub buffer_ceiling: usize,
    pub capacity: usize,
    pub trim_to: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            buffer_ceiling: DEFAULT_BUFFER_CEILING,
            capacity: DEFAULT_CACHE_CAPACITY,
            trim_to: DEFAULT_TRIM_TO,
        }
    }
}

/// `[batch]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub chunk_size: i64,
    pub points_per_task: usize,
    pub threads: Option<usize>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            points_per_task: DEFAULT_POINTS_PER_TASK,
            threads: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Locator shown in logs; the path or URL of the dataset.
    pub locator: String,
    pub backend: BackendConfig,
    pub http_timeout_secs: u64,
    pub coverage: CoverageSettings,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub batch: BatchSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            locator: "null".to_string(),
            backend: BackendConfig::Null,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            coverage: CoverageSettings::default(),
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            batch: BatchSettings::default(),
        }
    }
}

impl ConfigFile {
    /// Loads from the default path.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&default_config_path())
    }

    /// Loads from `path`, returning defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parser::parse_ini(&ini)
    }

    /// Parses INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigFileError::InvalidValue {
            section: String::new(),
            key: String::new(),
            value: String::new(),
            reason: e.to_string(),
        })?;
        parser::parse_ini(&ini)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }

    /// Coverage settings, with the backend's own axis limit when none is set.
    pub fn to_coverage_config(&self) -> CoverageConfig {
        let mut config = CoverageConfig::new(self.locator.clone())
            .with_bands(self.coverage.bands.clone())
            .with_retry(self.retry_policy())
            .with_buffer_ceiling(self.cache.buffer_ceiling)
            .with_cache_limits(self.cache.capacity, self.cache.trim_to);
        config.srs_override = self.coverage.srs.clone();
        config.axis_limit = self.coverage.axis_limit.or(self.backend.default_axis_limit());
        config.forced_no_data = self.coverage.forced_no_data;
        config.wrap_x = self.coverage.wrap_x;
        config
    }

    /// Settings for an overview chain; every level shares the coverage settings.
    pub fn to_overview_config(&self) -> OverviewConfig {
        OverviewConfig::new(self.to_coverage_config())
    }

    pub fn to_batch_config(&self) -> BatchConfig {
        let config = BatchConfig::default()
            .with_chunk_size(self.batch.chunk_size)
            .with_points_per_task(self.batch.points_per_task);
        match self.batch.threads {
            Some(threads) => config.with_worker_threads(threads),
            None => config,
        }
    }
}

/// `~/.geocoverage/config.ini`, or `./.geocoverage/config.ini` without a
/// home directory.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geocoverage")
        .join("config.ini")
}

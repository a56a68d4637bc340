//! Open-time configuration for a coverage.

use crate::buffer::{DEFAULT_BUFFER_CEILING, DEFAULT_CACHE_CAPACITY, DEFAULT_TRIM_TO};
use crate::coord::SpatialReference;
use crate::loader::RetryPolicy;

/// Settings a coverage is opened with.
///
/// Everything here is fixed once the coverage is `Ready`.
#[derive(Clone, Debug, PartialEq)]
pub struct CoverageConfig {
    /// Dataset locator (path or URL), used for logging.
    pub locator: String,

    /// Replaces the reference system reported by the backend.
    pub srs_override: Option<SpatialReference>,

    /// Backend bands to serve. Empty selects automatically.
    pub bands: Vec<usize>,

    /// Largest edge of a single backend read. `None` means unlimited.
    pub axis_limit: Option<u32>,

    /// Value treated as no-data in addition to the backend's own.
    pub forced_no_data: Option<f64>,

    /// Retry policy for every backend read.
    pub retry: RetryPolicy,

    /// Largest region buffer to allocate, in bytes.
    pub buffer_ceiling: usize,

    /// Buffers kept per coverage.
    pub cache_capacity: usize,

    /// Buffers kept after a memory-pressure trim.
    pub cache_trim_to: usize,

    /// Whether X wraps around (antimeridian). `None` detects it from the
    /// extent.
    pub wrap_x: Option<bool>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            locator: String::new(),
            srs_override: None,
            bands: Vec::new(),
            axis_limit: None,
            forced_no_data: None,
            retry: RetryPolicy::default(),
            buffer_ceiling: DEFAULT_BUFFER_CEILING,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_trim_to: DEFAULT_TRIM_TO,
            wrap_x: None,
        }
    }
}

impl CoverageConfig {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            ..Self::default()
        }
    }

    pub fn with_srs_override(mut self, srs: SpatialReference) -> Self {
        self.srs_override = Some(srs);
        self
    }

    pub fn with_bands(mut self, bands: Vec<usize>) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_axis_limit(mut self, limit: u32) -> Self {
        self.axis_limit = Some(limit);
        self
    }

    pub fn with_forced_no_data(mut self, value: f64) -> Self {
        self.forced_no_data = Some(value);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_buffer_ceiling(mut self, bytes: usize) -> Self {
        self.buffer_ceiling = bytes;
        self
    }

    pub fn with_cache_limits(mut self, capacity: usize, trim_to: usize) -> Self {
        self.cache_capacity = capacity;
        self.cache_trim_to = trim_to;
        self
    }

    pub fn with_wrap_x(mut self, wrap: bool) -> Self {
        self.wrap_x = Some(wrap);
        self
    }
}

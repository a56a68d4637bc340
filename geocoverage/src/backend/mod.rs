//! Raster backend abstraction
//!
//! A backend is the file or network reader underneath a coverage. The core
//! only asks it to describe the dataset, read band-sequential byte blocks,
//! report no-data values and hand out coarser overviews. URL construction,
//! HTTP and file formats stay behind this trait.
//!
//! # Implementations
//!
//! - [`MemoryBackend`]: synthetic in-memory raster
//! - [`RawFileBackend`]: header-less band-sequential file on disk
//! - [`WcsBackend`]: OGC Web Coverage Service `GetCoverage` requests
//! - [`BingTileBackend`]: Bing Maps quadkey tiles
//! - [`NullBackend`]: empty coverage

mod bing;
mod decode;
mod factory;
mod http;
mod memory;
mod null;
mod raw;
mod wcs;

use std::sync::Arc;

use thiserror::Error;

use crate::codec::{Palette, SampleType};
use crate::coord::{Bounds, RasterRect, SpatialReference, StepSize};

pub use bing::{quadkey, BingConfig, BingTileBackend, ImagerySet, TILE_SIZE, WEB_MERCATOR_HALF_EXTENT};
pub use factory::{open_backend, BackendConfig};
pub use http::{HttpClient, ReqwestClient, DEFAULT_HTTP_TIMEOUT_SECS};
pub use memory::MemoryBackend;
pub use null::NullBackend;
pub use raw::{RawFileBackend, RawFileConfig};
pub use wcs::{WcsBackend, WcsConfig, WCS_AXIS_LIMIT};

#[cfg(test)]
pub use http::tests::MockHttpClient;

/// Errors reported by a backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Transient I/O or network failure; worth retrying.
    #[error("read error: {0}")]
    Read(String),

    /// The request can never succeed (bad band, region outside the raster,
    /// undecodable layout). Never retried.
    #[error("structure error: {0}")]
    Structure(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Read(_))
    }
}

/// Colour interpretation of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorInterpretation {
    #[default]
    Undefined,
    Gray,
    Palette,
    Red,
    Green,
    Blue,
    Alpha,
}

/// Static description of one band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandInfo {
    pub sample_type: SampleType,
    pub width: u32,
    pub height: u32,
    pub color: ColorInterpretation,
    pub palette: Option<Palette>,
    /// Band carries elevation values.
    pub is_elevation: bool,
}

impl BandInfo {
    pub fn new(sample_type: SampleType, width: u32, height: u32) -> Self {
        Self {
            sample_type,
            width,
            height,
            color: ColorInterpretation::Undefined,
            palette: None,
            is_elevation: false,
        }
    }

    pub fn with_color(mut self, color: ColorInterpretation) -> Self {
        self.color = color;
        self
    }
}

/// Static description of a dataset, returned when a backend opens.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub width: u32,
    pub height: u32,
    pub bounds: Bounds,
    pub step: StepSize,
    pub srs: SpatialReference,
    pub bands: Vec<BandInfo>,
}

impl DatasetInfo {
    /// Full raster extent: `(0, 0, width-1, height-1)`.
    pub fn raster_rect(&self) -> RasterRect {
        RasterRect::from_size(self.width, self.height)
    }
}

/// A raster data source.
///
/// Implementations must be safe to call from several threads at once; the
/// coverage core issues reads from worker threads without holding its own
/// lock.
pub trait Backend: Send + Sync {
    /// Human-readable backend name for logging.
    fn name(&self) -> &str;

    /// Opens the dataset and describes it.
    ///
    /// `srs_override` replaces the reference system the backend would
    /// otherwise report.
    fn open(&self, srs_override: Option<&SpatialReference>) -> Result<DatasetInfo, BackendError>;

    /// Reads `rect` for the given bands.
    ///
    /// Returns `bands.len()` consecutive blocks, one per band in the order
    /// given, each `rect.rows()` rows of `rect.columns()` little-endian
    /// values.
    fn read_region(&self, rect: &RasterRect, bands: &[usize]) -> Result<Vec<u8>, BackendError>;

    /// Declared no-data value of `band`, if any.
    fn no_data_value(&self, band: usize) -> Option<f64>;

    /// True if a coarser version of this dataset is available.
    fn has_overview(&self) -> bool {
        false
    }

    /// Opens the next coarser overview.
    fn open_overview(&self) -> Result<Arc<dyn Backend>, BackendError> {
        Err(BackendError::Structure(format!(
            "{} has no overviews",
            self.name()
        )))
    }
}

/// Checks that `rect` lies inside the raster and every band exists.
pub(crate) fn check_region(
    info_width: u32,
    info_height: u32,
    band_count: usize,
    rect: &RasterRect,
    bands: &[usize],
) -> Result<(), BackendError> {
    if !RasterRect::from_size(info_width, info_height).contains_rect(rect) {
        return Err(BackendError::Structure(format!(
            "region {} outside raster {}x{}",
            rect, info_width, info_height
        )));
    }
    if let Some(band) = bands.iter().find(|b| **b >= band_count) {
        return Err(BackendError::Structure(format!(
            "band {} does not exist ({} bands)",
            band, band_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_transient() {
        assert!(BackendError::Read("timeout".into()).is_transient());
        assert!(!BackendError::Structure("band".into()).is_transient());
    }

    #[test]
    fn test_check_region() {
        assert!(check_region(10, 10, 1, &RasterRect::new(0, 0, 9, 9), &[0]).is_ok());
        assert!(check_region(10, 10, 1, &RasterRect::new(0, 0, 10, 9), &[0]).is_err());
        assert!(check_region(10, 10, 1, &RasterRect::new(0, 0, 9, 9), &[1]).is_err());
    }
}

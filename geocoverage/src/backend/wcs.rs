//! OGC Web Coverage Service backend.
//!
//! Issues WCS 1.0 `GetCoverage` requests for the native bounding box of each
//! requested region and decodes the returned image. Overviews are served by
//! asking the same server for a grid with half the cells on each axis.

use std::sync::Arc;

use tracing::debug;

use super::decode::decode_image;
use super::http::HttpClient;
use super::{check_region, Backend, BackendError, BandInfo, DatasetInfo};
use crate::codec::SampleType;
use crate::coord::{Bounds, RasterRect, SpatialReference, StepSize};

/// Largest region edge most WCS servers serve reliably.
pub const WCS_AXIS_LIMIT: u32 = 1024;

/// Default number of overview levels offered below the base grid.
pub const DEFAULT_WCS_OVERVIEW_LEVELS: u32 = 4;

/// WCS coverage description.
#[derive(Debug, Clone, PartialEq)]
pub struct WcsConfig {
    /// Service endpoint, without query string.
    pub base_url: String,
    /// Coverage identifier on the server.
    pub coverage: String,
    /// CRS code sent with requests, e.g. `EPSG:4326`.
    pub crs: String,
    pub bounds: Bounds,
    /// Grid size at full resolution.
    pub width: u32,
    pub height: u32,
    pub band_count: usize,
    pub sample_type: SampleType,
    /// Output format requested from the server.
    pub format: String,
    pub no_data: Option<f64>,
    pub overview_levels: u32,
}

impl WcsConfig {
    pub fn new(base_url: impl Into<String>, coverage: impl Into<String>, bounds: Bounds, width: u32, height: u32) -> Self {
        Self {
            base_url: base_url.into(),
            coverage: coverage.into(),
            crs: "EPSG:4326".to_string(),
            bounds,
            width,
            height,
            band_count: 1,
            sample_type: SampleType::UInt16,
            format: "image/png".to_string(),
            no_data: None,
            overview_levels: DEFAULT_WCS_OVERVIEW_LEVELS,
        }
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = crs.into();
        self
    }

    pub fn with_layout(mut self, sample_type: SampleType, band_count: usize) -> Self {
        self.sample_type = sample_type;
        self.band_count = band_count;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_no_data(mut self, value: f64) -> Self {
        self.no_data = Some(value);
        self
    }

    pub fn with_overview_levels(mut self, levels: u32) -> Self {
        self.overview_levels = levels;
        self
    }
}

/// WCS backend at one overview level.
pub struct WcsBackend<C: HttpClient> {
    config: WcsConfig,
    client: Arc<C>,
    level: u32,
    name: String,
}

impl<C: HttpClient + 'static> WcsBackend<C> {
    pub fn new(config: WcsConfig, client: C) -> Self {
        Self::at_level(config, Arc::new(client), 0)
    }

    fn at_level(config: WcsConfig, client: Arc<C>, level: u32) -> Self {
        let name = format!("wcs:{}@{}", config.coverage, level);
        Self {
            config,
            client,
            level,
            name,
        }
    }

    /// Overview level, 0 for the full-resolution grid.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Grid size at this level (each level halves both axes, rounding up).
    pub fn grid_size(&self) -> (u32, u32) {
        let shrink = |n: u32| n.div_ceil(1 << self.level).max(1);
        (shrink(self.config.width), shrink(self.config.height))
    }

    fn step(&self) -> StepSize {
        let (w, h) = self.grid_size();
        StepSize::north_up(&self.config.bounds, w, h)
    }

    /// Builds the `GetCoverage` URL for a cell rectangle.
    pub fn coverage_url(&self, rect: &RasterRect) -> String {
        let step = self.step();
        let b = &self.config.bounds;
        let min_x = b.x_min + rect.x_min as f64 * step.x;
        let max_x = b.x_min + (rect.x_max + 1) as f64 * step.x;
        let max_y = b.y_max + rect.y_min as f64 * step.y;
        let min_y = b.y_max + (rect.y_max + 1) as f64 * step.y;

        format!(
            "{}?SERVICE=WCS&VERSION=1.0.0&REQUEST=GetCoverage&COVERAGE={}&CRS={}&BBOX={},{},{},{}&WIDTH={}&HEIGHT={}&FORMAT={}",
            self.config.base_url,
            self.config.coverage,
            self.config.crs,
            min_x,
            min_y,
            max_x,
            max_y,
            rect.columns(),
            rect.rows(),
            self.config.format
        )
    }
}

impl<C: HttpClient + 'static> Backend for WcsBackend<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, srs_override: Option<&SpatialReference>) -> Result<DatasetInfo, BackendError> {
        let (width, height) = self.grid_size();
        let srs = match srs_override {
            Some(srs) => srs.clone(),
            None => SpatialReference::parse(&self.config.crs).unwrap_or_default(),
        };
        Ok(DatasetInfo {
            width,
            height,
            bounds: self.config.bounds,
            step: self.step(),
            srs,
            bands: (0..self.config.band_count)
                .map(|_| BandInfo::new(self.config.sample_type, width, height))
                .collect(),
        })
    }

    fn read_region(&self, rect: &RasterRect, bands: &[usize]) -> Result<Vec<u8>, BackendError> {
        let (width, height) = self.grid_size();
        check_region(width, height, self.config.band_count, rect, bands)?;

        let url = self.coverage_url(rect);
        debug!(backend = %self.name, %rect, "WCS GetCoverage");
        let payload = self.client.get(&url)?;
        decode_image(
            &payload,
            self.config.sample_type,
            self.config.band_count,
            rect.columns(),
            rect.rows(),
            bands,
        )
    }

    fn no_data_value(&self, _band: usize) -> Option<f64> {
        self.config.no_data
    }

    fn has_overview(&self) -> bool {
        let (w, h) = self.grid_size();
        self.level < self.config.overview_levels && w > 1 && h > 1
    }

    fn open_overview(&self) -> Result<Arc<dyn Backend>, BackendError> {
        if !self.has_overview() {
            return Err(BackendError::Structure(format!("{} has no overviews", self.name)));
        }
        Ok(Arc::new(Self::at_level(
            self.config.clone(),
            self.client.clone(),
            self.level + 1,
        )))
    }
}

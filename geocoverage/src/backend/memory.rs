//! Synthetic in-memory raster backend.
//!
//! Holds every band fully in memory. Counts reads and can inject transient
//! failures, which makes it the backend of choice for exercising the cache,
//! retry and batching paths.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{check_region, Backend, BackendError, BandInfo, ColorInterpretation, DatasetInfo};
use crate::codec::{encode_value, Palette, SampleType};
use crate::coord::{Bounds, RasterRect, SpatialReference, StepSize};

/// Failure injection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Never,
    Always,
    /// Fail this many reads, then succeed.
    First,
}

/// In-memory raster with read accounting.
pub struct MemoryBackend {
    name: String,
    width: u32,
    height: u32,
    bounds: Bounds,
    step: StepSize,
    srs: SpatialReference,
    bands: Vec<BandInfo>,
    data: Vec<Vec<u8>>,
    no_data: Vec<Option<f64>>,
    overview: Option<Arc<MemoryBackend>>,
    failure_mode: FailureMode,
    failures_left: AtomicU32,
    read_delay: Duration,
    reads: AtomicU64,
    regions: Mutex<Vec<RasterRect>>,
}

impl MemoryBackend {
    /// Creates a zero-filled raster.
    ///
    /// # Arguments
    ///
    /// * `width`, `height` - Raster size in cells
    /// * `sample_type` - Sample encoding shared by all bands
    /// * `band_count` - Number of bands
    /// * `bounds` - Native extent
    /// * `step` - Native distance per cell (negative for max-first axes)
    pub fn new(
        width: u32,
        height: u32,
        sample_type: SampleType,
        band_count: usize,
        bounds: Bounds,
        step: StepSize,
    ) -> Self {
        let band_len = width as usize * height as usize * sample_type.byte_width();
        Self {
            name: "memory".to_string(),
            width,
            height,
            bounds,
            step,
            srs: SpatialReference::Projected,
            bands: (0..band_count)
                .map(|_| BandInfo::new(sample_type, width, height))
                .collect(),
            data: vec![vec![0u8; band_len]; band_count],
            no_data: vec![None; band_count],
            overview: None,
            failure_mode: FailureMode::Never,
            failures_left: AtomicU32::new(0),
            read_delay: Duration::ZERO,
            reads: AtomicU64::new(0),
            regions: Mutex::new(Vec::new()),
        }
    }

    /// Creates a north-up raster of `width × height` cells covering `bounds`.
    pub fn north_up(
        width: u32,
        height: u32,
        sample_type: SampleType,
        band_count: usize,
        bounds: Bounds,
    ) -> Self {
        let step = StepSize::north_up(&bounds, width, height);
        Self::new(width, height, sample_type, band_count, bounds, step)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_srs(mut self, srs: SpatialReference) -> Self {
        self.srs = srs;
        self
    }

    /// Fills every band value from `f(band, x, y)`.
    pub fn with_fill<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, u32, u32) -> f64,
    {
        for band in 0..self.bands.len() {
            for y in 0..self.height {
                for x in 0..self.width {
                    self.write(band, x, y, f(band, x, y));
                }
            }
        }
        self
    }

    pub fn with_no_data(mut self, band: usize, value: f64) -> Self {
        if let Some(slot) = self.no_data.get_mut(band) {
            *slot = Some(value);
        }
        self
    }

    pub fn with_color(mut self, band: usize, color: ColorInterpretation) -> Self {
        if let Some(info) = self.bands.get_mut(band) {
            info.color = color;
        }
        self
    }

    pub fn with_palette(mut self, band: usize, palette: Palette) -> Self {
        if let Some(info) = self.bands.get_mut(band) {
            info.color = ColorInterpretation::Palette;
            info.palette = Some(palette);
        }
        self
    }

    pub fn with_elevation(mut self, band: usize) -> Self {
        if let Some(info) = self.bands.get_mut(band) {
            info.is_elevation = true;
        }
        self
    }

    /// Overrides the description of one band without touching its data.
    pub fn with_band_info(mut self, band: usize, info: BandInfo) -> Self {
        if let Some(slot) = self.bands.get_mut(band) {
            *slot = info;
        }
        self
    }

    pub fn with_overview(mut self, overview: MemoryBackend) -> Self {
        self.overview = Some(Arc::new(overview));
        self
    }

    /// Every read fails with a transient error.
    pub fn failing(mut self) -> Self {
        self.failure_mode = FailureMode::Always;
        self
    }

    /// The first `count` reads fail with a transient error.
    pub fn failing_first(mut self, count: u32) -> Self {
        self.failure_mode = FailureMode::First;
        self.failures_left = AtomicU32::new(count);
        self
    }

    /// Sleeps this long in every read, like a slow remote source.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Writes one band value.
    pub fn write(&mut self, band: usize, x: u32, y: u32, value: f64) {
        let sample_type = self.bands[band].sample_type;
        let width = sample_type.byte_width();
        let offset = (y as usize * self.width as usize + x as usize) * width;
        self.data[band][offset..offset + width].copy_from_slice(&encode_value(value, sample_type));
    }

    /// Raw bytes of one band value.
    pub fn raw_value(&self, band: usize, x: u32, y: u32) -> &[u8] {
        let width = self.bands[band].sample_type.byte_width();
        let offset = (y as usize * self.width as usize + x as usize) * width;
        &self.data[band][offset..offset + width]
    }

    /// Number of `read_region` calls so far, failed ones included.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Regions requested so far, in call order.
    pub fn requested_regions(&self) -> Vec<RasterRect> {
        self.regions.lock().clone()
    }

    pub fn reset_counters(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.regions.lock().clear();
    }

    fn should_fail(&self) -> bool {
        match self.failure_mode {
            FailureMode::Never => false,
            FailureMode::Always => true,
            FailureMode::First => self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
        }
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, srs_override: Option<&SpatialReference>) -> Result<DatasetInfo, BackendError> {
        Ok(DatasetInfo {
            width: self.width,
            height: self.height,
            bounds: self.bounds,
            step: self.step,
            srs: srs_override.cloned().unwrap_or_else(|| self.srs.clone()),
            bands: self.bands.clone(),
        })
    }

    fn read_region(&self, rect: &RasterRect, bands: &[usize]) -> Result<Vec<u8>, BackendError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.regions.lock().push(*rect);
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }

        if self.should_fail() {
            return Err(BackendError::Read(format!("{}: injected failure", self.name)));
        }
        check_region(self.width, self.height, self.bands.len(), rect, bands)?;

        let mut out = Vec::new();
        for &band in bands {
            let pixel_bytes = self.bands[band].sample_type.byte_width();
            let row_bytes = self.width as usize * pixel_bytes;
            let line = rect.columns() * pixel_bytes;
            for y in rect.y_min..=rect.y_max {
                let start = y as usize * row_bytes + rect.x_min as usize * pixel_bytes;
                out.extend_from_slice(&self.data[band][start..start + line]);
            }
        }
        Ok(out)
    }

    fn no_data_value(&self, band: usize) -> Option<f64> {
        self.no_data.get(band).copied().flatten()
    }

    fn has_overview(&self) -> bool {
        self.overview.is_some()
    }

    fn open_overview(&self) -> Result<Arc<dyn Backend>, BackendError> {
        match &self.overview {
            Some(overview) => Ok(overview.clone() as Arc<dyn Backend>),
            None => Err(BackendError::Structure(format!(
                "{} has no overviews",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        MemoryBackend::north_up(4, 3, SampleType::Byte, 2, Bounds::new(0.0, 0.0, 4.0, 3.0))
            .with_fill(|band, x, y| (band * 100) as f64 + (y * 10 + x) as f64)
    }

    #[test]
    fn test_read_region_band_sequential() {
        let b = backend();
        let bytes = b.read_region(&RasterRect::new(1, 1, 2, 2), &[0, 1]).unwrap();
        assert_eq!(bytes, vec![11, 12, 21, 22, 111, 112, 121, 122]);
        assert_eq!(b.read_count(), 1);
    }

    #[test]
    fn test_read_region_band_order_follows_request() {
        let b = backend();
        let bytes = b.read_region(&RasterRect::new(0, 0, 0, 0), &[1, 0]).unwrap();
        assert_eq!(bytes, vec![100, 0]);
    }

    #[test]
    fn test_read_outside_raster_is_structural() {
        let b = backend();
        let err = b.read_region(&RasterRect::new(0, 0, 4, 0), &[0]).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_failing_first() {
        let b = backend().failing_first(2);
        let rect = RasterRect::new(0, 0, 0, 0);
        assert!(b.read_region(&rect, &[0]).is_err());
        assert!(b.read_region(&rect, &[0]).is_err());
        assert!(b.read_region(&rect, &[0]).is_ok());
        assert_eq!(b.read_count(), 3);
    }

    #[test]
    fn test_open_applies_srs_override() {
        let b = backend();
        let info = b.open(Some(&SpatialReference::Geographic)).unwrap();
        assert_eq!(info.srs, SpatialReference::Geographic);
        assert_eq!(info.bands.len(), 2);
        assert_eq!(info.step, StepSize::new(1.0, -1.0));
    }

    #[test]
    fn test_uint16_write_read() {
        let mut b = MemoryBackend::north_up(2, 2, SampleType::UInt16, 1, Bounds::new(0.0, 0.0, 2.0, 2.0));
        b.write(0, 1, 0, 513.0);
        assert_eq!(b.raw_value(0, 1, 0), &[1, 2]);
    }
}

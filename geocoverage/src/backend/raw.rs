//! Header-less band-sequential raster files.
//!
//! The file holds `band_count` consecutive blocks, each `height` rows of
//! `width` little-endian values. Geometry is supplied by configuration
//! rather than read from a header.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

use super::{check_region, Backend, BackendError, BandInfo, DatasetInfo};
use crate::codec::SampleType;
use crate::coord::{Bounds, RasterRect, SpatialReference, StepSize};

/// Description of a raw raster file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFileConfig {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub band_count: usize,
    pub sample_type: SampleType,
    pub bounds: Bounds,
    pub srs: SpatialReference,
    pub no_data: Option<f64>,
}

impl RawFileConfig {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32, sample_type: SampleType) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            band_count: 1,
            sample_type,
            bounds: Bounds::new(0.0, 0.0, f64::from(width), f64::from(height)),
            srs: SpatialReference::Unknown,
            no_data: None,
        }
    }

    pub fn with_bands(mut self, band_count: usize) -> Self {
        self.band_count = band_count;
        self
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_srs(mut self, srs: SpatialReference) -> Self {
        self.srs = srs;
        self
    }

    pub fn with_no_data(mut self, value: f64) -> Self {
        self.no_data = Some(value);
        self
    }

    fn expected_len(&self) -> u64 {
        u64::from(self.width)
            * u64::from(self.height)
            * self.band_count as u64
            * self.sample_type.byte_width() as u64
    }
}

/// Reads regions of a raw raster file with seek and `read_exact`.
pub struct RawFileBackend {
    config: RawFileConfig,
    file: Mutex<Option<File>>,
}

impl RawFileBackend {
    pub fn new(config: RawFileConfig) -> Self {
        Self {
            config,
            file: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RawFileConfig {
        &self.config
    }
}

impl Backend for RawFileBackend {
    fn name(&self) -> &str {
        "raw"
    }

    fn open(&self, srs_override: Option<&SpatialReference>) -> Result<DatasetInfo, BackendError> {
        let file = File::open(&self.config.path).map_err(|e| {
            BackendError::Structure(format!(
                "cannot open {}: {}",
                self.config.path.display(),
                e
            ))
        })?;
        let len = file
            .metadata()
            .map_err(|e| BackendError::Read(e.to_string()))?
            .len();
        if len != self.config.expected_len() {
            return Err(BackendError::Structure(format!(
                "{} is {} bytes, expected {} for {}x{}x{} {}",
                self.config.path.display(),
                len,
                self.config.expected_len(),
                self.config.width,
                self.config.height,
                self.config.band_count,
                self.config.sample_type
            )));
        }
        *self.file.lock() = Some(file);
        debug!(path = %self.config.path.display(), "Opened raw raster");

        let c = &self.config;
        Ok(DatasetInfo {
            width: c.width,
            height: c.height,
            bounds: c.bounds,
            step: StepSize::north_up(&c.bounds, c.width, c.height),
            srs: srs_override.cloned().unwrap_or_else(|| c.srs.clone()),
            bands: (0..c.band_count)
                .map(|_| BandInfo::new(c.sample_type, c.width, c.height))
                .collect(),
        })
    }

    fn read_region(&self, rect: &RasterRect, bands: &[usize]) -> Result<Vec<u8>, BackendError> {
        let c = &self.config;
        check_region(c.width, c.height, c.band_count, rect, bands)?;

        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| BackendError::Structure("raw file is not open".to_string()))?;

        let pixel_bytes = c.sample_type.byte_width() as u64;
        let line = rect.columns() * pixel_bytes as usize;
        let mut out = vec![0u8; line * rect.rows() * bands.len()];
        let mut cursor = 0;

        for &band in bands {
            for y in rect.y_min..=rect.y_max {
                let cell = (band as u64 * u64::from(c.height) + y as u64) * u64::from(c.width)
                    + rect.x_min as u64;
                file.seek(SeekFrom::Start(cell * pixel_bytes))
                    .map_err(|e| BackendError::Read(format!("seek failed: {}", e)))?;
                file.read_exact(&mut out[cursor..cursor + line])
                    .map_err(|e| BackendError::Read(format!("read failed: {}", e)))?;
                cursor += line;
            }
        }
        Ok(out)
    }

    fn no_data_value(&self, _band: usize) -> Option<f64> {
        self.config.no_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(width: u32, height: u32, bands: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for band in 0..bands {
            for y in 0..height {
                for x in 0..width {
                    let v = (band as u32 * 100 + y * 10 + x) as u16;
                    file.write_all(&v.to_le_bytes()).unwrap();
                }
            }
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_open_and_read() {
        let file = fixture(5, 4, 2);
        let backend = RawFileBackend::new(
            RawFileConfig::new(file.path(), 5, 4, SampleType::UInt16).with_bands(2),
        );
        let info = backend.open(None).unwrap();
        assert_eq!(info.bands.len(), 2);

        let bytes = backend
            .read_region(&RasterRect::new(3, 2, 4, 3), &[1])
            .unwrap();
        let values: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(values, vec![123, 124, 133, 134]);
    }

    #[test]
    fn test_size_mismatch_is_structural() {
        let file = fixture(5, 4, 1);
        let backend = RawFileBackend::new(RawFileConfig::new(file.path(), 6, 4, SampleType::UInt16));
        let err = backend.open(None).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_read_before_open() {
        let file = fixture(2, 2, 1);
        let backend = RawFileBackend::new(RawFileConfig::new(file.path(), 2, 2, SampleType::UInt16));
        assert!(backend.read_region(&RasterRect::new(0, 0, 0, 0), &[0]).is_err());
    }
}

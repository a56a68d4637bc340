//! Backend for an explicitly empty coverage.

use super::{Backend, BackendError, BandInfo, DatasetInfo};
use crate::codec::SampleType;
use crate::coord::{Bounds, RasterRect, SpatialReference, StepSize};

/// A coverage with no cells. Every query answers "no value".
#[derive(Debug, Default)]
pub struct NullBackend;

impl Backend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn open(&self, srs_override: Option<&SpatialReference>) -> Result<DatasetInfo, BackendError> {
        Ok(DatasetInfo {
            width: 0,
            height: 0,
            bounds: Bounds::empty(),
            step: StepSize::new(1.0, -1.0),
            srs: srs_override.cloned().unwrap_or_default(),
            bands: vec![BandInfo::new(SampleType::Byte, 0, 0)],
        })
    }

    fn read_region(&self, rect: &RasterRect, _bands: &[usize]) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::Structure(format!(
            "null coverage has no data at {}",
            rect
        )))
    }

    fn no_data_value(&self, _band: usize) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_empty() {
        let info = NullBackend.open(None).unwrap();
        assert!(info.raster_rect().is_empty());
        assert!(info.bounds.is_empty());
        assert!(NullBackend
            .read_region(&RasterRect::new(0, 0, 0, 0), &[0])
            .is_err());
    }
}

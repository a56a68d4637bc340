//! Overview chain
//!
//! A multi-resolution stack of coverages over the same dataset. The chain is
//! built once by following the backend's overviews until none remain or a
//! level drops below [`MIN_OVERVIEW_RESOLUTION`]. That first level below the
//! minimum is kept as the coarsest one; nothing past it is opened. Queries
//! then pick
//! the coarsest level that still carries enough detail.
//!
//! Resolution here is a detail level, `log2(equator / pixel size)`: each
//! step up halves the pixel size.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::coord::SpatialReference;
use crate::coverage::{CoverageConfig, CoverageDescriptor, CoverageValueService};
use crate::error::CoverageError;

// =============================================================================
// Overview Constants
// =============================================================================

/// Length of the equator in metres.
pub const EQUATOR_M: f64 = 40_075_016.686;

/// Metres per degree of longitude at the equator.
pub const METRES_PER_DEGREE: f64 = 111_319.49;

/// Overviews past the first level coarser than this are not opened.
pub const MIN_OVERVIEW_RESOLUTION: f64 = 5.0;

/// Upper bound on the number of levels in a chain.
pub const DEFAULT_MAX_LEVELS: usize = 32;

/// Detail level of a coverage.
pub fn resolution_of(descriptor: &CoverageDescriptor) -> f64 {
    let step = descriptor.step.x.abs().max(descriptor.step.y.abs());
    let pixel_m = match descriptor.srs {
        SpatialReference::Geographic => step * METRES_PER_DEGREE,
        _ => step,
    };
    resolution_for_pixel_size(pixel_m)
}

/// Detail level at which one pixel spans `pixel_m` metres.
pub fn resolution_for_pixel_size(pixel_m: f64) -> f64 {
    if pixel_m <= 0.0 {
        return 0.0;
    }
    (EQUATOR_M / pixel_m).log2()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverviewConfig {
    /// Settings every level is opened with.
    pub coverage: CoverageConfig,
    pub min_resolution: f64,
    pub max_levels: usize,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            coverage: CoverageConfig::default(),
            min_resolution: MIN_OVERVIEW_RESOLUTION,
            max_levels: DEFAULT_MAX_LEVELS,
        }
    }
}

impl OverviewConfig {
    pub fn new(coverage: CoverageConfig) -> Self {
        Self {
            coverage,
            ..Self::default()
        }
    }

    pub fn with_min_resolution(mut self, resolution: f64) -> Self {
        self.min_resolution = resolution;
        self
    }

    pub fn with_max_levels(mut self, levels: usize) -> Self {
        self.max_levels = levels.max(1);
        self
    }
}

/// One level of the chain.
pub struct OverviewLevel {
    pub service: Arc<CoverageValueService>,
    pub resolution: f64,
}

/// Coverages of one dataset, coarsest first.
pub struct OverviewChain {
    levels: Vec<OverviewLevel>,
}

impl OverviewChain {
    /// Opens `backend` and every usable overview beneath it.
    ///
    /// # Errors
    ///
    /// Fails only if the base level cannot be opened. Overview failures end
    /// the chain early.
    pub fn build(backend: Arc<dyn Backend>, config: &OverviewConfig) -> Result<Self, CoverageError> {
        let base = CoverageValueService::open_new(backend.clone(), config.coverage.clone())?;
        let resolution = resolution_of(&*base.descriptor()?);
        let mut levels = vec![OverviewLevel {
            service: Arc::new(base),
            resolution,
        }];

        let mut cursor = backend;
        while cursor.has_overview() && levels.len() < config.max_levels {
            cursor = match cursor.open_overview() {
                Ok(next) => next,
                Err(e) => {
                    warn!(backend = cursor.name(), error = %e, "Overview unavailable");
                    break;
                }
            };

            let service = match CoverageValueService::open_new(cursor.clone(), config.coverage.clone()) {
                Ok(service) => service,
                Err(e) => {
                    warn!(backend = cursor.name(), error = %e, "Overview failed to open");
                    break;
                }
            };
            let resolution = resolution_of(&*service.descriptor()?);
            if resolution < levels[0].resolution {
                levels.insert(
                    0,
                    OverviewLevel {
                        service: Arc::new(service),
                        resolution,
                    },
                );
            } else {
                debug!(resolution, "Overview is not coarser, skipped");
            }
            if resolution < config.min_resolution {
                debug!(resolution, "Overview below minimum resolution, chain complete");
                break;
            }
        }

        info!(
            levels = levels.len(),
            finest = levels[levels.len() - 1].resolution,
            coarsest = levels[0].resolution,
            "Overview chain built"
        );
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[OverviewLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The full-resolution level.
    pub fn finest(&self) -> &Arc<CoverageValueService> {
        &self.levels[self.levels.len() - 1].service
    }

    /// Finest level whose resolution does not exceed `target`.
    ///
    /// Falls back to the coarsest level when every level is finer.
    pub fn select_level(&self, target: f64) -> &Arc<CoverageValueService> {
        let index = (1..self.levels.len())
            .rev()
            .find(|i| self.levels[*i].resolution <= target)
            .unwrap_or(0);
        &self.levels[index].service
    }

    /// Level for a spatial precision in metres (half a pixel).
    pub fn select_for_precision(&self, precision_m: f64) -> &Arc<CoverageValueService> {
        self.select_level(resolution_for_pixel_size(precision_m * 2.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::codec::SampleType;
    use crate::coord::Bounds;

    /// Pyramid from `size` down to 4 cells over one equator-wide square.
    fn pyramid(size: u32) -> MemoryBackend {
        let backend = MemoryBackend::north_up(
            size,
            size,
            SampleType::Byte,
            1,
            Bounds::new(0.0, 0.0, EQUATOR_M, EQUATOR_M),
        )
        .with_name(format!("level-{}", size));
        if size > 4 {
            backend.with_overview(pyramid(size / 2))
        } else {
            backend
        }
    }

    fn chain() -> OverviewChain {
        OverviewChain::build(Arc::new(pyramid(256)), &OverviewConfig::default()).unwrap()
    }

    #[test]
    fn test_resolution_for_pixel_size() {
        assert!((resolution_for_pixel_size(EQUATOR_M / 256.0) - 8.0).abs() < 1e-9);
        assert_eq!(resolution_for_pixel_size(0.0), 0.0);
    }

    #[test]
    fn test_chain_stops_at_minimum_resolution() {
        let chain = chain();
        // 16 cells is level 4, kept as the coarsest; 8 and 4 are never opened
        assert_eq!(chain.len(), 5);
        let resolutions: Vec<f64> = chain.levels().iter().map(|l| l.resolution.round()).collect();
        assert_eq!(resolutions, vec![4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(chain.levels()[0].service.backend().name(), "level-16");
    }

    #[test]
    fn test_select_level() {
        let chain = chain();
        assert_eq!(chain.select_level(6.5).backend().name(), "level-64");
        assert_eq!(chain.select_level(100.0).backend().name(), "level-256");
        assert_eq!(chain.select_level(1.0).backend().name(), "level-16");
        assert_eq!(chain.finest().backend().name(), "level-256");
    }

    #[test]
    fn test_select_for_precision() {
        let chain = chain();
        // half a 128-cell pixel
        let precision = EQUATOR_M / 128.0 / 2.0;
        assert_eq!(chain.select_for_precision(precision * 1.01).backend().name(), "level-64");
    }

    #[test]
    fn test_max_levels() {
        let config = OverviewConfig::default().with_max_levels(2);
        let chain = OverviewChain::build(Arc::new(pyramid(256)), &config).unwrap();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_geographic_resolution() {
        let backend = MemoryBackend::north_up(
            360,
            180,
            SampleType::Byte,
            1,
            Bounds::new(-180.0, -90.0, 180.0, 90.0),
        )
        .with_srs(SpatialReference::Geographic);
        let chain = OverviewChain::build(Arc::new(backend), &OverviewConfig::default()).unwrap();
        // one degree pixels: 360 across the equator
        assert!((chain.levels()[0].resolution - 360f64.log2()).abs() < 1e-3);
    }
}

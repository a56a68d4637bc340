//! Composite coverage
//!
//! Answers point queries from the first of several coverages that has a
//! value there. Sources that answered recently are tried first.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::codec::TypedValue;
use crate::coord::NativePoint;
use crate::coverage::CoverageValueService;
use crate::error::CoverageError;

/// Default number of recently successful sources remembered.
pub const DEFAULT_RECENT_SOURCES: usize = 2;

/// Largest supported recent-source list.
pub const MAX_RECENT_SOURCES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeConfig {
    /// Recent sources remembered, 1 to 4.
    pub recent_sources: usize,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            recent_sources: DEFAULT_RECENT_SOURCES,
        }
    }
}

impl CompositeConfig {
    pub fn with_recent_sources(mut self, count: usize) -> Self {
        self.recent_sources = count.clamp(1, MAX_RECENT_SOURCES);
        self
    }
}

/// Several coverages queried as one.
pub struct CompositeCoverage {
    sources: Vec<Arc<CoverageValueService>>,
    recent: Mutex<VecDeque<usize>>,
    capacity: usize,
}

impl CompositeCoverage {
    /// Sources are tried in the given order after the recent ones.
    pub fn new(sources: Vec<Arc<CoverageValueService>>, config: CompositeConfig) -> Self {
        let capacity = config.recent_sources.clamp(1, MAX_RECENT_SOURCES);
        Self {
            sources,
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn sources(&self) -> &[Arc<CoverageValueService>] {
        &self.sources
    }

    /// Source indices remembered as recent, most recent first.
    pub fn recent_sources(&self) -> Vec<usize> {
        self.recent.lock().iter().copied().collect()
    }

    fn remember(&self, index: usize) {
        let mut recent = self.recent.lock();
        if let Some(pos) = recent.iter().position(|i| *i == index) {
            recent.remove(pos);
        }
        recent.push_front(index);
        recent.truncate(self.capacity);
    }

    fn contains(&self, index: usize, native: NativePoint) -> bool {
        self.sources[index]
            .descriptor()
            .map(|d| d.bounds.contains(native))
            .unwrap_or(false)
    }

    /// First value any source has at `native`.
    ///
    /// # Errors
    ///
    /// Propagates the first backend error; sources that are not open are
    /// skipped.
    pub fn get_value(&self, native: NativePoint) -> Result<Option<TypedValue>, CoverageError> {
        let recent = self.recent_sources();

        let candidates = recent
            .iter()
            .copied()
            .chain((0..self.sources.len()).filter(|i| !recent.contains(i)));

        for index in candidates {
            if !self.contains(index, native) {
                continue;
            }
            if let Some(value) = self.sources[index].get_value(native)? {
                trace!(source = index, %native, "Composite hit");
                self.remember(index);
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::codec::{SampleType, Scalar};
    use crate::coord::Bounds;
    use crate::coverage::CoverageConfig;

    fn tile(x0: f64, value: f64, no_data_at: Option<(u32, u32)>) -> Arc<CoverageValueService> {
        let mut backend = MemoryBackend::north_up(
            10,
            10,
            SampleType::Byte,
            1,
            Bounds::new(x0, 0.0, x0 + 10.0, 10.0),
        )
        .with_fill(move |_, _, _| value)
        .with_no_data(0, 0.0);
        if let Some((x, y)) = no_data_at {
            backend.write(0, x, y, 0.0);
        }
        Arc::new(CoverageValueService::open_new(Arc::new(backend), CoverageConfig::default()).unwrap())
    }

    fn byte(v: u8) -> Option<TypedValue> {
        Some(TypedValue::Scalar(Scalar::U8(v)))
    }

    #[test]
    fn test_routes_by_bounds() {
        let composite = CompositeCoverage::new(
            vec![tile(0.0, 1.0, None), tile(10.0, 2.0, None), tile(20.0, 3.0, None)],
            CompositeConfig::default(),
        );
        assert_eq!(composite.get_value(NativePoint::new(25.5, 5.5)).unwrap(), byte(3));
        assert_eq!(composite.get_value(NativePoint::new(5.5, 5.5)).unwrap(), byte(1));
        assert_eq!(composite.recent_sources(), vec![0, 2]);
        assert_eq!(composite.get_value(NativePoint::new(50.0, 5.0)).unwrap(), None);
    }

    #[test]
    fn test_falls_through_no_data() {
        // first source has a hole at its cell (5, 4)
        let composite = CompositeCoverage::new(
            vec![tile(0.0, 1.0, Some((5, 4))), tile(0.0, 2.0, None)],
            CompositeConfig::default(),
        );
        assert_eq!(composite.get_value(NativePoint::new(5.5, 5.5)).unwrap(), byte(2));
        assert_eq!(composite.get_value(NativePoint::new(1.5, 1.5)).unwrap(), byte(1));
    }

    #[test]
    fn test_recent_list_is_bounded() {
        let composite = CompositeCoverage::new(
            vec![tile(0.0, 1.0, None), tile(10.0, 2.0, None), tile(20.0, 3.0, None)],
            CompositeConfig::default().with_recent_sources(1),
        );
        composite.get_value(NativePoint::new(5.5, 5.5)).unwrap();
        composite.get_value(NativePoint::new(15.5, 5.5)).unwrap();
        assert_eq!(composite.recent_sources(), vec![1]);
    }

    #[test]
    fn test_capacity_clamped() {
        assert_eq!(CompositeConfig::default().with_recent_sources(9).recent_sources, 4);
        assert_eq!(CompositeConfig::default().with_recent_sources(0).recent_sources, 1);
    }
}

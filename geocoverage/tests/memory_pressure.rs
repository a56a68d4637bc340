//! Process-wide buffer release.
//!
//! Kept in its own test binary: the buffer registry is shared by every
//! coverage in the process.

use std::sync::Arc;
use std::time::Duration;

use geocoverage::backend::MemoryBackend;
use geocoverage::buffer::{free_all_large_buffers, DEFAULT_TRIM_TO};
use geocoverage::codec::SampleType;
use geocoverage::coord::{Bounds, RasterCell, RasterRect};
use geocoverage::coverage::{CoverageConfig, CoverageValueService};
use geocoverage::loader::RetryPolicy;

fn coverage() -> (Arc<MemoryBackend>, CoverageValueService) {
    let backend = Arc::new(
        MemoryBackend::north_up(100, 100, SampleType::Byte, 1, Bounds::new(0.0, 0.0, 100.0, 100.0))
            .with_fill(|_, x, y| f64::from((x + y) % 200)),
    );
    let config = CoverageConfig::new("pressure").with_retry(RetryPolicy::fixed(1, Duration::ZERO));
    let service = CoverageValueService::open_new(backend.clone(), config).unwrap();
    (backend, service)
}

#[test]
fn test_free_all_large_buffers() {
    let (_, first) = coverage();
    let (second_backend, second) = coverage();

    for i in 0..10 {
        let rect = RasterRect::new(i * 10, 0, i * 10 + 9, 9);
        first.read_buffer(&rect).unwrap();
        second.read_buffer(&rect).unwrap();
    }
    assert_eq!(first.resident_rects().len(), 10);

    let released = free_all_large_buffers();

    assert_eq!(released, 2 * (10 - DEFAULT_TRIM_TO));
    assert_eq!(first.resident_rects().len(), DEFAULT_TRIM_TO);
    assert_eq!(second.resident_rects().len(), DEFAULT_TRIM_TO);

    // trimmed regions are reloaded on demand
    second_backend.reset_counters();
    assert!(second.get_value_at_cell(RasterCell::new(5, 5)).unwrap().is_some());
    assert_eq!(second_backend.read_count(), 1);
}

//! End-to-end coverage behaviour against synthetic datasets.
//!
//! Run with: `cargo test --test coverage_scenarios`

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use geocoverage::backend::{MemoryBackend, RawFileBackend, RawFileConfig};
use geocoverage::codec::{SampleType, Scalar, TypedValue};
use geocoverage::coord::{Bounds, NativePoint, RasterCell, RasterRect};
use geocoverage::coverage::{CoverageConfig, CoverageValueService};
use geocoverage::loader::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use geocoverage::CoverageError;

// ============================================================================
// Helper Functions
// ============================================================================

fn no_wait(attempts: u32) -> CoverageConfig {
    CoverageConfig::new("test").with_retry(RetryPolicy::fixed(attempts, Duration::ZERO))
}

fn byte(v: u8) -> Option<TypedValue> {
    Some(TypedValue::Scalar(Scalar::U8(v)))
}

fn u16_value(v: u16) -> Option<TypedValue> {
    Some(TypedValue::Scalar(Scalar::U16(v)))
}

fn dem_value(x: i64, y: i64) -> u16 {
    (x * 300 + y) as u16
}

fn dem() -> Arc<MemoryBackend> {
    Arc::new(
        MemoryBackend::north_up(200, 200, SampleType::UInt16, 1, Bounds::new(0.0, 0.0, 200.0, 200.0))
            .with_fill(|_, x, y| f64::from(dem_value(i64::from(x), i64::from(y)))),
    )
}

/// 1000×1000 byte raster on disk; cell (x, y) holds `(x + y) % 250`.
fn write_raw_dataset(overrides: &[(usize, usize, u8)]) -> tempfile::NamedTempFile {
    let mut data = vec![0u8; 1000 * 1000];
    for y in 0..1000 {
        for x in 0..1000 {
            data[y * 1000 + x] = ((x + y) % 250) as u8;
        }
    }
    for &(x, y, v) in overrides {
        data[y * 1000 + x] = v;
    }
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    file
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_end_to_end_raw_file() {
    let file = write_raw_dataset(&[(500, 499, 42), (10, 20, 255)]);
    let config = RawFileConfig::new(file.path(), 1000, 1000, SampleType::Byte).with_no_data(255.0);
    let backend = Arc::new(RawFileBackend::new(config));

    let service = CoverageValueService::open_new(backend, no_wait(3)).unwrap();
    let descriptor = service.descriptor().unwrap();
    assert_eq!(descriptor.step.x, 1.0);
    assert_eq!(descriptor.step.y, -1.0);

    // negative Y step: native y 500.5 lands on row 499
    assert_eq!(
        descriptor.native_to_cell(NativePoint::new(500.5, 500.5)),
        RasterCell::new(500, 499)
    );
    assert_eq!(service.get_value(NativePoint::new(500.5, 500.5)).unwrap(), byte(42));

    // row 20 spans native y 979..980
    assert_eq!(service.get_value(NativePoint::new(10.5, 979.5)).unwrap(), None);
    assert_eq!(service.get_value(NativePoint::new(11.5, 979.5)).unwrap(), byte(31));
    assert_eq!(service.get_value(NativePoint::new(1000.5, 500.0)).unwrap(), None);
}

#[test]
fn test_cache_matches_backend() {
    let backend = dem();
    let config = no_wait(3).with_cache_limits(4, 2);
    let service = CoverageValueService::open_new(backend.clone(), config).unwrap();
    let mut rng = StdRng::seed_from_u64(0x6e0c);

    for _ in 0..500 {
        if rng.random_range(0..4) == 0 {
            let x = rng.random_range(-20..200);
            let y = rng.random_range(-20..200);
            let w = rng.random_range(1..60);
            let h = rng.random_range(1..60);
            service.read_buffer(&RasterRect::new(x, y, x + w, y + h)).unwrap();
        } else {
            let x = rng.random_range(0..200);
            let y = rng.random_range(0..200);
            assert_eq!(
                service.get_value_at_cell(RasterCell::new(x, y)).unwrap(),
                u16_value(dem_value(x, y)),
                "cell ({}, {})",
                x,
                y
            );
        }
    }
    assert!(service.resident_rects().len() <= 4);
}

#[test]
fn test_matrix_origin_law() {
    let service = CoverageValueService::open_new(dem(), no_wait(3)).unwrap();
    // center cell (100, 100)
    let center = NativePoint::new(100.5, 99.5);

    let matrix = service.get_matrix_of_values(center, 5, 5).unwrap();
    assert_eq!(matrix.origin, RasterCell::new(98, 98));
    for x in 0..5 {
        for y in 0..5 {
            let expected = dem_value(98 + i64::from(x), 98 + i64::from(y));
            assert_eq!(matrix.get(x, y), u16_value(expected).as_ref());
        }
    }

    // even windows extend further toward higher indices
    let even = service.get_matrix_of_values(center, 4, 2).unwrap();
    assert_eq!(even.origin, RasterCell::new(99, 100));
}

#[test]
fn test_no_data_precedence() {
    let mut backend =
        MemoryBackend::north_up(4, 4, SampleType::Byte, 1, Bounds::new(0.0, 0.0, 4.0, 4.0))
            .with_fill(|_, _, _| 7.0)
            .with_no_data(0, 255.0);
    backend.write(0, 0, 0, 255.0);
    backend.write(0, 1, 0, 0.0);

    let config = no_wait(3).with_forced_no_data(0.0);
    let service = CoverageValueService::open_new(Arc::new(backend), config).unwrap();

    assert_eq!(service.get_value_at_cell(RasterCell::new(0, 0)).unwrap(), None);
    assert_eq!(service.get_value_at_cell(RasterCell::new(1, 0)).unwrap(), None);
    assert_eq!(service.get_value_at_cell(RasterCell::new(2, 0)).unwrap(), byte(7));
}

#[test]
fn test_default_retry_budget_is_ten_attempts() {
    let backend = Arc::new(
        MemoryBackend::north_up(8, 8, SampleType::Byte, 1, Bounds::new(0.0, 0.0, 8.0, 8.0))
            .failing(),
    );
    let service = CoverageValueService::open_new(backend.clone(), no_wait(DEFAULT_MAX_ATTEMPTS)).unwrap();

    let err = service.get_value_at_cell(RasterCell::new(3, 3)).unwrap_err();
    assert_eq!(DEFAULT_MAX_ATTEMPTS, 10);
    assert!(matches!(err, CoverageError::BackendRead { attempts: 10, .. }));
    assert_eq!(backend.read_count(), 10);
}

#[test]
fn test_transient_failures_recover() {
    let backend = Arc::new(
        MemoryBackend::north_up(8, 8, SampleType::Byte, 1, Bounds::new(0.0, 0.0, 8.0, 8.0))
            .with_fill(|_, x, _| f64::from(x))
            .failing_first(4),
    );
    let service = CoverageValueService::open_new(backend.clone(), no_wait(5)).unwrap();
    assert_eq!(service.get_value_at_cell(RasterCell::new(6, 1)).unwrap(), byte(6));
    assert_eq!(backend.read_count(), 5);
}

#[test]
fn test_axis_limit_reads_are_reassembled() {
    let backend = dem();
    let service = CoverageValueService::open_new(backend.clone(), no_wait(3).with_axis_limit(16)).unwrap();

    let matrix = service.get_matrix_of_values(NativePoint::new(50.5, 149.5), 40, 20).unwrap();
    assert_eq!(matrix.present(), 800);
    // 40 columns in 3 pieces, 20 rows in 2
    assert_eq!(backend.read_count(), 6);
    assert!(backend
        .requested_regions()
        .iter()
        .all(|r| r.columns() <= 16 && r.rows() <= 16));
    let origin = matrix.origin;
    assert_eq!(
        matrix.get(39, 19),
        u16_value(dem_value(origin.x + 39, origin.y + 19)).as_ref()
    );
}

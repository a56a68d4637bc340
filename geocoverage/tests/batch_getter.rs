//! Batch getter behaviour across many requests.
//!
//! Run with: `cargo test --test batch_getter`

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use geocoverage::backend::MemoryBackend;
use geocoverage::batch::{AsyncBatchGetter, BatchConfig, CompletedRequest, RequestConsumer};
use geocoverage::codec::{SampleType, Scalar, TypedValue};
use geocoverage::coord::{Bounds, NativePoint, SpatialReference};
use geocoverage::coverage::{CoverageConfig, CoverageValueService};
use geocoverage::loader::RetryPolicy;
use geocoverage::CoverageError;

type Collected = Arc<Mutex<Vec<CompletedRequest>>>;

fn collector() -> (Arc<dyn RequestConsumer>, Collected) {
    let seen: Collected = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let consumer: Arc<dyn RequestConsumer> = Arc::new(move |request: CompletedRequest| {
        sink.lock().push(request);
    });
    (consumer, seen)
}

fn open(backend: Arc<MemoryBackend>) -> Arc<CoverageValueService> {
    let config = CoverageConfig::new("batch").with_retry(RetryPolicy::fixed(2, Duration::ZERO));
    Arc::new(CoverageValueService::open_new(backend, config).unwrap())
}

fn u16_value(v: u16) -> TypedValue {
    TypedValue::Scalar(Scalar::U16(v))
}

#[test]
fn test_one_fetch_per_chunk() {
    let backend = Arc::new(
        MemoryBackend::north_up(500, 500, SampleType::UInt16, 1, Bounds::new(0.0, 0.0, 500.0, 500.0))
            .with_fill(|_, x, y| f64::from(x + y)),
    );
    let service = open(backend.clone());
    let descriptor = service.descriptor().unwrap();
    let (consumer, seen) = collector();
    let config = BatchConfig::default().with_chunk_size(128).with_points_per_task(37);
    let getter = AsyncBatchGetter::new(service, consumer, config);

    let mut rng = StdRng::seed_from_u64(42);
    let points: Vec<NativePoint> = (0..5_000)
        .map(|_| NativePoint::new(rng.random_range(0.01..499.99), rng.random_range(0.01..499.99)))
        .collect();
    let chunks: HashSet<_> = points
        .iter()
        .map(|p| descriptor.native_to_cell(*p).chunk_key(128))
        .collect();

    let ids = getter.add_requests(points.clone()).unwrap();
    assert_eq!(ids.len(), 5_000);
    assert!(getter.join().unwrap());

    assert_eq!(backend.read_count() as usize, chunks.len());

    let seen = seen.lock();
    assert_eq!(seen.len(), 5_000);
    let unique: HashSet<_> = seen.iter().map(|r| r.id).collect();
    assert_eq!(unique.len(), 5_000);
    for request in seen.iter() {
        let cell = descriptor.native_to_cell(points[request.id]);
        let expected = u16_value((cell.x + cell.y) as u16);
        assert_eq!(request.center(), Some(&expected));
    }
}

#[test]
fn test_wrap_backfills_from_opposite_edge() {
    let backend = Arc::new(
        MemoryBackend::north_up(360, 180, SampleType::UInt16, 1, Bounds::new(-180.0, -90.0, 180.0, 90.0))
            .with_srs(SpatialReference::Geographic)
            .with_fill(|_, x, _| f64::from(x)),
    );
    let service = open(backend);
    assert!(service.descriptor().unwrap().wrap_x);

    let (consumer, seen) = collector();
    let getter = AsyncBatchGetter::new(service, consumer, BatchConfig::default().with_window(3, 3));
    getter.add_request(NativePoint::new(-179.5, 0.5)).unwrap();
    assert!(getter.join().unwrap());

    let seen = seen.lock();
    let request = &seen[0];
    assert!(request.has_values.iter().all(|has| *has));
    // column 0 of the window is cell -1, read from x = 359
    for y in 0..3 {
        assert_eq!(request.values[y], u16_value(359));
        assert_eq!(request.values[3 + y], u16_value(0));
        assert_eq!(request.values[6 + y], u16_value(1));
    }
}

#[test]
fn test_wrap_chunk_read_once_across_tasks() {
    let backend = Arc::new(
        MemoryBackend::north_up(360, 180, SampleType::UInt16, 1, Bounds::new(-180.0, -90.0, 180.0, 90.0))
            .with_srs(SpatialReference::Geographic)
            .with_fill(|_, x, _| f64::from(x))
            .with_read_delay(Duration::from_millis(20)),
    );
    let (consumer, seen) = collector();
    let config = BatchConfig::default()
        .with_chunk_size(64)
        .with_window(3, 3)
        .with_points_per_task(1)
        .with_worker_threads(8);
    let getter = AsyncBatchGetter::new(open(backend.clone()), consumer, config);

    // rows 0..40 of column 0 share one chunk and one opposite-edge chunk
    for row in 0..40 {
        getter.add_request(NativePoint::new(-179.5, 89.5 - f64::from(row))).unwrap();
    }
    assert!(getter.join().unwrap());

    let mut reads: HashMap<_, usize> = HashMap::new();
    for rect in backend.requested_regions() {
        *reads.entry(rect).or_default() += 1;
    }
    assert_eq!(reads.len(), 2, "regions read: {:?}", reads);
    assert!(reads.values().all(|count| *count == 1), "regions read: {:?}", reads);

    let seen = seen.lock();
    assert_eq!(seen.len(), 40);
    for request in seen.iter() {
        assert_eq!(request.values[1], u16_value(359));
        assert_eq!(request.values[4], u16_value(0));
    }
}

#[test]
fn test_no_wrap_for_projected_extent() {
    let backend = Arc::new(
        MemoryBackend::north_up(360, 180, SampleType::UInt16, 1, Bounds::new(-180.0, -90.0, 180.0, 90.0))
            .with_fill(|_, x, _| f64::from(x)),
    );
    let service = open(backend);
    let (consumer, seen) = collector();
    let getter = AsyncBatchGetter::new(service, consumer, BatchConfig::default().with_window(3, 3));
    getter.add_request(NativePoint::new(-179.5, 0.5)).unwrap();
    assert!(getter.join().unwrap());

    let seen = seen.lock();
    assert_eq!(&seen[0].has_values[0..3], &[false, false, false]);
    assert_eq!(seen[0].has_values.iter().filter(|h| **h).count(), 6);
}

#[test]
fn test_requests_rejected_after_join() {
    let backend = Arc::new(MemoryBackend::north_up(
        10,
        10,
        SampleType::Byte,
        1,
        Bounds::new(0.0, 0.0, 10.0, 10.0),
    ));
    let (consumer, seen) = collector();
    let getter = AsyncBatchGetter::new(open(backend), consumer, BatchConfig::default());
    getter.add_request(NativePoint::new(5.5, 5.5)).unwrap();
    getter.add_request(NativePoint::new(50.0, 50.0)).unwrap();

    assert!(getter.join().unwrap());
    assert!(matches!(
        getter.add_request(NativePoint::new(1.5, 1.5)),
        Err(CoverageError::BatchAlreadyJoined)
    ));
    assert!(matches!(getter.join(), Err(CoverageError::BatchAlreadyJoined)));

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    let outside = seen.iter().find(|r| r.id == 1).unwrap();
    assert!(outside.has_values.iter().all(|has| !has));
}

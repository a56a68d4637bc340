//! Batched asynchronous value fetching
//!
//! [`AsyncBatchGetter`] collects many point requests, groups them by raster
//! chunk and reads each chunk's buffer exactly once. Per-point decoding then
//! fans out over a rayon pool in tasks of [`BatchConfig::points_per_task`].
//!
//! Every request added reaches the consumer exactly once, including requests
//! outside the data extent and requests whose chunk failed to load. Chunks
//! reached only through the X wrap are read at most once per `join` as well.

pub mod fault;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::buffer::RegionBuffer;
use crate::codec::TypedValue;
use crate::coord::{find_center_on_other_side, ChunkKey, NativePoint, RasterCell};
use crate::coverage::{CoverageDescriptor, CoverageValueService};
use crate::error::CoverageError;

pub use fault::{FaultCheckingConsumer, FAULT_COLORS, FAULT_THRESHOLD};

// =============================================================================
// Batch Constants
// =============================================================================

/// Edge of a request chunk in raster cells.
pub const DEFAULT_CHUNK_SIZE: i64 = 1024;

/// Requests decoded per worker task.
pub const DEFAULT_POINTS_PER_TASK: usize = 100;

/// Identifier handed out by [`AsyncBatchGetter::add_request`].
pub type RequestId = usize;

/// Result of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRequest {
    pub id: RequestId,
    pub native: NativePoint,
    /// One flag per window cell, x-major (`x * height + y`).
    pub has_values: Vec<bool>,
    /// One value per window cell; `Null` where `has_values` is false.
    pub values: Vec<TypedValue>,
    pub width: u32,
    pub height: u32,
}

impl CompletedRequest {
    fn empty(id: RequestId, native: NativePoint, width: u32, height: u32) -> Self {
        let cells = width as usize * height as usize;
        Self {
            id,
            native,
            has_values: vec![false; cells],
            values: vec![TypedValue::Null; cells],
            width,
            height,
        }
    }

    /// Value at the window center (lower-center for even sizes).
    pub fn center(&self) -> Option<&TypedValue> {
        let x = (self.width.max(1) as usize - 1) / 2;
        let y = (self.height.max(1) as usize - 1) / 2;
        let index = x * self.height as usize + y;
        match self.has_values.get(index) {
            Some(true) => self.values.get(index),
            _ => None,
        }
    }
}

/// Receives completed requests, possibly from several threads at once.
pub trait RequestConsumer: Send + Sync {
    fn on_request_completed(&self, request: CompletedRequest);

    /// Called once at the end of `join`. Returning false fails the batch.
    fn finish(&self) -> bool {
        true
    }
}

impl<F> RequestConsumer for F
where
    F: Fn(CompletedRequest) + Send + Sync,
{
    fn on_request_completed(&self, request: CompletedRequest) {
        self(request)
    }
}

/// Batch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    pub chunk_size: i64,
    pub points_per_task: usize,
    /// Window width around each request, in cells.
    pub window_width: u32,
    /// Window height around each request, in cells.
    pub window_height: u32,
    /// Dedicated pool size; `None` runs on rayon's global pool.
    pub worker_threads: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            points_per_task: DEFAULT_POINTS_PER_TASK,
            window_width: 1,
            window_height: 1,
            worker_threads: None,
        }
    }
}

impl BatchConfig {
    pub fn with_chunk_size(mut self, chunk_size: i64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_points_per_task(mut self, points: usize) -> Self {
        self.points_per_task = points.max(1);
        self
    }

    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads.max(1));
        self
    }

    /// Padding added around each chunk so edge windows stay inside it.
    pub fn pad(&self) -> i64 {
        i64::from(self.window_width.max(self.window_height)) / 2
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    id: RequestId,
    native: NativePoint,
    cell: RasterCell,
}

#[derive(Default)]
struct BatchState {
    joined: bool,
    next_id: RequestId,
    groups: HashMap<ChunkKey, Vec<PendingRequest>>,
}

type ChunkRead = Result<Option<Arc<RegionBuffer>>, CoverageError>;

/// One load slot per chunk a `join` touches.
///
/// Tasks racing for the same chunk block on its slot until the first one
/// has read it, so each chunk reaches the backend once.
struct ChunkBuffers {
    chunk_size: i64,
    pad: i64,
    slots: HashMap<ChunkKey, OnceLock<ChunkRead>>,
}

impl ChunkBuffers {
    /// Slots for every request chunk plus, on wrapping coverages, every
    /// chunk holding an opposite-edge center.
    fn plan(
        config: &BatchConfig,
        descriptor: &CoverageDescriptor,
        groups: &HashMap<ChunkKey, Vec<PendingRequest>>,
    ) -> Self {
        let mut slots: HashMap<ChunkKey, OnceLock<ChunkRead>> =
            groups.keys().map(|key| (*key, OnceLock::new())).collect();

        if descriptor.wrap_x {
            for request in groups.values().flatten() {
                if let Some(other) = find_center_on_other_side(
                    request.cell,
                    i64::from(config.window_width),
                    descriptor.raster.x_min,
                    descriptor.raster.x_max,
                ) {
                    slots.entry(other.chunk_key(config.chunk_size)).or_default();
                }
            }
        }

        Self {
            chunk_size: config.chunk_size,
            pad: config.pad(),
            slots,
        }
    }

    fn get(&self, service: &CoverageValueService, key: ChunkKey) -> ChunkRead {
        let rect = key.rect(self.chunk_size, self.pad);
        match self.slots.get(&key) {
            Some(slot) => slot.get_or_init(|| service.read_buffer(&rect)).clone(),
            None => service.read_buffer(&rect),
        }
    }
}

/// Window values read for one center cell.
struct Window {
    has_values: Vec<bool>,
    values: Vec<TypedValue>,
}

/// Batched reader over one coverage.
pub struct AsyncBatchGetter {
    service: Arc<CoverageValueService>,
    consumer: Arc<dyn RequestConsumer>,
    config: BatchConfig,
    pool: Option<Arc<ThreadPool>>,
    state: Mutex<BatchState>,
}

impl AsyncBatchGetter {
    /// Creates a getter, building a dedicated pool if the config asks for one.
    pub fn new(
        service: Arc<CoverageValueService>,
        consumer: Arc<dyn RequestConsumer>,
        config: BatchConfig,
    ) -> Self {
        let pool = config.worker_threads.and_then(|threads| {
            match ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("geocoverage-batch-{}", i))
                .build()
            {
                Ok(pool) => Some(Arc::new(pool)),
                Err(e) => {
                    warn!(threads, error = %e, "Batch pool unavailable, using global pool");
                    None
                }
            }
        });
        Self::build(service, consumer, config, pool)
    }

    /// Creates a getter that runs on a shared pool.
    pub fn with_pool(
        service: Arc<CoverageValueService>,
        consumer: Arc<dyn RequestConsumer>,
        config: BatchConfig,
        pool: Arc<ThreadPool>,
    ) -> Self {
        Self::build(service, consumer, config, Some(pool))
    }

    fn build(
        service: Arc<CoverageValueService>,
        consumer: Arc<dyn RequestConsumer>,
        config: BatchConfig,
        pool: Option<Arc<ThreadPool>>,
    ) -> Self {
        Self {
            service,
            consumer,
            config,
            pool,
            state: Mutex::new(BatchState::default()),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Queues a request.
    ///
    /// A request outside the data extent completes immediately with no
    /// values.
    ///
    /// # Errors
    ///
    /// * `BatchAlreadyJoined` once `join` has started
    /// * `NotReady` if the coverage is not open
    pub fn add_request(&self, native: NativePoint) -> Result<RequestId, CoverageError> {
        let id = {
            let mut state = self.state.lock();
            if state.joined {
                return Err(CoverageError::BatchAlreadyJoined);
            }
            let descriptor = self.service.descriptor()?;
            let cell = descriptor.native_to_cell(native);
            let id = state.next_id;
            state.next_id += 1;
            if descriptor.contains_cell(cell) {
                state
                    .groups
                    .entry(cell.chunk_key(self.config.chunk_size))
                    .or_default()
                    .push(PendingRequest { id, native, cell });
                return Ok(id);
            }
            id
        };

        self.consumer.on_request_completed(CompletedRequest::empty(
            id,
            native,
            self.config.window_width,
            self.config.window_height,
        ));
        Ok(id)
    }

    /// Queues every point in `natives`, returning their ids in order.
    pub fn add_requests<I>(&self, natives: I) -> Result<Vec<RequestId>, CoverageError>
    where
        I: IntoIterator<Item = NativePoint>,
    {
        natives.into_iter().map(|n| self.add_request(n)).collect()
    }

    /// Runs every queued request to completion.
    ///
    /// Blocks until the consumer has seen every request. Returns false if any
    /// chunk or decode failed, or if the consumer's `finish` reports a fault.
    ///
    /// # Errors
    ///
    /// `BatchAlreadyJoined` on a second call, `NotReady` if the coverage was
    /// closed.
    pub fn join(&self) -> Result<bool, CoverageError> {
        let groups = {
            let mut state = self.state.lock();
            if state.joined {
                return Err(CoverageError::BatchAlreadyJoined);
            }
            state.joined = true;
            std::mem::take(&mut state.groups)
        };
        let descriptor = self.service.descriptor()?;
        let buffers = ChunkBuffers::plan(&self.config, &descriptor, &groups);
        let failed = AtomicBool::new(false);

        debug!(
            chunks = groups.len(),
            wrap_chunks = buffers.slots.len() - groups.len(),
            requests = groups.values().map(Vec::len).sum::<usize>(),
            "Joining batch"
        );

        match &self.pool {
            Some(pool) => pool.scope(|s| self.spawn_chunks(s, &descriptor, &buffers, groups, &failed)),
            None => rayon::scope(|s| self.spawn_chunks(s, &descriptor, &buffers, groups, &failed)),
        }

        let consumer_ok = self.consumer.finish();
        Ok(!failed.load(Ordering::SeqCst) && consumer_ok)
    }

    fn spawn_chunks<'s>(
        &'s self,
        scope: &Scope<'s>,
        descriptor: &'s CoverageDescriptor,
        buffers: &'s ChunkBuffers,
        groups: HashMap<ChunkKey, Vec<PendingRequest>>,
        failed: &'s AtomicBool,
    ) {
        for (key, requests) in groups {
            scope.spawn(move |scope| {
                self.process_chunk(scope, descriptor, buffers, key, requests, failed)
            });
        }
    }

    fn process_chunk<'s>(
        &'s self,
        scope: &Scope<'s>,
        descriptor: &'s CoverageDescriptor,
        buffers: &'s ChunkBuffers,
        key: ChunkKey,
        requests: Vec<PendingRequest>,
        failed: &'s AtomicBool,
    ) {
        let buffer = match buffers.get(&self.service, key) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!(chunk = ?key, error = %e, "Chunk read failed");
                failed.store(true, Ordering::SeqCst);
                for request in requests {
                    self.complete_empty(&request);
                }
                return;
            }
        };

        let requests = Arc::new(requests);
        let step = self.config.points_per_task.max(1);
        for start in (0..requests.len()).step_by(step) {
            let end = (start + step).min(requests.len());
            let requests = requests.clone();
            let buffer = buffer.clone();
            scope.spawn(move |_| {
                for request in &requests[start..end] {
                    match self.perform(descriptor, buffers, buffer.as_deref(), request) {
                        Ok(completed) => self.consumer.on_request_completed(completed),
                        Err(e) => {
                            warn!(id = request.id, error = %e, "Request failed");
                            failed.store(true, Ordering::SeqCst);
                            self.complete_empty(request);
                        }
                    }
                }
            });
        }
    }

    fn complete_empty(&self, request: &PendingRequest) {
        self.consumer.on_request_completed(CompletedRequest::empty(
            request.id,
            request.native,
            self.config.window_width,
            self.config.window_height,
        ));
    }

    fn perform(
        &self,
        descriptor: &CoverageDescriptor,
        buffers: &ChunkBuffers,
        buffer: Option<&RegionBuffer>,
        request: &PendingRequest,
    ) -> Result<CompletedRequest, CoverageError> {
        let (width, height) = (self.config.window_width, self.config.window_height);
        let mut window = self.read_window(descriptor, buffer, request.cell)?;

        if descriptor.wrap_x {
            if let Some(other) = find_center_on_other_side(
                request.cell,
                i64::from(width),
                descriptor.raster.x_min,
                descriptor.raster.x_max,
            ) {
                let other_buffer = buffers.get(&self.service, other.chunk_key(self.config.chunk_size))?;
                let other_window = self.read_window(descriptor, other_buffer.as_deref(), other)?;

                let pairs = other_window.has_values.into_iter().zip(other_window.values);
                for (j, (has, value)) in pairs.enumerate() {
                    if has && !window.has_values[j] {
                        window.has_values[j] = true;
                        window.values[j] = value;
                    }
                }
            }
        }

        Ok(CompletedRequest {
            id: request.id,
            native: request.native,
            has_values: window.has_values,
            values: window.values,
            width,
            height,
        })
    }

    /// Reads the window around `center`, preferring `buffer`.
    ///
    /// Cells outside the data extent stay empty. Cells inside it but missing
    /// from `buffer` go through the coverage service.
    fn read_window(
        &self,
        descriptor: &CoverageDescriptor,
        buffer: Option<&RegionBuffer>,
        center: RasterCell,
    ) -> Result<Window, CoverageError> {
        let (width, height) = (
            i64::from(self.config.window_width),
            i64::from(self.config.window_height),
        );
        let origin = center.offset(-((width - 1).max(0) / 2), -((height - 1).max(0) / 2));
        let cells = (width * height) as usize;
        let mut window = Window {
            has_values: vec![false; cells],
            values: vec![TypedValue::Null; cells],
        };

        let mut raw = vec![0u8; descriptor.layout.sample_bytes()];
        for x in 0..width {
            for y in 0..height {
                let cell = origin.offset(x, y);
                if !descriptor.contains_cell(cell) {
                    continue;
                }
                let value = match buffer {
                    Some(b) if b.read(cell, &mut raw) => descriptor.interpret(&raw)?,
                    _ => self.service.get_value_at_cell(cell)?,
                };
                if let Some(value) = value {
                    let index = (x * height + y) as usize;
                    window.has_values[index] = true;
                    window.values[index] = value;
                }
            }
        }
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::codec::{SampleType, Scalar};
    use crate::coord::Bounds;
    use crate::coverage::CoverageConfig;
    use crate::loader::RetryPolicy;
    use std::time::Duration;

    fn service(backend: Arc<MemoryBackend>) -> Arc<CoverageValueService> {
        let config = CoverageConfig::new("memory").with_retry(RetryPolicy::fixed(2, Duration::ZERO));
        Arc::new(CoverageValueService::open_new(backend, config).unwrap())
    }

    fn grid(size: u32) -> Arc<MemoryBackend> {
        Arc::new(
            MemoryBackend::north_up(
                size,
                size,
                SampleType::UInt16,
                1,
                Bounds::new(0.0, 0.0, size as f64, size as f64),
            )
            .with_fill(|_, x, y| (x + y * 100) as f64),
        )
    }

    #[derive(Default)]
    struct Collect {
        completed: Mutex<Vec<CompletedRequest>>,
    }

    impl RequestConsumer for Collect {
        fn on_request_completed(&self, request: CompletedRequest) {
            self.completed.lock().push(request);
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.points_per_task, 100);
        assert_eq!(config.pad(), 0);
        assert_eq!(config.with_window(5, 3).pad(), 2);
    }

    #[test]
    fn test_completed_request_center() {
        let mut request = CompletedRequest::empty(0, NativePoint::new(0.0, 0.0), 3, 3);
        assert_eq!(request.center(), None);
        request.has_values[4] = true;
        request.values[4] = TypedValue::Scalar(Scalar::U8(1));
        assert_eq!(request.center(), Some(&TypedValue::Scalar(Scalar::U8(1))));
    }

    #[test]
    fn test_batch_delivers_every_request() {
        let backend = grid(50);
        let consumer = Arc::new(Collect::default());
        let getter = AsyncBatchGetter::new(
            service(backend.clone()),
            consumer.clone(),
            BatchConfig::default().with_chunk_size(16).with_points_per_task(7),
        );

        for x in 0..50 {
            getter.add_request(NativePoint::new(x as f64 + 0.5, 49.5)).unwrap();
        }
        getter.add_request(NativePoint::new(-5.0, 10.0)).unwrap();

        assert!(getter.join().unwrap());
        let mut completed = consumer.completed.lock().clone();
        completed.sort_by_key(|c| c.id);
        assert_eq!(completed.len(), 51);
        assert_eq!(completed[7].center(), Some(&TypedValue::Scalar(Scalar::U16(7))));
        assert!(!completed[50].has_values[0]);

        // row 0 spans four 16-cell chunks, each read once
        assert_eq!(backend.read_count(), 4);
    }

    #[test]
    fn test_add_after_join_fails() {
        let getter = AsyncBatchGetter::new(
            service(grid(4)),
            Arc::new(|_: CompletedRequest| {}),
            BatchConfig::default(),
        );
        assert!(getter.join().unwrap());
        assert_eq!(
            getter.add_request(NativePoint::new(1.0, 1.0)),
            Err(CoverageError::BatchAlreadyJoined)
        );
        assert_eq!(getter.join(), Err(CoverageError::BatchAlreadyJoined));
    }

    #[test]
    fn test_failed_chunk_still_completes_requests() {
        let backend = Arc::new(
            MemoryBackend::north_up(8, 8, SampleType::Byte, 1, Bounds::new(0.0, 0.0, 8.0, 8.0))
                .failing(),
        );
        let consumer = Arc::new(Collect::default());
        let getter = AsyncBatchGetter::new(service(backend), consumer.clone(), BatchConfig::default());

        getter.add_request(NativePoint::new(1.5, 1.5)).unwrap();
        getter.add_request(NativePoint::new(2.5, 2.5)).unwrap();

        assert!(!getter.join().unwrap());
        let completed = consumer.completed.lock();
        assert_eq!(completed.len(), 2);
        assert!(completed.iter().all(|c| c.center().is_none()));
    }

    #[test]
    fn test_dedicated_pool() {
        let consumer = Arc::new(Collect::default());
        let getter = AsyncBatchGetter::new(
            service(grid(10)),
            consumer.clone(),
            BatchConfig::default().with_worker_threads(2).with_window(3, 3),
        );
        getter.add_request(NativePoint::new(5.5, 5.5)).unwrap();
        assert!(getter.join().unwrap());

        let completed = consumer.completed.lock();
        assert_eq!(completed[0].values.len(), 9);
        assert!(completed[0].has_values.iter().all(|h| *h));
    }
}

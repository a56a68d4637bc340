//! Point and matrix queries over one backend.

use std::cell::RefCell;
use std::sync::{Arc, OnceLock};

use parking_lot::ReentrantMutex;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::buffer::{BufferCache, BufferCacheStats, RegionBuffer};
use crate::codec::TypedValue;
use crate::coord::{NativePoint, RasterCell, RasterRect};
use crate::error::CoverageError;
use crate::loader::RegionLoader;

use super::{spatial_precision, CoverageConfig, CoverageDescriptor, CoverageState, InitStatus};

/// Values of a `width × height` window, x-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMatrix {
    /// Raster cell of the window's lower corner.
    pub origin: RasterCell,
    pub width: u32,
    pub height: u32,
    /// `width × height` entries; index `x * height + y`.
    pub values: Vec<Option<TypedValue>>,
}

impl ValueMatrix {
    /// Value at window offset `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Option<&TypedValue> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values
            .get(x as usize * self.height as usize + y as usize)
            .and_then(|v| v.as_ref())
    }

    /// Number of cells that hold a value.
    pub fn present(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// State that exists only while the coverage is `Ready`.
struct OpenCoverage {
    descriptor: Arc<CoverageDescriptor>,
    loader: RegionLoader,
    cache: BufferCache,
}

enum Lifecycle {
    Unopened,
    Opening,
    Ready(Arc<OpenCoverage>),
    FailedToOpen(String),
    Closed,
}

impl Lifecycle {
    fn state(&self) -> CoverageState {
        match self {
            Lifecycle::Unopened => CoverageState::Unopened,
            Lifecycle::Opening => CoverageState::Opening,
            Lifecycle::Ready(_) => CoverageState::Ready,
            Lifecycle::FailedToOpen(_) => CoverageState::FailedToOpen,
            Lifecycle::Closed => CoverageState::Closed,
        }
    }
}

struct Inner {
    lifecycle: Lifecycle,
    /// Buffer that served the most recent query.
    last_buffer: Option<Arc<RegionBuffer>>,
}

/// Random-access value service over one backend.
///
/// Mutable state sits behind a per-instance reentrant lock so that a matrix
/// query can hold it across its per-cell lookups. Backend reads never run
/// with the lock held.
pub struct CoverageValueService {
    backend: Arc<dyn Backend>,
    config: CoverageConfig,
    inner: ReentrantMutex<RefCell<Inner>>,
    precision: OnceLock<Option<f64>>,
}

impl CoverageValueService {
    /// Creates an unopened service.
    pub fn new(backend: Arc<dyn Backend>, config: CoverageConfig) -> Self {
        Self {
            backend,
            config,
            inner: ReentrantMutex::new(RefCell::new(Inner {
                lifecycle: Lifecycle::Unopened,
                last_buffer: None,
            })),
            precision: OnceLock::new(),
        }
    }

    /// Creates a service and opens it.
    pub fn open_new(backend: Arc<dyn Backend>, config: CoverageConfig) -> Result<Self, CoverageError> {
        let service = Self::new(backend, config);
        service.open()?;
        Ok(service)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn config(&self) -> &CoverageConfig {
        &self.config
    }

    pub fn state(&self) -> CoverageState {
        self.inner.lock().borrow().lifecycle.state()
    }

    pub fn init_status(&self) -> InitStatus {
        match &self.inner.lock().borrow().lifecycle {
            Lifecycle::Unopened | Lifecycle::Opening => InitStatus::Uninitialized,
            Lifecycle::Ready(_) | Lifecycle::Closed => InitStatus::Initialized,
            Lifecycle::FailedToOpen(reason) => InitStatus::FailedToInit(reason.clone()),
        }
    }

    /// Opens the backend and derives the descriptor.
    ///
    /// Opening a `Ready` service is a no-op.
    ///
    /// # Errors
    ///
    /// * `OpenFailed` if the backend cannot be opened or described; the
    ///   service stays `FailedToOpen` and every later `open` fails the same way
    /// * `NotReady` on a closed service
    pub fn open(&self) -> Result<(), CoverageError> {
        let guard = self.inner.lock();
        {
            let mut inner = guard.borrow_mut();
            match &inner.lifecycle {
                Lifecycle::Unopened => {}
                Lifecycle::Ready(_) => return Ok(()),
                Lifecycle::FailedToOpen(reason) => {
                    return Err(CoverageError::OpenFailed(reason.clone()))
                }
                other => return Err(CoverageError::NotReady(other.state())),
            }
            inner.lifecycle = Lifecycle::Opening;
        }

        let result = self.build_open();
        let mut inner = guard.borrow_mut();
        match result {
            Ok(open) => {
                info!(
                    locator = %self.config.locator,
                    backend = self.backend.name(),
                    raster = %open.descriptor.raster,
                    context = %open.descriptor.context,
                    "Coverage ready"
                );
                inner.lifecycle = Lifecycle::Ready(Arc::new(open));
                Ok(())
            }
            Err(e) => {
                warn!(
                    locator = %self.config.locator,
                    backend = self.backend.name(),
                    error = %e,
                    "Coverage failed to open"
                );
                let reason = e.to_string();
                inner.lifecycle = Lifecycle::FailedToOpen(reason.clone());
                Err(CoverageError::OpenFailed(reason))
            }
        }
    }

    fn build_open(&self) -> Result<OpenCoverage, CoverageError> {
        let info = self.config.retry.run(self.backend.name(), || {
            self.backend.open(self.config.srs_override.as_ref())
        })?;
        let descriptor = CoverageDescriptor::build(&info, self.backend.as_ref(), &self.config)?;

        let loader = RegionLoader::new(
            self.backend.clone(),
            descriptor.bands.clone(),
            descriptor.layout,
            self.config.retry.clone(),
            self.config.axis_limit,
            self.config.buffer_ceiling,
        );
        let cache = BufferCache::with_limits(self.config.cache_capacity, self.config.cache_trim_to);

        Ok(OpenCoverage {
            descriptor: Arc::new(descriptor),
            loader,
            cache,
        })
    }

    /// Releases the backend handle and cached buffers.
    pub fn close(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if let Lifecycle::Ready(open) = &inner.lifecycle {
            open.cache.clear();
            info!(locator = %self.config.locator, "Coverage closed");
        }
        if !matches!(inner.lifecycle, Lifecycle::FailedToOpen(_)) {
            inner.lifecycle = Lifecycle::Closed;
        }
        inner.last_buffer = None;
    }

    fn ready(&self) -> Result<Arc<OpenCoverage>, CoverageError> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        match &inner.lifecycle {
            Lifecycle::Ready(open) => Ok(open.clone()),
            other => Err(CoverageError::NotReady(other.state())),
        }
    }

    pub fn descriptor(&self) -> Result<Arc<CoverageDescriptor>, CoverageError> {
        Ok(self.ready()?.descriptor.clone())
    }

    /// Value at a native coordinate.
    ///
    /// Returns `Ok(None)` outside the data extent or on a no-data sample.
    ///
    /// # Errors
    ///
    /// * `NotReady` unless the service is `Ready`
    /// * `BackendRead` once the single-cell read exhausts its retries
    pub fn get_value(&self, native: NativePoint) -> Result<Option<TypedValue>, CoverageError> {
        let open = self.ready()?;
        let cell = open.descriptor.native_to_cell(native);
        self.value_at(&open, cell)
    }

    /// Value at a raster cell. Same rules as [`get_value`](Self::get_value).
    pub fn get_value_at_cell(&self, cell: RasterCell) -> Result<Option<TypedValue>, CoverageError> {
        let open = self.ready()?;
        self.value_at(&open, cell)
    }

    fn value_at(&self, open: &OpenCoverage, cell: RasterCell) -> Result<Option<TypedValue>, CoverageError> {
        let descriptor = &open.descriptor;
        if !descriptor.contains_cell(cell) {
            return Ok(None);
        }

        let mut raw = vec![0u8; descriptor.layout.sample_bytes()];
        let found = {
            let guard = self.inner.lock();
            let last = guard.borrow().last_buffer.clone();
            match last {
                Some(buffer) if buffer.read(cell, &mut raw) => true,
                _ => match open.cache.find_containing_cell(cell) {
                    Some(buffer) => {
                        let read = buffer.read(cell, &mut raw);
                        guard.borrow_mut().last_buffer = Some(buffer);
                        read
                    }
                    None => false,
                },
            }
        };

        if !found {
            raw = open.loader.read_cell(cell)?;
        }
        descriptor.interpret(&raw)
    }

    /// Makes `rect` resident and returns the buffer holding it.
    ///
    /// `rect` is clipped to the data extent first. Returns `Ok(None)` if
    /// nothing of it lies inside, or if the buffer could not be allocated.
    /// The backend is read without holding the instance lock.
    pub fn read_buffer(&self, rect: &RasterRect) -> Result<Option<Arc<RegionBuffer>>, CoverageError> {
        let open = self.ready()?;
        let Some(clipped) = rect.intersection(&open.descriptor.raster) else {
            return Ok(None);
        };

        {
            let guard = self.inner.lock();
            if let Some(buffer) = open.cache.find_containing_rect(&clipped) {
                guard.borrow_mut().last_buffer = Some(buffer.clone());
                return Ok(Some(buffer));
            }
        }

        debug!(locator = %self.config.locator, rect = %clipped, "Buffer cache miss");
        let Some(buffer) = open.loader.load(&clipped)? else {
            debug!(
                locator = %self.config.locator,
                rect = %clipped,
                ceiling = self.config.buffer_ceiling,
                "Region buffer not allocated, reading cell by cell"
            );
            return Ok(None);
        };

        let buffer = Arc::new(buffer);
        let guard = self.inner.lock();
        open.cache.add(buffer.clone());
        guard.borrow_mut().last_buffer = Some(buffer.clone());
        Ok(Some(buffer))
    }

    /// Values of a `width × height` window around `center`.
    ///
    /// The window's lower corner is `center_cell - (size - 1) / 2` on each
    /// axis, so even-sized windows extend further toward higher indices.
    /// Cells outside the data extent are `None`; nothing wraps or clamps.
    /// Cells the window buffer could not hold are read one by one, outside
    /// the instance lock.
    pub fn get_matrix_of_values(
        &self,
        center: NativePoint,
        width: u32,
        height: u32,
    ) -> Result<ValueMatrix, CoverageError> {
        let open = self.ready()?;
        let center_cell = open.descriptor.native_to_cell(center);
        let origin = RasterCell::new(
            center_cell.x - (i64::from(width) - 1).max(0) / 2,
            center_cell.y - (i64::from(height) - 1).max(0) / 2,
        );

        let window = RasterRect::window(origin, width, height);
        if !window.is_empty() {
            self.read_buffer(&window)?;
        }

        let mut values = Vec::with_capacity(window.cell_count());
        for x in 0..i64::from(width) {
            for y in 0..i64::from(height) {
                values.push(self.value_at(&open, origin.offset(x, y))?);
            }
        }

        Ok(ValueMatrix {
            origin,
            width,
            height,
            values,
        })
    }

    /// Half the largest distance spanned by one pixel, computed once.
    ///
    /// Metres for geographic coverages, native units for projected ones,
    /// `None` when the reference system is unknown.
    pub fn spatial_precision(&self) -> Result<Option<f64>, CoverageError> {
        if let Some(precision) = self.precision.get() {
            return Ok(*precision);
        }
        let descriptor = self.descriptor()?;
        Ok(*self.precision.get_or_init(|| {
            spatial_precision(&descriptor.bounds, &descriptor.step, &descriptor.srs)
        }))
    }

    /// Trims this coverage's cache after memory pressure.
    pub fn free_large_buffers(&self) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if let Lifecycle::Ready(open) = &inner.lifecycle {
            open.cache.free_large_buffers();
        }
        inner.last_buffer = None;
    }

    /// Cache counters, or `None` unless the service is `Ready`.
    pub fn cache_stats(&self) -> Option<BufferCacheStats> {
        self.ready().ok().map(|open| open.cache.stats())
    }

    /// Rects currently resident in this coverage's cache.
    pub fn resident_rects(&self) -> Vec<RasterRect> {
        self.ready()
            .map(|open| open.cache.resident_rects())
            .unwrap_or_default()
    }
}

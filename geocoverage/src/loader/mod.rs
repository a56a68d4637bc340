//! Region loading
//!
//! Turns a cache miss into backend reads. Rectangles wider or taller than
//! the configured axis limit are split into a grid of sub-reads, each with
//! its own retry budget, and reassembled into one [`RegionBuffer`].

mod retry;

use std::sync::Arc;

use tracing::{debug, trace};

use crate::backend::Backend;
use crate::buffer::RegionBuffer;
use crate::codec::SampleLayout;
use crate::coord::{RasterCell, RasterRect};
use crate::error::CoverageError;

pub use retry::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS, DEFAULT_RETRY_DELAY_MS,
};

/// Splits `rect` into sub-rects no larger than `axis_limit` on either side.
///
/// Produces `⌈columns/limit⌉ × ⌈rows/limit⌉` rects in row-major order that
/// tile `rect` exactly. Returns `rect` alone when it already fits.
pub fn partition(rect: &RasterRect, axis_limit: u32) -> Vec<RasterRect> {
    let limit = i64::from(axis_limit.max(1));
    if rect.is_empty() {
        return Vec::new();
    }
    if rect.columns() as i64 <= limit && rect.rows() as i64 <= limit {
        return vec![*rect];
    }

    let mut parts = Vec::new();
    let mut y = rect.y_min;
    while y <= rect.y_max {
        let y_max = (y + limit - 1).min(rect.y_max);
        let mut x = rect.x_min;
        while x <= rect.x_max {
            let x_max = (x + limit - 1).min(rect.x_max);
            parts.push(RasterRect::new(x, y, x_max, y_max));
            x += limit;
        }
        y += limit;
    }
    parts
}

/// Loads raster regions from a backend with chunking and retry.
#[derive(Clone)]
pub struct RegionLoader {
    backend: Arc<dyn Backend>,
    bands: Vec<usize>,
    layout: SampleLayout,
    retry: RetryPolicy,
    axis_limit: Option<u32>,
    buffer_ceiling: usize,
}

impl RegionLoader {
    /// Creates a loader.
    ///
    /// # Arguments
    ///
    /// * `backend` - Source of the raster data
    /// * `bands` - Backend band indices to read, in sample order
    /// * `layout` - Sample layout of the selected bands
    /// * `retry` - Retry policy applied to every read
    /// * `axis_limit` - Largest edge of one backend read, `None` for unlimited
    /// * `buffer_ceiling` - Largest buffer to allocate, in bytes
    pub fn new(
        backend: Arc<dyn Backend>,
        bands: Vec<usize>,
        layout: SampleLayout,
        retry: RetryPolicy,
        axis_limit: Option<u32>,
        buffer_ceiling: usize,
    ) -> Self {
        Self {
            backend,
            bands,
            layout,
            retry,
            axis_limit,
            buffer_ceiling,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Reads one rect with the retry policy.
    fn read_with_retry(&self, rect: &RasterRect) -> Result<Vec<u8>, CoverageError> {
        self.retry.run(self.backend.name(), || {
            self.backend.read_region(rect, &self.bands)
        })
    }

    /// Loads `rect` into a new buffer.
    ///
    /// Returns `Ok(None)` when the buffer would exceed the ceiling or cannot
    /// be allocated; the caller then reads cell by cell.
    ///
    /// # Errors
    ///
    /// `BackendRead` once any sub-read exhausts its retries, or
    /// `DatasetStructure` on a structural backend error.
    pub fn load(&self, rect: &RasterRect) -> Result<Option<RegionBuffer>, CoverageError> {
        let Some(mut buffer) = RegionBuffer::allocate(*rect, self.layout, self.buffer_ceiling)
        else {
            return Ok(None);
        };

        let parts = match self.axis_limit {
            Some(limit) => partition(rect, limit),
            None => vec![*rect],
        };

        if parts.len() == 1 {
            let bytes = self.read_with_retry(rect)?;
            buffer.splice(rect, &bytes)?;
        } else {
            debug!(
                backend = self.backend.name(),
                %rect,
                parts = parts.len(),
                "Splitting region read"
            );
            for part in &parts {
                let bytes = self.read_with_retry(part)?;
                buffer.splice(part, &bytes)?;
            }
        }

        trace!(backend = self.backend.name(), %rect, bytes = buffer.byte_len(), "Region loaded");
        Ok(Some(buffer))
    }

    /// Reads the interleaved sample of a single cell straight from the backend.
    pub fn read_cell(&self, cell: RasterCell) -> Result<Vec<u8>, CoverageError> {
        let rect = RasterRect::from_cell(cell);
        let bytes = self.read_with_retry(&rect)?;
        if bytes.len() != self.layout.sample_bytes() {
            return Err(CoverageError::DatasetStructure(format!(
                "cell {} returned {} bytes, expected {}",
                cell,
                bytes.len(),
                self.layout.sample_bytes()
            )));
        }
        // one cell: band-sequential and interleaved layouts coincide
        Ok(bytes)
    }
}

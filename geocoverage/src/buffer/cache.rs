//! Per-coverage LRU of region buffers.
//!
//! Every [`BufferCache`] owns one entry in a process-wide registry keyed by
//! an opaque [`CacheId`]. All registry access goes through a single mutex,
//! which lets [`free_all_large_buffers`] trim every coverage's buffers at
//! once under memory pressure.
//!
//! Entries are kept most-recent-first. A lookup scans front to back and
//! moves the match to the front.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use super::region::RegionBuffer;
use crate::coord::{RasterCell, RasterRect};

/// Default number of buffers kept per coverage.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Number of buffers kept after a memory-pressure trim.
pub const DEFAULT_TRIM_TO: usize = 3;

type Registry = Mutex<HashMap<CacheId, VecDeque<Arc<RegionBuffer>>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a buffer cache in the process-wide registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheId(u64);

impl CacheId {
    fn next() -> Self {
        Self(NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Buffer cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub resident_bytes: usize,
}

impl BufferCacheStats {
    /// Fraction of lookups that hit, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded move-to-front cache of region buffers for one coverage.
pub struct BufferCache {
    id: CacheId,
    capacity: usize,
    trim_to: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl BufferCache {
    /// Creates a cache with the default limits (20 entries, trim to 3).
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CACHE_CAPACITY, DEFAULT_TRIM_TO)
    }

    /// Creates a cache with custom limits.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Entries kept before the oldest is dropped on `add`
    /// * `trim_to` - Entries kept by `free_large_buffers`
    pub fn with_limits(capacity: usize, trim_to: usize) -> Self {
        let id = CacheId::next();
        registry().lock().insert(id, VecDeque::new());
        Self {
            id,
            capacity: capacity.max(1),
            trim_to: trim_to.min(capacity.max(1)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> CacheId {
        self.id
    }

    fn find_by<F>(&self, matches: F) -> Option<Arc<RegionBuffer>>
    where
        F: Fn(&RegionBuffer) -> bool,
    {
        let mut registry = registry().lock();
        let found = registry.get_mut(&self.id).and_then(|entries| {
            let index = entries.iter().position(|b| matches(b.as_ref()))?;
            if index > 0 {
                let buffer = entries.remove(index)?;
                entries.push_front(buffer);
            }
            entries.front().cloned()
        });

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Finds a buffer holding `cell` and promotes it to most recent.
    pub fn find_containing_cell(&self, cell: RasterCell) -> Option<Arc<RegionBuffer>> {
        self.find_by(|b| b.contains_cell(cell))
    }

    /// Finds a buffer holding all of `rect` and promotes it to most recent.
    pub fn find_containing_rect(&self, rect: &RasterRect) -> Option<Arc<RegionBuffer>> {
        self.find_by(|b| b.contains_rect(rect))
    }

    /// Inserts a buffer as most recent, dropping the oldest above capacity.
    pub fn add(&self, buffer: Arc<RegionBuffer>) {
        let mut registry = registry().lock();
        let entries = registry.entry(self.id).or_default();
        entries.push_front(buffer);
        while entries.len() > self.capacity {
            entries.pop_back();
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drops the oldest buffers until at most `trim_to` remain.
    pub fn free_large_buffers(&self) {
        let mut registry = registry().lock();
        if let Some(entries) = registry.get_mut(&self.id) {
            let dropped = trim(entries, self.trim_to);
            self.evictions.fetch_add(dropped as u64, Ordering::Relaxed);
            if dropped > 0 {
                debug!(cache = self.id.0, dropped, "Freed large buffers");
            }
        }
    }

    /// Drops every buffer.
    pub fn clear(&self) {
        if let Some(entries) = registry().lock().get_mut(&self.id) {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        registry()
            .lock()
            .get(&self.id)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rects of the cached buffers, most recent first.
    pub fn resident_rects(&self) -> Vec<RasterRect> {
        registry()
            .lock()
            .get(&self.id)
            .map(|entries| entries.iter().map(|b| *b.rect()).collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> BufferCacheStats {
        let (entries, resident_bytes): (usize, usize) = registry()
            .lock()
            .get(&self.id)
            .map(|e| (e.len(), e.iter().map(|b| b.byte_len()).sum()))
            .unwrap_or((0, 0));

        BufferCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries,
            resident_bytes,
        }
    }
}

impl Default for BufferCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BufferCache {
    fn drop(&mut self) {
        registry().lock().remove(&self.id);
    }
}

fn trim(entries: &mut VecDeque<Arc<RegionBuffer>>, keep: usize) -> usize {
    let mut dropped = 0;
    while entries.len() > keep {
        entries.pop_back();
        dropped += 1;
    }
    dropped
}

/// Trims every registered cache down to [`DEFAULT_TRIM_TO`] entries.
///
/// Returns the number of buffers released.
pub fn free_all_large_buffers() -> usize {
    let mut registry = registry().lock();
    let released: usize = registry
        .values_mut()
        .map(|entries| trim(entries, DEFAULT_TRIM_TO))
        .sum();
    if released > 0 {
        debug!(released, "Freed large buffers across all coverages");
    }
    released
}

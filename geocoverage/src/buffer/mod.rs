//! Region buffers and the per-coverage buffer cache.
//!
//! The cache is an accelerator only: every caller must still work, more
//! slowly, when a lookup misses or a buffer cannot be allocated.

mod cache;
mod region;

pub use cache::{
    free_all_large_buffers, BufferCache, BufferCacheStats, CacheId, DEFAULT_CACHE_CAPACITY,
    DEFAULT_TRIM_TO,
};
pub use region::{RegionBuffer, DEFAULT_BUFFER_CEILING};

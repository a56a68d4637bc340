//! Backend construction from configuration.

use std::sync::Arc;

use super::bing::{BingConfig, BingTileBackend, ImagerySet};
use super::http::ReqwestClient;
use super::memory::MemoryBackend;
use super::null::NullBackend;
use super::raw::{RawFileBackend, RawFileConfig};
use super::wcs::{WcsBackend, WcsConfig, WCS_AXIS_LIMIT};
use super::{Backend, BackendError};
use crate::codec::SampleType;
use crate::coord::Bounds;

/// Which backend to open and how.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    /// Zero-filled in-memory raster.
    Memory {
        width: u32,
        height: u32,
        sample_type: SampleType,
        band_count: usize,
        bounds: Bounds,
    },
    Raw(RawFileConfig),
    Wcs(WcsConfig),
    Bing(BingConfig),
    Null,
}

impl BackendConfig {
    /// Axis limit the backend needs when none is configured.
    pub fn default_axis_limit(&self) -> Option<u32> {
        match self {
            BackendConfig::Wcs(_) => Some(WCS_AXIS_LIMIT),
            _ => None,
        }
    }

    /// Network sources are served through an overview chain.
    pub fn serves_overviews(&self) -> bool {
        matches!(self, BackendConfig::Wcs(_) | BackendConfig::Bing(_))
    }

    /// Bing imagery set, if this is a Bing backend.
    pub fn imagery_set(&self) -> Option<ImagerySet> {
        match self {
            BackendConfig::Bing(config) => Some(config.imagery_set),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Memory { .. } => "memory",
            BackendConfig::Raw(_) => "raw",
            BackendConfig::Wcs(_) => "wcs",
            BackendConfig::Bing(_) => "bing",
            BackendConfig::Null => "null",
        }
    }
}

/// Creates the backend described by `config`.
///
/// Network backends get a [`ReqwestClient`] with the given timeout.
pub fn open_backend(
    config: &BackendConfig,
    http_timeout_secs: u64,
) -> Result<Arc<dyn Backend>, BackendError> {
    let backend: Arc<dyn Backend> = match config {
        BackendConfig::Memory {
            width,
            height,
            sample_type,
            band_count,
            bounds,
        } => Arc::new(MemoryBackend::north_up(
            *width,
            *height,
            *sample_type,
            *band_count,
            *bounds,
        )),
        BackendConfig::Raw(raw) => Arc::new(RawFileBackend::new(raw.clone())),
        BackendConfig::Wcs(wcs) => Arc::new(WcsBackend::new(
            wcs.clone(),
            ReqwestClient::with_timeout(http_timeout_secs)?,
        )),
        BackendConfig::Bing(bing) => Arc::new(BingTileBackend::new(
            bing.clone(),
            ReqwestClient::with_timeout(http_timeout_secs)?,
        )),
        BackendConfig::Null => Arc::new(NullBackend),
    };
    Ok(backend)
}

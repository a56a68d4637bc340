//! GeoCoverage - raster coverage access for geospatial datasets
//!
//! Maps native coordinates to raster cells, reads regions from a pluggable
//! [`backend`], keeps recently read regions in a per-coverage [`buffer`]
//! cache and decodes samples into typed values. On top of the single
//! coverage sit a parallel [`batch`] getter, an [`overview`] chain for
//! multi-resolution queries and a [`composite`] of several coverages.
//!
//! ```no_run
//! use std::sync::Arc;
//! use geocoverage::backend::{RawFileBackend, RawFileConfig};
//! use geocoverage::codec::SampleType;
//! use geocoverage::coord::NativePoint;
//! use geocoverage::coverage::{CoverageConfig, CoverageValueService};
//!
//! let backend = RawFileBackend::new(RawFileConfig::new("dem.raw", 1000, 1000, SampleType::UInt16));
//! let coverage = CoverageValueService::open_new(Arc::new(backend), CoverageConfig::new("dem.raw"))?;
//! let value = coverage.get_value(NativePoint::new(500.5, 500.5))?;
//! # Ok::<(), geocoverage::CoverageError>(())
//! ```

pub mod backend;
pub mod batch;
pub mod buffer;
pub mod codec;
pub mod composite;
pub mod config;
pub mod coord;
pub mod coverage;
pub mod error;
pub mod loader;
pub mod logging;
pub mod overview;

pub use backend::{open_backend, Backend, BackendConfig, BackendError};
pub use batch::{AsyncBatchGetter, BatchConfig, CompletedRequest, RequestConsumer};
pub use codec::{Scalar, TypedValue};
pub use composite::{CompositeConfig, CompositeCoverage};
pub use config::{ConfigFile, ConfigFileError};
pub use coord::{Bounds, NativePoint, RasterCell, RasterRect};
pub use coverage::{CoverageConfig, CoverageState, CoverageValueService, ValueMatrix};
pub use error::CoverageError;
pub use overview::{OverviewChain, OverviewConfig};

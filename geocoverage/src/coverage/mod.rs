//! Coverage value service
//!
//! The public query API. A [`CoverageValueService`] opens a backend, derives
//! a [`CoverageDescriptor`], and answers point and matrix queries through
//! the buffer cache, falling back to single-cell backend reads.
//!
//! # Lifecycle
//!
//! ```text
//! Unopened ──open()──► Opening ──► Ready ──close()──► Closed
//!                         │
//!                         └──► FailedToOpen (terminal)
//! ```

mod config;
mod descriptor;
mod precision;
mod service;

use std::fmt;

pub use config::CoverageConfig;
pub use descriptor::{select_bands, CoverageDescriptor, ValueContext};
pub use precision::{great_circle_distance, spatial_precision, EARTH_RADIUS_M};
pub use service::{CoverageValueService, ValueMatrix};

/// Lifecycle state of a coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageState {
    Unopened,
    Opening,
    Ready,
    FailedToOpen,
    Closed,
}

impl fmt::Display for CoverageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoverageState::Unopened => "unopened",
            CoverageState::Opening => "opening",
            CoverageState::Ready => "ready",
            CoverageState::FailedToOpen => "failed to open",
            CoverageState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Initialization outcome reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStatus {
    Uninitialized,
    Initialized,
    FailedToInit(String),
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::Uninitialized => write!(f, "uninitialized"),
            InitStatus::Initialized => write!(f, "initialized"),
            InitStatus::FailedToInit(reason) => write!(f, "failed to initialize: {}", reason),
        }
    }
}

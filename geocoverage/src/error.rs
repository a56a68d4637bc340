//! Error types for coverage access.
//!
//! Out-of-bounds queries and no-data matches are not errors: they surface as
//! `Ok(None)` from the query APIs. Only structural problems and backend reads
//! that exhausted their retry budget propagate as [`CoverageError`].

use thiserror::Error;

use crate::backend::BackendError;
use crate::coverage::CoverageState;

/// Errors surfaced by the coverage core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoverageError {
    /// A backend read kept failing until the retry budget ran out.
    #[error("Backend read failed after {attempts} attempt(s): {message}")]
    BackendRead {
        /// Number of attempts that were made.
        attempts: u32,
        /// Message of the last backend failure.
        message: String,
    },

    /// The dataset cannot be served as a coverage (bad band, mismatched
    /// band geometry, unsupported layout). Never retried.
    #[error("Dataset structure error: {0}")]
    DatasetStructure(String),

    /// Colour table uses an interpretation other than RGB or Gray.
    #[error("Unsupported palette interpretation: {0}")]
    UnsupportedPalette(String),

    /// A request was added after `join()` had started.
    #[error("Batch already joined; no more requests can be added")]
    BatchAlreadyJoined,

    /// The coverage is not in the `Ready` state.
    #[error("Coverage is not ready (state: {0})")]
    NotReady(CoverageState),

    /// Opening the coverage failed. Terminal.
    #[error("Coverage failed to open: {0}")]
    OpenFailed(String),
}

impl CoverageError {
    /// Returns true for errors caused by the dataset layout itself.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CoverageError::DatasetStructure(_) | CoverageError::UnsupportedPalette(_)
        )
    }
}

impl From<BackendError> for CoverageError {
    /// Converts a backend error seen outside the retry loop.
    ///
    /// A transient error reaching this path was attempted exactly once.
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Read(message) => CoverageError::BackendRead {
                attempts: 1,
                message,
            },
            BackendError::Structure(message) => CoverageError::DatasetStructure(message),
        }
    }
}

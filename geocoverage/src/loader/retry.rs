//! Retry policy for backend reads.
//!
//! Both the region loader and the single-cell read path use one
//! [`RetryPolicy`], so every backend read has the same bounded budget.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use geocoverage::loader::RetryPolicy;
//!
//! // The default: 10 attempts, one second apart
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.max_attempts(), 10);
//!
//! // Exponential backoff for flaky servers
//! let policy = RetryPolicy::exponential(5);
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(200)));
//! ```

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::backend::BackendError;
use crate::error::CoverageError;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default number of attempts for a backend read (including the first).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default fixed wait between attempts (1 second).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default initial delay for exponential backoff (100ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Default maximum delay for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// How a backend read handles transient failures.
///
/// Only [`BackendError::Read`] is retried. Structural errors fail on the
/// first attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// No retries - fail immediately on error.
    None,

    /// Fixed number of attempts with constant delay between them.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay between retry attempts.
        delay: Duration,
    },

    /// Exponential backoff with configurable parameters.
    ///
    /// The delay grows by `multiplier` after each failed attempt, up to
    /// `max_delay`.
    ExponentialBackoff {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Initial delay after the first failure.
        initial_delay: Duration,
        /// Maximum delay cap (delay won't exceed this).
        max_delay: Duration,
        /// Multiplier applied to delay after each failure (typically 2.0).
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Fixed {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Creates an exponential backoff policy with default timings.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum number of attempts (including initial)
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Creates a fixed retry policy.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum number of attempts (including initial)
    /// * `delay` - Fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Calculates the delay before retrying after failed attempt `attempt`.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The failed attempt number (1-based)
    ///
    /// # Returns
    ///
    /// The delay to wait, or `None` if the budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed {
                max_attempts,
                delay,
            } => (attempt < *max_attempts).then_some(*delay),
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                multiplier,
            } => {
                if attempt < *max_attempts {
                    let factor = multiplier.powi(attempt.saturating_sub(1) as i32);
                    let delay_ms = initial_delay.as_millis() as f64 * factor;
                    let delay =
                        Duration::from_millis(delay_ms.min(max_delay.as_millis() as f64) as u64);
                    Some(delay.min(*max_delay))
                } else {
                    None
                }
            }
        }
    }

    /// Returns the maximum number of attempts for this policy.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. } => (*max_attempts).max(1),
            Self::ExponentialBackoff { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Runs `op` until it succeeds or the budget is spent.
    ///
    /// Sleeps on the calling thread between attempts.
    ///
    /// # Errors
    ///
    /// * `DatasetStructure` on the first structural backend error
    /// * `BackendRead` with the last message once attempts run out
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, CoverageError>
    where
        F: FnMut() -> Result<T, BackendError>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(BackendError::Structure(message)) => {
                    return Err(CoverageError::DatasetStructure(message));
                }
                Err(BackendError::Read(message)) => match self.delay_for_attempt(attempt) {
                    Some(delay) => {
                        warn!(what, attempt, error = %message, "Backend read failed, retrying");
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                    None => {
                        return Err(CoverageError::BackendRead {
                            attempts: attempt,
                            message,
                        });
                    }
                },
            }
        }
    }
}

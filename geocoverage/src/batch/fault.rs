//! Detection of Bing "no imagery" placeholder tiles.
//!
//! Aerial imagery sets answer missing tiles with flat placeholder colours
//! instead of an error. [`FaultCheckingConsumer`] counts values matching
//! those colours and fails the batch once there are too many.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::{CompletedRequest, RequestConsumer};
use crate::backend::ImagerySet;

/// Placeholder colours served in place of missing imagery.
pub const FAULT_COLORS: [(u8, u8, u8); 4] = [
    (233, 230, 211),
    (85, 109, 73),
    (172, 199, 241),
    (172, 199, 242),
];

/// Placeholder values tolerated before a batch is failed.
pub const FAULT_THRESHOLD: usize = 100;

/// Wraps a consumer and watches the values passing through it.
pub struct FaultCheckingConsumer {
    inner: Arc<dyn RequestConsumer>,
    faults: AtomicUsize,
    threshold: usize,
}

impl FaultCheckingConsumer {
    pub fn new(inner: Arc<dyn RequestConsumer>) -> Self {
        Self {
            inner,
            faults: AtomicUsize::new(0),
            threshold: FAULT_THRESHOLD,
        }
    }

    /// Wraps `inner` only for imagery sets known to serve placeholders.
    pub fn for_imagery(
        imagery_set: Option<ImagerySet>,
        inner: Arc<dyn RequestConsumer>,
    ) -> Arc<dyn RequestConsumer> {
        match imagery_set {
            Some(set) if set.has_fault_tiles() => Arc::new(Self::new(inner)),
            _ => inner,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn fault_count(&self) -> usize {
        self.faults.load(Ordering::Relaxed)
    }
}

impl RequestConsumer for FaultCheckingConsumer {
    fn on_request_completed(&self, request: CompletedRequest) {
        let faults = request
            .has_values
            .iter()
            .zip(&request.values)
            .filter(|(has, value)| {
                **has && value.as_rgb().is_some_and(|rgb| FAULT_COLORS.contains(&rgb))
            })
            .count();
        if faults > 0 {
            self.faults.fetch_add(faults, Ordering::Relaxed);
        }
        self.inner.on_request_completed(request);
    }

    fn finish(&self) -> bool {
        let faults = self.fault_count();
        let inner_ok = self.inner.finish();
        if faults >= self.threshold {
            warn!(faults, threshold = self.threshold, "Batch hit placeholder imagery");
            return false;
        }
        inner_ok
    }
}

//! Graceful degradation: if a primary path repeatedly fails with a
//! `Storage`-classified error, the engine routes subsequent calls to the
//! in-memory substrate until a health recheck succeeds.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared, process-wide fallback state one `Engine` owns. `Clone` is cheap
/// (all fields are atomics behind no indirection needed since the struct
/// itself is held behind an `Arc` by callers that need to share it).
pub struct FallbackController {
    threshold: u32,
    consecutive_storage_failures: AtomicU32,
    active: AtomicBool,
}

impl FallbackController {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_storage_failures: AtomicU32::new(0),
            active: AtomicBool::new(false),
        }
    }

    /// Record the outcome of a storage-class operation. Crossing the
    /// threshold flips the controller into fallback mode.
    pub fn record_storage_result(&self, ok: bool) {
        if ok {
            self.consecutive_storage_failures.store(0, Ordering::Relaxed);
            return;
        }
        let failures = self.consecutive_storage_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.threshold {
            self.active.store(true, Ordering::Relaxed);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Called by the periodic health-check timer: a successful probe
    /// against the primary substrate exits fallback mode.
    pub fn recover(&self) {
        self.active.store(false, Ordering::Relaxed);
        self.consecutive_storage_failures.store(0, Ordering::Relaxed);
    }
}

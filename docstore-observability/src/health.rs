//! Health reporting: a cheap round-trip probe against the meta store, run
//! on a timer, with a status derived from a rolling failure count —
//! "healthy", "degraded", "unhealthy" — rather than a binary up/down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use docstore_storage::substrate::meta::STATS_TABLE;
use docstore_storage::StorageEngine;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub message: Option<String>,
    pub consecutive_failures: u32,
}

/// Runs an inexpensive `count` against the meta stats store. Cheap enough
/// to call on every timer tick without materially affecting throughput.
pub fn round_trip_check(engine: &StorageEngine) -> docstore_core::errors::DocstoreResult<()> {
    engine.with_reader(|conn| {
        conn.query_row(&format!("SELECT count(*) FROM \"{STATS_TABLE}\""), [], |row| row.get::<_, i64>(0))
            .map_err(|e| docstore_storage::to_storage_err(e.to_string()))?;
        Ok(())
    })
}

/// Shared health state, updated by whichever thread runs the timer and
/// read by callers of `getStats`/`getErrorRecoveryStats`.
pub struct HealthMonitor {
    status: Mutex<HealthStatus>,
    checked_at: Mutex<Option<DateTime<Utc>>>,
    message: Mutex<Option<String>>,
    consecutive_failures: std::sync::atomic::AtomicU32,
    degraded_after: u32,
    unhealthy_after: u32,
}

impl HealthMonitor {
    pub fn new(degraded_after: u32, unhealthy_after: u32) -> Self {
        Self {
            status: Mutex::new(HealthStatus::Healthy),
            checked_at: Mutex::new(None),
            message: Mutex::new(None),
            consecutive_failures: std::sync::atomic::AtomicU32::new(0),
            degraded_after: degraded_after.max(1),
            unhealthy_after: unhealthy_after.max(degraded_after + 1),
        }
    }

    pub fn record(&self, result: docstore_core::errors::DocstoreResult<()>) {
        *self.checked_at.lock().expect("health mutex poisoned") = Some(Utc::now());
        match result {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                *self.status.lock().expect("health mutex poisoned") = HealthStatus::Healthy;
                *self.message.lock().expect("health mutex poisoned") = None;
            }
            Err(err) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                let status = if failures >= self.unhealthy_after {
                    HealthStatus::Unhealthy
                } else if failures >= self.degraded_after {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                };
                warn!(failures, %err, "health check failed");
                *self.status.lock().expect("health mutex poisoned") = status;
                *self.message.lock().expect("health mutex poisoned") = Some(err.to_string());
            }
        }
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: *self.status.lock().expect("health mutex poisoned"),
            checked_at: self.checked_at.lock().expect("health mutex poisoned").unwrap_or_else(Utc::now),
            message: self.message.lock().expect("health mutex poisoned").clone(),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }
}

/// A background health-check loop. Runs on a plain OS thread (the engine
/// has no async runtime anywhere else in its call path, so a timer thread
/// plus `thread::sleep` keeps the whole crate tree runtime-agnostic rather
/// than pulling every embedding application into a tokio runtime just for
/// this one periodic probe).
pub struct HealthMonitorHandle {
    stop: Arc<AtomicBool>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl HealthMonitorHandle {
    pub fn spawn(engine: Arc<StorageEngine>, monitor: Arc<HealthMonitor>, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_inner = stop.clone();
        let join = std::thread::spawn(move || {
            info!(interval_secs = interval.as_secs(), "health-check timer started");
            while !stop_inner.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if stop_inner.load(Ordering::Relaxed) {
                    break;
                }
                monitor.record(round_trip_check(&engine));
            }
        });
        Self { stop, join: Some(join) }
    }

    /// Stop the timer and wait for the thread to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for HealthMonitorHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_healthy_with_no_checks_recorded() {
        let monitor = HealthMonitor::new(3, 6);
        assert_eq!(monitor.report().status, HealthStatus::Healthy);
    }

    #[test]
    fn degrades_after_enough_consecutive_failures() {
        let monitor = HealthMonitor::new(2, 5);
        let err = || Err(docstore_storage::to_storage_err("probe failed"));
        monitor.record(err());
        assert_eq!(monitor.report().status, HealthStatus::Healthy);
        monitor.record(err());
        assert_eq!(monitor.report().status, HealthStatus::Degraded);
    }

    #[test]
    fn becomes_unhealthy_past_the_unhealthy_threshold() {
        let monitor = HealthMonitor::new(1, 3);
        let err = || Err(docstore_storage::to_storage_err("probe failed"));
        for _ in 0..3 {
            monitor.record(err());
        }
        assert_eq!(monitor.report().status, HealthStatus::Unhealthy);
    }

    #[test]
    fn a_success_resets_the_failure_streak() {
        let monitor = HealthMonitor::new(1, 3);
        monitor.record(Err(docstore_storage::to_storage_err("x")));
        monitor.record(Ok(()));
        let report = monitor.report();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.consecutive_failures, 0);
    }

    #[test]
    fn the_background_timer_updates_the_monitor() {
        use docstore_core::schema::Schema;

        let engine = Arc::new(StorageEngine::open_in_memory(Schema::new()).unwrap());
        let monitor = Arc::new(HealthMonitor::new(2, 4));
        let handle = HealthMonitorHandle::spawn(engine, monitor.clone(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(50));
        handle.stop();
        assert!(monitor.report().checked_at <= Utc::now());
        assert_eq!(monitor.report().status, HealthStatus::Healthy);
    }
}

//! Metrics and health for the engine: per-operation counters and timings,
//! global cache/throughput gauges, and a background health-check timer
//! that probes the meta store at a configured interval.

pub mod health;
pub mod metrics;

pub use health::{HealthMonitor, HealthMonitorHandle, HealthReport, HealthStatus};
pub use metrics::{timed, MetricsCollector, MetricsSnapshot, OperationSnapshot};

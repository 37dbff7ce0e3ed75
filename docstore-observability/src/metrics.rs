//! Central metrics registry: one collector per operation name plus a
//! handful of process-wide gauges. The collector set is dynamic — one
//! entry per operation name, created on first use — since an embedding
//! application's table and operation names aren't known ahead of time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

const MAX_TIMING_HISTORY: usize = 256;
const MAX_MEMORY_SAMPLES: usize = 64;

/// Per-operation counters: how many times it ran, how long each took
/// (bounded history), and how many of those runs failed.
#[derive(Debug, Default)]
struct OperationMetrics {
    count: u64,
    error_count: u64,
    timings: VecDeque<Duration>,
}

impl OperationMetrics {
    fn record(&mut self, elapsed: Duration, success: bool) {
        self.count += 1;
        if !success {
            self.error_count += 1;
        }
        self.timings.push_back(elapsed);
        if self.timings.len() > MAX_TIMING_HISTORY {
            self.timings.pop_front();
        }
    }

    fn average(&self) -> Duration {
        if self.timings.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.timings.iter().sum();
        total / self.timings.len() as u32
    }
}

/// A snapshot of one operation's metrics, safe to serialize and hand back
/// through `getMetrics`.
#[derive(Debug, Clone, Serialize)]
pub struct OperationSnapshot {
    pub op: String,
    pub count: u64,
    pub error_count: u64,
    pub average_duration_ms: f64,
}

/// A snapshot of the whole collector, as returned by `getMetrics`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct MetricsSnapshot {
    pub operations: Vec<OperationSnapshot>,
    pub cache_hit_rate: f64,
    pub average_response_time_ms: f64,
    pub throughput_per_sec: f64,
    pub memory_usage_bytes: Vec<u64>,
}

/// Process-wide metrics registry. Cheap to clone (an `Arc` inside, matching
/// how `docstore-resilience::CircuitBreakerRegistry` is shared by an
/// `Engine`).
#[derive(Default)]
pub struct MetricsCollector {
    operations: DashMap<String, Mutex<OperationMetrics>>,
    memory_samples: Mutex<VecDeque<u64>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    started_at: Mutex<Option<std::time::Instant>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed call to `op`, for timing and error-rate
    /// purposes.
    pub fn record_operation(&self, op: &str, elapsed: Duration, success: bool) {
        self.started_at.lock().expect("metrics mutex poisoned").get_or_insert_with(std::time::Instant::now);
        let entry = self
            .operations
            .entry(op.to_string())
            .or_insert_with(|| Mutex::new(OperationMetrics::default()));
        entry.lock().expect("metrics mutex poisoned").record(elapsed, success);
    }

    /// Record a cache probe outcome (the embedder cache, an L1 record
    /// cache, or any other cache a caller wants reflected in
    /// `cache_hit_rate`).
    pub fn record_cache_probe(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a point-in-time memory-usage sample, in bytes.
    pub fn record_memory_sample(&self, bytes: u64) {
        let mut samples = self.memory_samples.lock().expect("metrics mutex poisoned");
        samples.push_back(bytes);
        if samples.len() > MAX_MEMORY_SAMPLES {
            samples.pop_front();
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed) as f64;
        let misses = self.cache_misses.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            return 0.0;
        }
        hits / (hits + misses)
    }

    fn average_response_time(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut count = 0u64;
        for entry in self.operations.iter() {
            let metrics = entry.value().lock().expect("metrics mutex poisoned");
            total += metrics.average() * metrics.count.min(u32::MAX as u64) as u32;
            count += metrics.count;
        }
        if count == 0 {
            return Duration::ZERO;
        }
        total / count as u32
    }

    fn throughput_per_sec(&self) -> f64 {
        let elapsed = self
            .started_at
            .lock()
            .expect("metrics mutex poisoned")
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if elapsed <= 0.0 {
            return 0.0;
        }
        let total: u64 = self
            .operations
            .iter()
            .map(|e| e.value().lock().expect("metrics mutex poisoned").count)
            .sum();
        total as f64 / elapsed
    }

    /// Snapshot everything for `getMetrics()`.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = self
            .operations
            .iter()
            .map(|entry| {
                let metrics = entry.value().lock().expect("metrics mutex poisoned");
                OperationSnapshot {
                    op: entry.key().clone(),
                    count: metrics.count,
                    error_count: metrics.error_count,
                    average_duration_ms: metrics.average().as_secs_f64() * 1000.0,
                }
            })
            .collect();
        let memory_usage_bytes = self.memory_samples.lock().expect("metrics mutex poisoned").iter().copied().collect();
        MetricsSnapshot {
            operations,
            cache_hit_rate: self.cache_hit_rate(),
            average_response_time_ms: self.average_response_time().as_secs_f64() * 1000.0,
            throughput_per_sec: self.throughput_per_sec(),
            memory_usage_bytes,
        }
    }

    /// Reset all counters. Useful for tests and for periodic rotation.
    pub fn reset(&self) {
        self.operations.clear();
        self.memory_samples.lock().expect("metrics mutex poisoned").clear();
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        *self.started_at.lock().expect("metrics mutex poisoned") = None;
    }
}

/// Times a closure and records it against `op`, classifying success by
/// whether the closure returned `Ok`.
pub fn timed<T, E>(collector: &MetricsCollector, op: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let start = std::time::Instant::now();
    let result = f();
    collector.record_operation(op, start.elapsed(), result.is_ok());
    result
}

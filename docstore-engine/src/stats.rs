//! `getStats`/`getMemoryStats`/`getErrorRecoveryStats`: the read-only
//! introspection surface over per-table stats accounting, the embedder
//! cache and metrics collector, and the resilience layer.

use std::collections::BTreeMap;

use docstore_core::errors::DocstoreResult;
use docstore_core::traits::RecordStore;
use docstore_resilience::CircuitState;

use crate::Engine;

/// `(count, totalBytes)` for one table.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TableStats {
    pub count: usize,
    pub total_bytes: u64,
}

/// The result of `getStats(table?)`: either one table's counters or every
/// table's, keyed by name.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatsReport {
    pub tables: BTreeMap<String, TableStats>,
}

pub(crate) fn get_stats(engine: &Engine, table: Option<&str>) -> DocstoreResult<StatsReport> {
    let storage = engine.active_storage();
    let names = match table {
        Some(name) => vec![name.to_string()],
        None => storage.schema()?.table_names(),
    };

    let mut tables = BTreeMap::new();
    for name in names {
        let count = storage.count(&name)?;
        let total_bytes = storage.total_bytes(&name)?;
        tables.insert(name, TableStats { count, total_bytes });
    }
    Ok(StatsReport { tables })
}

/// Process-wide memory/cache gauges, as returned by `getMemoryStats`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryStats {
    pub embedder_cache_hit_rate: f64,
    pub metrics_cache_hit_rate: f64,
    pub memory_usage_samples_bytes: Vec<u64>,
    pub average_response_time_ms: f64,
    pub throughput_per_sec: f64,
    pub fallback_active: bool,
}

pub(crate) fn get_memory_stats(engine: &Engine) -> MemoryStats {
    let snapshot = engine.0.metrics.snapshot();
    MemoryStats {
        embedder_cache_hit_rate: engine.0.embedder_cache.hit_rate(),
        metrics_cache_hit_rate: snapshot.cache_hit_rate,
        memory_usage_samples_bytes: snapshot.memory_usage_bytes,
        average_response_time_ms: snapshot.average_response_time_ms,
        throughput_per_sec: snapshot.throughput_per_sec,
        fallback_active: engine.0.fallback.is_active(),
    }
}

/// The resilience layer's current standing, as returned by
/// `getErrorRecoveryStats`: every operation's circuit state, whether the
/// engine is currently routing to the in-memory fallback substrate, and
/// the background health monitor's last verdict.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorRecoveryStats {
    pub circuit_breakers: BTreeMap<String, CircuitBreakerState>,
    pub fallback_active: bool,
    pub health: docstore_observability::HealthReport,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl From<CircuitState> for CircuitBreakerState {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => CircuitBreakerState::Closed,
            CircuitState::Open => CircuitBreakerState::Open,
            CircuitState::HalfOpen => CircuitBreakerState::HalfOpen,
        }
    }
}

pub(crate) fn get_error_recovery_stats(engine: &Engine) -> ErrorRecoveryStats {
    let circuit_breakers = engine
        .0
        .breakers
        .snapshot()
        .into_iter()
        .map(|(op, state)| (op, CircuitBreakerState::from(state)))
        .collect();
    ErrorRecoveryStats {
        circuit_breakers,
        fallback_active: engine.0.fallback.is_active(),
        health: engine.0.health.report(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::column::ColumnType;
    use docstore_core::config::DocstoreConfig;
    use docstore_core::record::{Record, Value};
    use docstore_core::schema::{ColumnDef, Schema, TableSchema};

    fn engine() -> Engine {
        let schema = Schema::new().table(TableSchema::new("docs").column(ColumnDef::new("body", ColumnType::String)));
        Engine::init("t", crate::EngineOptions::new(schema).with_config(DocstoreConfig::default())).unwrap()
    }

    #[test]
    fn stats_reflect_inserted_records() {
        let engine = engine();
        let mut r = Record::new();
        r.insert("body".into(), Value::Text("hello".into()));
        engine.insert("docs", r).unwrap();

        let report = engine.get_stats(Some("docs")).unwrap();
        assert_eq!(report.tables["docs"].count, 1);
    }

    #[test]
    fn stats_with_no_table_covers_every_table() {
        let engine = engine();
        let report = engine.get_stats(None).unwrap();
        assert!(report.tables.contains_key("docs"));
    }

    #[test]
    fn error_recovery_stats_reflect_a_circuit_that_has_run() {
        let engine = engine();
        let mut r = Record::new();
        r.insert("body".into(), Value::Text("hello".into()));
        engine.insert("docs", r).unwrap();

        let stats = engine.get_error_recovery_stats();
        assert!(!stats.fallback_active);
        assert!(matches!(stats.circuit_breakers.get("insert"), Some(CircuitBreakerState::Closed)));
    }

    #[test]
    fn memory_stats_report_a_zero_hit_rate_before_any_cache_use() {
        let engine = engine();
        let stats = engine.get_memory_stats();
        assert_eq!(stats.embedder_cache_hit_rate, 0.0);
    }
}

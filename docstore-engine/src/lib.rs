//! The top-level `Engine`: the single type an embedding application talks
//! to. Composes the storage substrate, the lexical and vector indexes, the
//! encryption envelope, the change bus, and the resilience/observability
//! layers behind one facade.
//!
//! A process may hold several `Engine`s (distinct databases) at once;
//! nothing here is a global — every piece of mutable state is a field on
//! `Inner`, reached only through the `Arc` an `Engine` wraps.

pub mod auth;
pub mod crud;
pub mod encryption;
pub mod embedding;
pub mod export_import;
pub mod query;
pub mod stats;
pub mod transaction;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;

use docstore_core::config::DocstoreConfig;
use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::schema::Schema;
use docstore_core::traits::{AuthHook, ChangeSubscriber, Embedder};
use docstore_crypto::KeyHandle;
use docstore_events::{ChangeBus, Unsubscribe};
use docstore_observability::{HealthMonitor, HealthMonitorHandle, MetricsCollector};
use docstore_resilience::{CircuitBreakerRegistry, FallbackController};
use docstore_storage::StorageEngine;
use docstore_vector::{EmbedderCache, VectorIndexCache};

/// A schema migration step, run once when `defineSchema` raises the stored
/// version to (at least) the key's value. Receives the engine itself (so a
/// migration can read/write records with the full `Engine` API) and the
/// version being migrated away from.
pub type MigrationFn = Box<dyn Fn(&Engine, u32) -> DocstoreResult<()> + Send + Sync>;

/// Arguments to [`Engine::init`].
pub struct EngineOptions {
    /// `None` opens an in-memory substrate; `Some(path)` opens/creates a
    /// file-backed one.
    pub path: Option<PathBuf>,
    pub schema: Schema,
    pub config: DocstoreConfig,
    pub migrations: std::collections::BTreeMap<u32, MigrationFn>,
}

impl EngineOptions {
    pub fn new(schema: Schema) -> Self {
        Self {
            path: None,
            schema,
            config: DocstoreConfig::default(),
            migrations: std::collections::BTreeMap::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_config(mut self, config: DocstoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_migration(mut self, version: u32, f: MigrationFn) -> Self {
        self.migrations.insert(version, f);
        self
    }
}

pub(crate) struct Inner {
    pub(crate) name: String,
    pub(crate) storage: Arc<StorageEngine>,
    pub(crate) fallback_storage: Arc<StorageEngine>,
    pub(crate) fallback: Arc<FallbackController>,
    pub(crate) key: RwLock<Option<KeyHandle>>,
    pub(crate) embedders: DashMap<String, Arc<dyn Embedder>>,
    pub(crate) embedder_cache: EmbedderCache,
    pub(crate) vector_index_cache: VectorIndexCache,
    pub(crate) bus: ChangeBus,
    pub(crate) breakers: CircuitBreakerRegistry,
    pub(crate) resilience_config: docstore_core::config::ResilienceConfig,
    pub(crate) metrics: Arc<MetricsCollector>,
    pub(crate) health: Arc<HealthMonitor>,
    pub(crate) health_handle: Mutex<Option<HealthMonitorHandle>>,
    pub(crate) fallback_watch_stop: Arc<AtomicBool>,
    pub(crate) fallback_watch_join: Mutex<Option<std::thread::JoinHandle<()>>>,
    pub(crate) auth_hooks: DashMap<String, Arc<dyn AuthHook>>,
    pub(crate) auth_failures: Mutex<VecDeque<DateTime<Utc>>>,
    pub(crate) config: DocstoreConfig,
}

/// The embeddable document store. Cheap to clone (an `Arc` inside); every
/// clone shares the same underlying substrate, indexes, and background
/// threads.
#[derive(Clone)]
pub struct Engine(pub(crate) Arc<Inner>);

impl Engine {
    /// Create or open a database named `name` per `options`. `name` is a
    /// diagnostic label only — the actual file, if any, is `options.path`.
    pub fn init(name: impl Into<String>, options: EngineOptions) -> DocstoreResult<Self> {
        let name = name.into();
        let storage = match &options.path {
            Some(path) => StorageEngine::open(path, options.schema.clone())?,
            None => StorageEngine::open_in_memory(options.schema.clone())?,
        };
        let opened_at_version = storage.opened_at_version();
        let fallback_storage = StorageEngine::open_in_memory(options.schema.clone())?;

        let inner = Inner {
            name: name.clone(),
            storage: Arc::new(storage),
            fallback_storage: Arc::new(fallback_storage),
            fallback: Arc::new(FallbackController::new(options.config.resilience.failure_threshold)),
            key: RwLock::new(None),
            embedders: DashMap::new(),
            embedder_cache: EmbedderCache::new(options.config.embedder_cache_max_entries),
            vector_index_cache: VectorIndexCache::new(),
            bus: ChangeBus::new(),
            breakers: CircuitBreakerRegistry::new(),
            resilience_config: options.config.resilience.clone(),
            metrics: Arc::new(MetricsCollector::new()),
            health: Arc::new(HealthMonitor::new(2, 4)),
            health_handle: Mutex::new(None),
            fallback_watch_stop: Arc::new(AtomicBool::new(false)),
            fallback_watch_join: Mutex::new(None),
            auth_hooks: DashMap::new(),
            auth_failures: Mutex::new(VecDeque::new()),
            config: options.config.clone(),
        };
        let engine = Self(Arc::new(inner));

        // A freshly created database has no prior data to migrate: its
        // tables are already built at `options.schema`'s version, so every
        // registered step is skipped. A reopened database only replays the
        // steps between the version it was actually stored at and the
        // requested one — never the ones it already passed on a prior run.
        if let Some(prev_version) = opened_at_version {
            for (version, migration) in &options.migrations {
                if prev_version < *version && *version <= options.schema.version {
                    migration(&engine, prev_version)?;
                }
            }
        }

        engine.spawn_background_threads();
        info!(name = %engine.0.name, "engine initialized");
        Ok(engine)
    }

    fn spawn_background_threads(&self) {
        let interval = Duration::from_secs(self.0.config.health_check_interval_secs.max(1));
        let handle = HealthMonitorHandle::spawn(self.0.storage.clone(), self.0.health.clone(), interval);
        *self.0.health_handle.lock().expect("health handle mutex poisoned") = Some(handle);

        let storage = self.0.storage.clone();
        let fallback = self.0.fallback.clone();
        let stop = self.0.fallback_watch_stop.clone();
        let join = std::thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                if fallback.is_active() && docstore_observability::health::round_trip_check(&storage).is_ok() {
                    fallback.recover();
                }
            }
        });
        *self.0.fallback_watch_join.lock().expect("fallback watch mutex poisoned") = Some(join);
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The storage substrate currently serving reads/writes: the primary
    /// one, unless the fallback controller has tripped into degraded mode.
    pub(crate) fn active_storage(&self) -> &Arc<StorageEngine> {
        if self.0.fallback.is_active() {
            &self.0.fallback_storage
        } else {
            &self.0.storage
        }
    }

    /// Run `f` under the retry/circuit-breaker policy, timing it for
    /// `getMetrics` and recording its outcome against the fallback
    /// controller when it is storage-classified.
    pub(crate) fn resilient<T>(&self, op: &str, f: impl FnMut() -> DocstoreResult<T>) -> DocstoreResult<T> {
        let start = std::time::Instant::now();
        let result = docstore_resilience::call_with_resilience(&self.0.breakers, &self.0.resilience_config, op, f);
        self.0.metrics.record_operation(op, start.elapsed(), result.is_ok());
        if let Err(err) = &result {
            if err.classify() == docstore_core::errors::ErrorClass::Storage {
                self.0.fallback.record_storage_result(false);
            }
        } else {
            self.0.fallback.record_storage_result(true);
        }
        result
    }

    pub fn define_schema(&self, schema: Schema, version: Option<u32>) -> DocstoreResult<()> {
        let mut schema = schema;
        if let Some(v) = version {
            schema.version = v;
        }
        self.0.storage.define_schema(schema.clone())?;
        self.0.fallback_storage.define_schema(schema)?;
        Ok(())
    }

    pub fn get_schema(&self) -> DocstoreResult<Schema> {
        self.active_storage().schema()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.active_storage().schema().map(|s| s.table_names()).unwrap_or_default()
    }

    pub fn schema_version(&self) -> u32 {
        self.active_storage().schema().map(|s| s.version).unwrap_or(0)
    }

    /// Register an embedder for `table`'s vector column. Subsequent writes
    /// whose vector source field is text-valued embed through it; queries
    /// via `vector_search_text` use it too.
    pub fn register_embedder(&self, table: impl Into<String>, embedder: Arc<dyn Embedder>) {
        self.0.embedders.insert(table.into(), embedder);
    }

    /// Subscribe to every change event on `table`.
    pub fn subscribe(&self, table: &str, subscriber: Arc<dyn ChangeSubscriber>) -> Unsubscribe {
        self.0.bus.subscribe(table, subscriber)
    }

    /// Register an authorization hook under `name`. Every mutating
    /// operation must pass every registered hook.
    pub fn register_auth_hook(&self, name: impl Into<String>, hook: Arc<dyn AuthHook>) {
        self.0.auth_hooks.insert(name.into(), hook);
    }

    pub fn set_encryption_key(&self, passphrase: &str, salt: Option<[u8; docstore_core::constants::SALT_LEN]>) -> DocstoreResult<()> {
        encryption::set_encryption_key(self, passphrase, salt)
    }

    pub fn rotate_encryption_key(&self, new_passphrase: &str) -> DocstoreResult<()> {
        encryption::rotate_encryption_key(self, new_passphrase)
    }

    /// `buildOptimalVectorIndex`: (re)build `table`'s vector index now,
    /// regardless of whether the cached build looks current, and record
    /// the result so the next `vector_search`/`vector_search_text` call
    /// reuses it instead of rebuilding.
    pub fn build_vector_index(&self, table: &str) -> DocstoreResult<()> {
        self.resilient("build_vector_index", || {
            let storage = self.active_storage();
            let schema = storage.schema_for(table)?;
            self.0.vector_index_cache.force_build(storage, &schema, &self.0.config.vector)?;
            Ok(())
        })
    }

    pub fn get_stats(&self, table: Option<&str>) -> DocstoreResult<stats::StatsReport> {
        stats::get_stats(self, table)
    }

    pub fn get_memory_stats(&self) -> stats::MemoryStats {
        stats::get_memory_stats(self)
    }

    pub fn get_error_recovery_stats(&self) -> stats::ErrorRecoveryStats {
        stats::get_error_recovery_stats(self)
    }

    pub fn get_metrics(&self) -> docstore_observability::MetricsSnapshot {
        self.0.metrics.snapshot()
    }

    /// Publish `event`, swallowing subscriber failures. Called after a
    /// commit, never from inside the committing transaction.
    pub(crate) fn publish(&self, event: docstore_core::traits::ChangeEvent) {
        self.0.bus.publish(event);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.fallback_watch_stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.fallback_watch_join.lock().expect("fallback watch mutex poisoned").take() {
            let _ = join.join();
        }
        if let Some(handle) = self.health_handle.lock().expect("health handle mutex poisoned").take() {
            handle.stop();
        }
        info!(name = %self.name, "engine shut down");
    }
}

mod resilience_config;
mod vector_config;

pub use resilience_config::ResilienceConfig;
pub use vector_config::{VectorIndexConfig, VectorIndexKind};

use serde::{Deserialize, Serialize};

use crate::constants;

/// Top-level engine configuration, aggregating every component's config
/// into one value an embedding application can build once and pass to
/// `Engine::init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocstoreConfig {
    pub path: Option<std::path::PathBuf>,
    pub resilience: ResilienceConfig,
    pub vector: VectorIndexConfig,
    pub embedder_cache_max_entries: u64,
    pub bulk_batch_size: usize,
    pub health_check_interval_secs: u64,
}

impl Default for DocstoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            resilience: ResilienceConfig::default(),
            vector: VectorIndexConfig::default(),
            embedder_cache_max_entries: 10_000,
            bulk_batch_size: constants::MAX_BULK_BATCH_SIZE,
            health_check_interval_secs: 30,
        }
    }
}

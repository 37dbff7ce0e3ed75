use serde::{Deserialize, Serialize};

use crate::constants;

/// Which vector access path to use. `Auto` applies the
/// `buildOptimalVectorIndex` heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VectorIndexKind {
    #[default]
    Auto,
    Exact,
    Ivf,
    Hnsw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    pub kind: VectorIndexKind,
    /// Number of k-means clusters IVF partitions records into. `0` means
    /// "derive from record count" (`sqrt(N)`, floored at 1).
    pub ivf_clusters: usize,
    pub ivf_probes: usize,
    pub hnsw_ef_search: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            kind: VectorIndexKind::Auto,
            ivf_clusters: 0,
            ivf_probes: constants::DEFAULT_IVF_PROBES,
            hnsw_ef_search: constants::DEFAULT_HNSW_EF_SEARCH,
            hnsw_ef_construction: 200,
            hnsw_m: 16,
        }
    }
}

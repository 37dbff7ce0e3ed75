use serde::{Deserialize, Serialize};

use crate::constants;

/// Resilience layer configuration: retry policy + circuit breaker
/// thresholds, shared across every operation name unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY_MS,
            multiplier: constants::DEFAULT_RETRY_MULTIPLIER,
            max_delay_ms: constants::DEFAULT_RETRY_MAX_DELAY_MS,
            failure_threshold: constants::DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            reset_timeout_ms: constants::DEFAULT_CIRCUIT_RESET_TIMEOUT_MS,
        }
    }
}

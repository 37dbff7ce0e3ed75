//! Retry with exponential backoff, composed with the circuit breaker.
//!
//! Backoff sleeps on the calling thread: the engine's operations are all
//! synchronous (no async runtime anywhere in the write/read path), so
//! there is nothing to yield to — `std::thread::sleep` blocks the caller
//! directly, same as every other wait in this crate.

use std::time::Duration;

use docstore_core::config::ResilienceConfig;
use docstore_core::errors::{DocstoreError, DocstoreResult};
use tracing::warn;

use crate::breaker::{Admission, CircuitBreakerRegistry};

/// Run `f`, retrying per `config`'s policy and consulting/updating
/// `registry`'s breaker for `op`. Only `Transient`, `Network`, and
/// `Storage`-classified errors are retried; everything else fails
/// immediately.
pub fn call_with_resilience<T>(
    registry: &CircuitBreakerRegistry,
    config: &ResilienceConfig,
    op: &str,
    mut f: impl FnMut() -> DocstoreResult<T>,
) -> DocstoreResult<T> {
    match registry.admit(op, config) {
        Admission::Rejected => return Err(DocstoreError::CircuitOpen { operation: op.to_string() }),
        Admission::Proceed | Admission::HalfOpenTrial => {}
    }

    let mut attempt = 0u32;
    loop {
        match f() {
            Ok(value) => {
                registry.record_success(op);
                return Ok(value);
            }
            Err(err) => {
                let retryable = err.is_retryable();
                if !retryable || attempt >= config.max_retries {
                    registry.record_failure(op, config);
                    return Err(err);
                }
                let delay_ms = (config.base_delay_ms as f64 * config.multiplier.powi(attempt as i32))
                    .min(config.max_delay_ms as f64) as u64;
                warn!(op, attempt, delay_ms, error = %err, "retrying after classified error");
                std::thread::sleep(Duration::from_millis(delay_ms));
                attempt += 1;
            }
        }
    }
}

//! The resilience layer: every externally observable engine operation is
//! wrapped in a retry policy, a per-operation circuit breaker, and (at the
//! engine layer) a graceful-degradation fallback that can swap the active
//! storage substrate for an in-memory one under sustained failure.

pub mod breaker;
pub mod fallback;
pub mod retry;

pub use breaker::{CircuitBreakerRegistry, CircuitState};
pub use fallback::FallbackController;
pub use retry::call_with_resilience;

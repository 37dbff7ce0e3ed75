//! Per-operation circuit breaker: `Closed -> Open` after
//! `failure_threshold` consecutive failures, `Open -> HalfOpen` after
//! `reset_timeout`, one trial attempt in `HalfOpen`, success returns to
//! `Closed`, failure returns to `Open`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use docstore_core::config::ResilienceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl Breaker {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Whether a call may currently proceed, decided just before the call is
/// attempted. `HalfOpenTrial` means "let exactly this one call through and
/// judge the circuit's fate on its outcome".
pub enum Admission {
    Proceed,
    HalfOpenTrial,
    Rejected,
}

/// A registry of one breaker per operation name, shared process-wide by an
/// `Engine` and mutable from concurrent callers.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Mutex<Breaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, op: &str, config: &ResilienceConfig) -> Admission {
        let entry = self.breakers.entry(op.to_string()).or_insert_with(|| Mutex::new(Breaker::new()));
        let mut breaker = entry.lock().expect("circuit breaker mutex poisoned");
        match breaker.state {
            CircuitState::Closed => Admission::Proceed,
            CircuitState::HalfOpen => Admission::Rejected, // a trial is already in flight
            CircuitState::Open => {
                let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                if elapsed >= Duration::from_millis(config.reset_timeout_ms) {
                    breaker.state = CircuitState::HalfOpen;
                    Admission::HalfOpenTrial
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    pub fn record_success(&self, op: &str) {
        let entry = self.breakers.entry(op.to_string()).or_insert_with(|| Mutex::new(Breaker::new()));
        let mut breaker = entry.lock().expect("circuit breaker mutex poisoned");
        breaker.state = CircuitState::Closed;
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
    }

    pub fn record_failure(&self, op: &str, config: &ResilienceConfig) {
        let entry = self.breakers.entry(op.to_string()).or_insert_with(|| Mutex::new(Breaker::new()));
        let mut breaker = entry.lock().expect("circuit breaker mutex poisoned");
        match breaker.state {
            CircuitState::HalfOpen => {
                breaker.state = CircuitState::Open;
                breaker.opened_at = Some(Instant::now());
            }
            CircuitState::Closed | CircuitState::Open => {
                breaker.consecutive_failures += 1;
                if breaker.consecutive_failures >= config.failure_threshold {
                    breaker.state = CircuitState::Open;
                    breaker.opened_at = Some(Instant::now());
                }
            }
        }
    }

    pub fn state_of(&self, op: &str) -> CircuitState {
        self.breakers
            .get(op)
            .map(|e| e.lock().expect("circuit breaker mutex poisoned").state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Every operation name that has ever seen a success or failure, with
    /// its current state — for `getErrorRecoveryStats`.
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().lock().expect("circuit breaker mutex poisoned").state))
            .collect()
    }
}

//! Authorization gate for mutating operations: every registered hook must
//! accept the call, and a sliding window of recent rejections can itself
//! trip a rate limit independent of any single hook's own logic.

use chrono::Utc;

use docstore_core::constants::{AUTH_FAILURE_RATE_LIMIT_THRESHOLD, AUTH_FAILURE_WINDOW_SECS};
use docstore_core::errors::{DocstoreError, DocstoreResult};
use docstore_core::record::Record;

use crate::Engine;

/// Run `data` through every registered auth hook for `operation` on
/// `table`. A rejection both fails this call and counts toward the
/// rolling rate limit; once the window holds too many rejections, every
/// subsequent call fails fast with `RateLimited` until the window ages
/// them out, regardless of what the hooks themselves would have said.
///
/// Hooks run against this `Engine` instance as a whole, not per caller:
/// there is no client identity threaded through the base CRUD API for the
/// window to key on.
pub(crate) fn check(engine: &Engine, operation: &str, table: &str, data: Option<&Record>) -> DocstoreResult<()> {
    prune_and_check_rate_limit(engine)?;

    for hook in engine.0.auth_hooks.iter() {
        if !hook.check(operation, table, data) {
            record_failure(engine);
            return Err(DocstoreError::Authentication {
                operation: operation.to_string(),
                table: table.to_string(),
            });
        }
    }
    Ok(())
}

fn prune_and_check_rate_limit(engine: &Engine) -> DocstoreResult<()> {
    let mut failures = engine.0.auth_failures.lock().expect("auth failures mutex poisoned");
    let cutoff = Utc::now() - chrono::Duration::seconds(AUTH_FAILURE_WINDOW_SECS);
    while failures.front().is_some_and(|at| *at < cutoff) {
        failures.pop_front();
    }
    if failures.len() as u32 >= AUTH_FAILURE_RATE_LIMIT_THRESHOLD {
        return Err(DocstoreError::RateLimited {
            reason: format!("{} authentication failures in the last {} seconds", failures.len(), AUTH_FAILURE_WINDOW_SECS),
        });
    }
    Ok(())
}

fn record_failure(engine: &Engine) {
    let mut failures = engine.0.auth_failures.lock().expect("auth failures mutex poisoned");
    failures.push_back(Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::column::ColumnType;
    use docstore_core::config::DocstoreConfig;
    use docstore_core::schema::{ColumnDef, Schema, TableSchema};
    use docstore_core::traits::AuthHook;
    use std::sync::Arc;

    struct AlwaysDeny;
    impl AuthHook for AlwaysDeny {
        fn check(&self, _operation: &str, _table: &str, _data: Option<&Record>) -> bool {
            false
        }
    }

    fn engine() -> Engine {
        let schema = Schema::new().table(TableSchema::new("docs").column(ColumnDef::new("body", ColumnType::String)));
        Engine::init("t", crate::EngineOptions::new(schema).with_config(DocstoreConfig::default())).unwrap()
    }

    #[test]
    fn a_denying_hook_rejects_the_operation() {
        let engine = engine();
        engine.register_auth_hook("deny-all", Arc::new(AlwaysDeny));
        let result = engine.insert("docs", Record::new());
        assert!(matches!(result, Err(DocstoreError::Authentication { .. })));
    }

    #[test]
    fn enough_rejections_trip_the_rate_limit() {
        let engine = engine();
        engine.register_auth_hook("deny-all", Arc::new(AlwaysDeny));
        for _ in 0..AUTH_FAILURE_RATE_LIMIT_THRESHOLD {
            let _ = engine.insert("docs", Record::new());
        }
        let result = engine.insert("docs", Record::new());
        assert!(matches!(result, Err(DocstoreError::RateLimited { .. })));
    }

    #[test]
    fn no_hooks_registered_always_passes() {
        let engine = engine();
        assert!(check(&engine, "insert", "docs", None).is_ok());
    }
}

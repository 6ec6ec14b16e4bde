//! Retry loop breaker: flags an agent stuck on the same violations.

use std::sync::Arc;

use anyhow::Result;
use tracing::{instrument, warn};

use super::{Gate, GateContext};
use crate::core::types::{Finding, Provenance, Severity};
use crate::governance::retry::{RETRY_LOOP_DETECTED, RetryState};
use crate::io::config::RetryLoopBreakerConfig;
use crate::io::store::SessionStore;

pub const GATE_ID: &str = "retry-loop-breaker";

#[derive(Debug, Clone)]
pub struct RetryBreakerGate {
    store: Arc<SessionStore<RetryState>>,
    max_repeats: u32,
}

impl RetryBreakerGate {
    pub fn new(store: Arc<SessionStore<RetryState>>, config: &RetryLoopBreakerConfig) -> Self {
        Self {
            store,
            max_repeats: config.max_repeats,
        }
    }
}

impl Gate for RetryBreakerGate {
    fn id(&self) -> &str {
        GATE_ID
    }

    #[instrument(skip_all, fields(gate = GATE_ID))]
    fn run(&self, ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        let Some(state) = self.store.load(ctx.root) else {
            return Ok(Vec::new());
        };
        if state.repeats < self.max_repeats {
            return Ok(Vec::new());
        }
        warn!(repeats = state.repeats, "retry loop detected");
        Ok(vec![
            Finding::new(
                RETRY_LOOP_DETECTED,
                "Retry loop detected",
                format!(
                    "the last {} runs failed on the same rules without progress: {}",
                    state.repeats,
                    state.failing_ids.join(", ")
                ),
                Severity::High,
                Provenance::Governance,
            )
            .with_hint(
                "Stop retrying the same approach; re-read the violations and change strategy or ask for help",
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::retry::RETRY_STATE_FILE_NAME;
    use crate::io::discovery::ScanFilter;
    use chrono::Utc;

    fn run_with(repeats: Option<u32>) -> Vec<Finding> {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(SessionStore::new(RETRY_STATE_FILE_NAME));
        if let Some(repeats) = repeats {
            store
                .save(
                    temp.path(),
                    &RetryState {
                        fingerprint: "abc".to_string(),
                        failing_ids: vec!["FILE_TOO_LARGE".to_string()],
                        last_score: 95,
                        repeats,
                        updated_at: Utc::now(),
                    },
                )
                .expect("save");
        }
        let gate = RetryBreakerGate::new(store, &RetryLoopBreakerConfig::default());
        let filter = ScanFilter::default();
        let ctx = GateContext {
            root: temp.path(),
            golden_record: None,
            filter: &filter,
            source_extensions: &[],
            now: Utc::now(),
            baseline: None,
        };
        gate.run(&ctx).expect("run")
    }

    #[test]
    fn fires_once_repeats_reach_limit() {
        assert!(run_with(None).is_empty());
        assert!(run_with(Some(2)).is_empty());
        let findings = run_with(Some(3));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, RETRY_LOOP_DETECTED);
        assert!(findings[0].details.contains("FILE_TOO_LARGE"));
    }
}

//! Cycle fingerprints for the retry loop breaker.
//!
//! After every pipeline run the failing rule ids are hashed. Repeated failing
//! runs with the same fingerprint and no score gain bump a counter; anything
//! else resets it, and a pass clears the state.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::core::types::Report;
use crate::io::config::RetryLoopBreakerConfig;
use crate::io::store::SessionStore;

pub const RETRY_STATE_FILE_NAME: &str = "retry-state.json";
/// Rule id emitted by the breaker itself. Never part of a fingerprint.
pub const RETRY_LOOP_DETECTED: &str = "RETRY_LOOP_DETECTED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    pub fingerprint: String,
    /// Sorted, deduplicated failing rule ids of the last run.
    pub failing_ids: Vec<String>,
    pub last_score: u32,
    /// Consecutive failing runs sharing this fingerprint without progress.
    pub repeats: u32,
    pub updated_at: DateTime<Utc>,
}

/// Sorted unique failing ids of `report`, excluding the breaker's own finding.
pub fn failing_ids(report: &Report) -> Vec<String> {
    report
        .failures
        .iter()
        .map(|f| f.finding.id.as_str())
        .filter(|id| *id != RETRY_LOOP_DETECTED)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// SHA-256 hex of newline-joined ids.
pub fn fingerprint(ids: &[String]) -> String {
    let mut hasher = Sha256::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct RetryTracker {
    store: Arc<SessionStore<RetryState>>,
    min_score_gain: u32,
}

impl RetryTracker {
    pub fn new(store: Arc<SessionStore<RetryState>>, config: &RetryLoopBreakerConfig) -> Self {
        Self {
            store,
            min_score_gain: config.min_score_gain,
        }
    }

    pub fn state(&self, root: &Path) -> Option<RetryState> {
        self.store.load(root)
    }

    /// Fold one finished run into the state. Returns `None` after a pass.
    #[instrument(skip_all, fields(status = %report.status, score = report.stats.score))]
    pub fn record_cycle(
        &self,
        root: &Path,
        report: &Report,
        now: DateTime<Utc>,
    ) -> Result<Option<RetryState>> {
        if report.is_pass() {
            self.store.remove(root)?;
            debug!("retry state cleared");
            return Ok(None);
        }
        let ids = failing_ids(report);
        let print = fingerprint(&ids);
        let score = report.stats.score;
        let min_gain = self.min_score_gain;
        let next = self.store.update(root, |previous| {
            let repeats = match previous {
                Some(prev)
                    if prev.fingerprint == print
                        && score <= prev.last_score.saturating_add(min_gain) =>
                {
                    prev.repeats.saturating_add(1)
                }
                _ => 1,
            };
            Ok(RetryState {
                fingerprint: print,
                failing_ids: ids,
                last_score: score,
                repeats,
                updated_at: now,
            })
        })?;
        debug!(repeats = next.repeats, "retry state updated");
        Ok(Some(next))
    }
}

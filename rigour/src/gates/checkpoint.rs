//! Checkpoint supervision: stale sessions, low quality, and degrading trends.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::instrument;

use super::{Gate, GateContext};
use crate::core::drift::{slope, tail};
use crate::core::types::{Finding, Provenance, Severity};
use crate::governance::checkpoint::{CheckpointSession, SessionStatus};
use crate::io::config::CheckpointConfig;
use crate::io::store::SessionStore;

pub const GATE_ID: &str = "checkpoint-supervision";
const TREND_WINDOW: usize = 5;
const TREND_MIN_POINTS: usize = 3;

/// Evaluate one session against the checkpoint policy.
pub fn evaluate_session(
    session: &CheckpointSession,
    config: &CheckpointConfig,
    now: DateTime<Utc>,
) -> Vec<Finding> {
    let Some(latest) = session.checkpoints.last() else {
        return Vec::new();
    };
    let mut findings = Vec::new();

    if session.status == SessionStatus::Active {
        let last = session.last_checkpoint_at.unwrap_or(latest.timestamp);
        let allowed_secs =
            i64::try_from(config.interval_minutes.saturating_mul(120)).unwrap_or(i64::MAX);
        let elapsed = now - last;
        if elapsed.num_seconds() > allowed_secs {
            findings.push(
                Finding::new(
                    "CHECKPOINT_MISSING",
                    "Checkpoint overdue",
                    format!(
                        "last checkpoint was {} minutes ago; expected one every {} minutes",
                        elapsed.num_minutes(),
                        config.interval_minutes
                    ),
                    Severity::Medium,
                    Provenance::Governance,
                )
                .with_hint("Record a checkpoint with `rigour checkpoint record`"),
            );
        }
    }

    if latest.quality_score < config.quality_threshold {
        findings.push(
            Finding::new(
                "QUALITY_BELOW_THRESHOLD",
                "Checkpoint quality below threshold",
                format!(
                    "latest checkpoint scored {} (threshold {})",
                    latest.quality_score, config.quality_threshold
                ),
                Severity::High,
                Provenance::Governance,
            )
            .with_hint("Stop adding scope and fix the reported issues before the next checkpoint"),
        );
    }

    if config.drift_detection {
        let scores = session.scores();
        let window = tail(&scores, TREND_WINDOW);
        if window.len() >= TREND_MIN_POINTS {
            let s = slope(window);
            if s < config.drift_slope_threshold {
                findings.push(
                    Finding::new(
                        "DEGRADING_TREND",
                        "Checkpoint quality is degrading",
                        format!(
                            "quality slope over the last {} checkpoints is {s:.2} points per checkpoint (limit {:.2})",
                            window.len(),
                            config.drift_slope_threshold
                        ),
                        Severity::Medium,
                        Provenance::Governance,
                    )
                    .with_hint("Review the recent changes that lowered quality before continuing"),
                );
            }
        }
    }

    findings
}

#[derive(Debug, Clone)]
pub struct CheckpointGate {
    store: Arc<SessionStore<CheckpointSession>>,
    config: CheckpointConfig,
}

impl CheckpointGate {
    pub fn new(store: Arc<SessionStore<CheckpointSession>>, config: &CheckpointConfig) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }
}

impl Gate for CheckpointGate {
    fn id(&self) -> &str {
        GATE_ID
    }

    #[instrument(skip_all, fields(gate = GATE_ID))]
    fn run(&self, ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        Ok(self
            .store
            .load(ctx.root)
            .map(|session| evaluate_session(&session, &self.config, ctx.now))
            .unwrap_or_default())
    }
}

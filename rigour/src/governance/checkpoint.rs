//! Checkpoint sessions: periodic self-reported progress with quality scores.
//!
//! A session is `active` until completed or aborted. Recording on a closed
//! session starts a new one.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::io::store::{SessionStore, new_id};

pub const CHECKPOINT_FILE_NAME: &str = "checkpoint-session.json";
/// Prior entries averaged when looking for a sudden drop.
const DRIFT_LOOKBACK: usize = 3;
const DRIFT_MIN_PRIOR: usize = 2;
/// Points the prior average must exceed the new score by.
const DRIFT_DROP_POINTS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub progress_pct: u8,
    #[serde(default)]
    pub files_changed: Vec<String>,
    pub summary: String,
    pub quality_score: u32,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub last_checkpoint_at: Option<DateTime<Utc>>,
    pub checkpoints: Vec<CheckpointEntry>,
    pub status: SessionStatus,
}

impl CheckpointSession {
    fn start(now: DateTime<Utc>) -> Self {
        Self {
            session_id: new_id("session", now),
            started_at: now,
            last_checkpoint_at: None,
            checkpoints: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    pub fn scores(&self) -> Vec<f64> {
        self.checkpoints
            .iter()
            .map(|c| f64::from(c.quality_score))
            .collect()
    }
}

/// Caller-supplied checkpoint fields.
#[derive(Debug, Clone, Default)]
pub struct CheckpointInput {
    pub progress_pct: u8,
    pub files_changed: Vec<String>,
    pub summary: String,
    pub quality_score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub entry: CheckpointEntry,
    /// False when the score is below the quality threshold.
    pub should_continue: bool,
}

/// Drop warning when the last few prior scores average well above `new_score`.
pub fn drift_warning(prior: &[u32], new_score: u32) -> Option<String> {
    if prior.len() < DRIFT_MIN_PRIOR {
        return None;
    }
    let recent = &prior[prior.len().saturating_sub(DRIFT_LOOKBACK)..];
    let average = recent.iter().map(|s| f64::from(*s)).sum::<f64>() / recent.len() as f64;
    if average - f64::from(new_score) >= DRIFT_DROP_POINTS {
        Some(format!(
            "quality drift: score {new_score} is {:.1} points below the recent average {average:.1}",
            average - f64::from(new_score)
        ))
    } else {
        None
    }
}

/// Checkpoint operations for one store.
#[derive(Debug, Clone)]
pub struct CheckpointSupervisor {
    store: Arc<SessionStore<CheckpointSession>>,
    quality_threshold: u32,
}

impl CheckpointSupervisor {
    pub fn new(store: Arc<SessionStore<CheckpointSession>>, quality_threshold: u32) -> Self {
        Self {
            store,
            quality_threshold,
        }
    }

    pub fn session(&self, root: &Path) -> Option<CheckpointSession> {
        self.store.load(root)
    }

    #[instrument(skip_all, fields(score = input.quality_score, progress = input.progress_pct))]
    pub fn record(
        &self,
        root: &Path,
        input: CheckpointInput,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome> {
        if input.progress_pct > 100 {
            return Err(anyhow!("progress must be 0-100, got {}", input.progress_pct));
        }
        if input.quality_score > 100 {
            return Err(anyhow!(
                "quality score must be 0-100, got {}",
                input.quality_score
            ));
        }
        let threshold = self.quality_threshold;
        let mut outcome = None;
        self.store.update(root, |current| {
            let mut session = match current {
                Some(session) if session.status == SessionStatus::Active => session,
                _ => CheckpointSession::start(now),
            };
            let prior: Vec<u32> = session.checkpoints.iter().map(|c| c.quality_score).collect();
            let mut warnings = Vec::new();
            let should_continue = input.quality_score >= threshold;
            if !should_continue {
                warnings.push(format!(
                    "quality score {} is below threshold {threshold}",
                    input.quality_score
                ));
            }
            if let Some(drift) = drift_warning(&prior, input.quality_score) {
                warn!(session = %session.session_id, "{drift}");
                warnings.push(drift);
            }
            let entry = CheckpointEntry {
                id: new_id("chk", now),
                timestamp: now,
                progress_pct: input.progress_pct,
                files_changed: input.files_changed,
                summary: input.summary,
                quality_score: input.quality_score,
                warnings,
            };
            session.checkpoints.push(entry.clone());
            session.last_checkpoint_at = Some(now);
            outcome = Some(RecordOutcome {
                entry,
                should_continue,
            });
            Ok(session)
        })?;
        outcome.ok_or_else(|| anyhow!("checkpoint was not recorded"))
    }

    /// Close the active session.
    pub fn complete(&self, root: &Path, now: DateTime<Utc>) -> Result<CheckpointSession> {
        let session = self.store.update(root, |current| {
            let mut session = active(current)?;
            session.status = SessionStatus::Completed;
            session.last_checkpoint_at.get_or_insert(now);
            Ok(session)
        })?;
        info!(session = %session.session_id, "checkpoint session completed");
        Ok(session)
    }

    /// Close the active session with a synthetic zero-score entry carrying `reason`.
    pub fn abort(&self, root: &Path, reason: &str, now: DateTime<Utc>) -> Result<CheckpointSession> {
        let session = self.store.update(root, |current| {
            let mut session = active(current)?;
            let progress = session.checkpoints.last().map_or(0, |c| c.progress_pct);
            session.checkpoints.push(CheckpointEntry {
                id: new_id("chk", now),
                timestamp: now,
                progress_pct: progress,
                files_changed: Vec::new(),
                summary: "session aborted".to_string(),
                quality_score: 0,
                warnings: vec![reason.to_string()],
            });
            session.last_checkpoint_at = Some(now);
            session.status = SessionStatus::Aborted;
            Ok(session)
        })?;
        warn!(session = %session.session_id, reason, "checkpoint session aborted");
        Ok(session)
    }
}

fn active(current: Option<CheckpointSession>) -> Result<CheckpointSession> {
    match current {
        Some(session) if session.status == SessionStatus::Active => Ok(session),
        Some(session) => Err(anyhow!(
            "checkpoint session {} is already {}",
            session.session_id,
            session.status
        )),
        None => Err(anyhow!("no active checkpoint session")),
    }
}

//! Agent-to-agent handoff records (`.rigour/handoffs.jsonl`).
//!
//! New handoffs are appended. Status changes rewrite the file in place.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::io::store::{new_id, state_dir, write_atomic};

pub const HANDOFFS_FILE_NAME: &str = "handoffs.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffStatus {
    Pending,
    Accepted,
    Rejected,
    Completed,
}

impl HandoffStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HandoffStatus::Pending => "pending",
            HandoffStatus::Accepted => "accepted",
            HandoffStatus::Rejected => "rejected",
            HandoffStatus::Completed => "completed",
        }
    }

    /// Allowed transitions: pending to accepted/rejected, accepted to completed.
    fn can_become(self, next: HandoffStatus) -> bool {
        matches!(
            (self, next),
            (HandoffStatus::Pending, HandoffStatus::Accepted)
                | (HandoffStatus::Pending, HandoffStatus::Rejected)
                | (HandoffStatus::Accepted, HandoffStatus::Completed)
        )
    }
}

impl fmt::Display for HandoffStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handoff {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub task: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub status: HandoffStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a handoff is created.
#[derive(Debug, Clone, Default)]
pub struct NewHandoff {
    pub from_agent: String,
    pub to_agent: String,
    pub task: String,
    pub files: Vec<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HandoffLog {
    path: PathBuf,
}

impl HandoffLog {
    pub fn new(root: &Path) -> Self {
        Self {
            path: state_dir(root).join(HANDOFFS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a `pending` handoff.
    #[instrument(skip_all, fields(from = %request.from_agent, to = %request.to_agent))]
    pub fn initiate(&self, request: NewHandoff, now: DateTime<Utc>) -> Result<Handoff> {
        if request.from_agent == request.to_agent {
            return Err(anyhow!("handoff from an agent to itself"));
        }
        let handoff = Handoff {
            id: new_id("handoff", now),
            from_agent: request.from_agent,
            to_agent: request.to_agent,
            task: request.task,
            files: request.files,
            context: request.context,
            status: HandoffStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(&handoff).context("serialize handoff")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", self.path.display()))?;
        info!(id = %handoff.id, "handoff initiated");
        Ok(handoff)
    }

    /// Update one handoff's status and rewrite the log.
    #[instrument(skip_all, fields(id = %id, status = %status))]
    pub fn set_status(&self, id: &str, status: HandoffStatus, now: DateTime<Utc>) -> Result<Handoff> {
        let mut handoffs = self.load()?;
        let handoff = handoffs
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| anyhow!("unknown handoff '{id}'"))?;
        if !handoff.status.can_become(status) {
            return Err(anyhow!(
                "handoff '{id}' is {} and cannot become {status}",
                handoff.status
            ));
        }
        handoff.status = status;
        handoff.updated_at = now;
        let updated = handoff.clone();

        let mut buf = String::new();
        for record in &handoffs {
            buf.push_str(&serde_json::to_string(record).context("serialize handoff")?);
            buf.push('\n');
        }
        write_atomic(&self.path, &buf)?;
        Ok(updated)
    }

    /// All handoffs in creation order. Malformed lines are skipped.
    pub fn load(&self) -> Result<Vec<Handoff>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", self.path.display()));
            }
        };
        let mut handoffs = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(handoff) => handoffs.push(handoff),
                Err(err) => warn!(line = index + 1, error = %err, "skipping malformed handoff line"),
            }
        }
        Ok(handoffs)
    }

    /// Pending handoffs addressed to `agent_id`.
    pub fn pending_for(&self, agent_id: &str) -> Result<Vec<Handoff>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|h| h.status == HandoffStatus::Pending && h.to_agent == agent_id)
            .collect())
    }
}

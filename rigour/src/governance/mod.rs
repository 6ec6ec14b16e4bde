//! Governance state machines shared by the CLI and the governance gates.
//!
//! All stores are owned by one [`Governance`] value and handed out as `Arc`s,
//! so a gate and the command that mutates the same session see one cache.

pub mod agents;
pub mod checkpoint;
pub mod retry;

use std::path::Path;
use std::sync::Arc;

use crate::io::config::PolicyConfig;
use crate::io::store::SessionStore;

use agents::{AGENT_SESSION_FILE_NAME, AgentRoster, AgentSession};
use checkpoint::{CHECKPOINT_FILE_NAME, CheckpointSession, CheckpointSupervisor};
use retry::{RETRY_STATE_FILE_NAME, RetryState, RetryTracker};

#[derive(Debug, Clone)]
pub struct Governance {
    pub checkpoints: Arc<SessionStore<CheckpointSession>>,
    pub agents: Arc<SessionStore<AgentSession>>,
    pub retry: Arc<SessionStore<RetryState>>,
}

impl Default for Governance {
    fn default() -> Self {
        Self {
            checkpoints: Arc::new(SessionStore::new(CHECKPOINT_FILE_NAME)),
            agents: Arc::new(SessionStore::new(AGENT_SESSION_FILE_NAME)),
            retry: Arc::new(SessionStore::new(RETRY_STATE_FILE_NAME)),
        }
    }
}

impl Governance {
    pub fn checkpoint_supervisor(&self, config: &PolicyConfig) -> CheckpointSupervisor {
        CheckpointSupervisor::new(
            Arc::clone(&self.checkpoints),
            config.gates.checkpoint.quality_threshold,
        )
    }

    pub fn roster(&self) -> AgentRoster {
        AgentRoster::new(Arc::clone(&self.agents))
    }

    pub fn retry_tracker(&self, config: &PolicyConfig) -> RetryTracker {
        RetryTracker::new(Arc::clone(&self.retry), &config.gates.retry_loop_breaker)
    }

    /// Forget every cached session for `root`; the next reads go to disk.
    pub fn invalidate(&self, root: &Path) {
        self.checkpoints.invalidate(root);
        self.agents.invalidate(root);
        self.retry.invalidate(root);
    }
}

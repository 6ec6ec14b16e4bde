//! Agent-team roster: which agents are active and which paths each one claims.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::scope::ScopeClaim;
use crate::io::store::SessionStore;

pub const AGENT_SESSION_FILE_NAME: &str = "agent-session.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRegistration {
    pub agent_id: String,
    /// Glob patterns the agent claims ownership of.
    pub scope: Vec<String>,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub last_checkpoint_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSession {
    pub started_at: DateTime<Utc>,
    pub agents: Vec<AgentRegistration>,
}

impl AgentSession {
    pub fn claims(&self) -> Vec<ScopeClaim<'_>> {
        self.agents
            .iter()
            .map(|a| ScopeClaim {
                agent_id: &a.agent_id,
                patterns: &a.scope,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct AgentRoster {
    store: Arc<SessionStore<AgentSession>>,
}

impl AgentRoster {
    pub fn new(store: Arc<SessionStore<AgentSession>>) -> Self {
        Self { store }
    }

    pub fn session(&self, root: &Path) -> Option<AgentSession> {
        self.store.load(root)
    }

    /// Register `agent_id`, replacing any existing registration with the same id.
    #[instrument(skip_all, fields(agent = agent_id))]
    pub fn register(
        &self,
        root: &Path,
        agent_id: &str,
        scope: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<AgentSession> {
        if agent_id.trim().is_empty() {
            return Err(anyhow!("agent id must not be empty"));
        }
        for pattern in &scope {
            glob::Pattern::new(pattern).map_err(|err| anyhow!("invalid scope '{pattern}': {err}"))?;
        }
        self.store.update(root, |current| {
            let mut session = current.unwrap_or_else(|| AgentSession {
                started_at: now,
                agents: Vec::new(),
            });
            let registration = AgentRegistration {
                agent_id: agent_id.to_string(),
                scope,
                registered_at: now,
                last_checkpoint_at: None,
            };
            match session.agents.iter_mut().find(|a| a.agent_id == agent_id) {
                Some(existing) => {
                    debug!("replacing existing registration");
                    *existing = registration;
                }
                None => session.agents.push(registration),
            }
            Ok(session)
        })
    }

    /// Remove `agent_id`. Returns false if it was not registered.
    pub fn deregister(&self, root: &Path, agent_id: &str) -> Result<bool> {
        let Some(mut session) = self.store.load(root) else {
            return Ok(false);
        };
        let before = session.agents.len();
        session.agents.retain(|a| a.agent_id != agent_id);
        if session.agents.len() == before {
            return Ok(false);
        }
        self.store.save(root, &session)?;
        Ok(true)
    }

    /// Record a checkpoint timestamp for a registered agent.
    pub fn touch(&self, root: &Path, agent_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.update(root, |current| {
            let mut session = current.ok_or_else(|| anyhow!("no agent session"))?;
            let agent = session
                .agents
                .iter_mut()
                .find(|a| a.agent_id == agent_id)
                .ok_or_else(|| anyhow!("agent '{agent_id}' is not registered"))?;
            agent.last_checkpoint_at = Some(now);
            Ok(session)
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> AgentRoster {
        AgentRoster::new(Arc::new(SessionStore::new(AGENT_SESSION_FILE_NAME)))
    }

    fn scope(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn re_registering_replaces_scope() {
        let temp = tempfile::tempdir().expect("tempdir");
        let roster = roster();
        roster
            .register(temp.path(), "agent-a", scope(&["src/api/**"]), Utc::now())
            .expect("register");
        let session = roster
            .register(temp.path(), "agent-a", scope(&["src/db/**"]), Utc::now())
            .expect("register");
        assert_eq!(session.agents.len(), 1);
        assert_eq!(session.agents[0].scope, vec!["src/db/**"]);
    }

    #[test]
    fn deregister_removes_agent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let roster = roster();
        roster
            .register(temp.path(), "agent-a", scope(&["src/**"]), Utc::now())
            .expect("register");
        assert!(roster.deregister(temp.path(), "agent-a").expect("deregister"));
        assert!(!roster.deregister(temp.path(), "agent-a").expect("deregister"));
        assert!(roster.session(temp.path()).expect("session").agents.is_empty());
    }

    #[test]
    fn touch_updates_last_checkpoint() {
        let temp = tempfile::tempdir().expect("tempdir");
        let roster = roster();
        roster
            .register(temp.path(), "agent-a", scope(&["src/**"]), Utc::now())
            .expect("register");
        roster.touch(temp.path(), "agent-a", Utc::now()).expect("touch");
        let session = roster.session(temp.path()).expect("session");
        assert!(session.agents[0].last_checkpoint_at.is_some());
        assert!(roster.touch(temp.path(), "agent-b", Utc::now()).is_err());
    }

    #[test]
    fn invalid_scope_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(
            roster()
                .register(temp.path(), "agent-a", scope(&["src/[**"]), Utc::now())
                .is_err()
        );
    }
}

//! Agent-team governance: concurrency cap, scope ownership, and stale handoffs.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::instrument;

use super::{Gate, GateContext};
use crate::core::scope::scope_conflicts;
use crate::core::types::{Finding, Provenance, Severity};
use crate::governance::agents::AgentSession;
use crate::io::config::{AgentTeamConfig, TaskOwnership};
use crate::io::handoffs::{Handoff, HandoffLog, HandoffStatus};
use crate::io::store::SessionStore;

pub const GATE_ID: &str = "agent-team";

/// Roster findings: too many agents, and overlapping claims under strict ownership.
pub fn evaluate_roster(session: &AgentSession, config: &AgentTeamConfig) -> Vec<Finding> {
    let mut findings = Vec::new();
    let count = session.agents.len();
    if count > config.max_concurrent_agents {
        let ids: Vec<&str> = session.agents.iter().map(|a| a.agent_id.as_str()).collect();
        findings.push(
            Finding::new(
                "TOO_MANY_AGENTS",
                "Agent Limit Exceeded",
                format!(
                    "{count} agents registered ({}); at most {} may run concurrently",
                    ids.join(", "),
                    config.max_concurrent_agents
                ),
                Severity::High,
                Provenance::Governance,
            )
            .with_hint("Deregister idle agents with `rigour agent deregister`"),
        );
    }

    if config.task_ownership == TaskOwnership::Strict {
        for conflict in scope_conflicts(&session.claims()) {
            findings.push(
                Finding::new(
                    "TASK_SCOPE_CONFLICT",
                    "Task Scope Conflict",
                    format!(
                        "agents {} and {} both claim {}",
                        conflict.first,
                        conflict.second,
                        conflict.patterns.join(", ")
                    ),
                    Severity::High,
                    Provenance::Governance,
                )
                .with_files(conflict.patterns)
                .with_hint("Give each agent a disjoint scope or hand the task off explicitly"),
            );
        }
    }
    findings
}

/// Pending handoffs older than the configured timeout.
pub fn stale_handoffs(
    handoffs: &[Handoff],
    config: &AgentTeamConfig,
    now: DateTime<Utc>,
) -> Vec<Finding> {
    let limit_secs =
        i64::try_from(config.handoff_timeout_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
    handoffs
        .iter()
        .filter(|h| h.status == HandoffStatus::Pending)
        .filter(|h| (now - h.created_at).num_seconds() > limit_secs)
        .map(|h| {
            Finding::new(
                "STALE_HANDOFF",
                "Handoff not picked up",
                format!(
                    "handoff {} from {} to {} has been pending for {} minutes: {}",
                    h.id,
                    h.from_agent,
                    h.to_agent,
                    (now - h.created_at).num_minutes(),
                    h.task
                ),
                Severity::Medium,
                Provenance::Governance,
            )
            .with_files(h.files.clone())
            .with_hint(format!(
                "{} should accept or reject the handoff with `rigour handoff accept|reject {}`",
                h.to_agent, h.id
            ))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AgentTeamGate {
    store: Arc<SessionStore<AgentSession>>,
    config: AgentTeamConfig,
}

impl AgentTeamGate {
    pub fn new(store: Arc<SessionStore<AgentSession>>, config: &AgentTeamConfig) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }
}

impl Gate for AgentTeamGate {
    fn id(&self) -> &str {
        GATE_ID
    }

    #[instrument(skip_all, fields(gate = GATE_ID))]
    fn run(&self, ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = self
            .store
            .load(ctx.root)
            .map(|session| evaluate_roster(&session, &self.config))
            .unwrap_or_default();
        let handoffs = HandoffLog::new(ctx.root).load()?;
        findings.extend(stale_handoffs(&handoffs, &self.config, ctx.now));
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::agents::AgentRegistration;
    use chrono::Duration;

    fn session(agents: &[(&str, &str)]) -> AgentSession {
        let now = Utc::now();
        AgentSession {
            started_at: now,
            agents: agents
                .iter()
                .map(|(id, scope)| AgentRegistration {
                    agent_id: id.to_string(),
                    scope: vec![scope.to_string()],
                    registered_at: now,
                    last_checkpoint_at: None,
                })
                .collect(),
        }
    }

    #[test]
    fn overlapping_scope_conflicts_only_under_strict_ownership() {
        let roster = session(&[("a", "src/api/**"), ("b", "src/api/**")]);
        let strict = evaluate_roster(&roster, &AgentTeamConfig::default());
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].title, "Task Scope Conflict");

        let collaborative = AgentTeamConfig {
            task_ownership: TaskOwnership::Collaborative,
            ..AgentTeamConfig::default()
        };
        assert!(evaluate_roster(&roster, &collaborative).is_empty());
    }

    #[test]
    fn exceeding_cap_is_one_finding() {
        let roster = session(&[
            ("a", "a/**"),
            ("b", "b/**"),
            ("c", "c/**"),
            ("d", "d/**"),
        ]);
        let findings = evaluate_roster(&roster, &AgentTeamConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "TOO_MANY_AGENTS");
    }

    #[test]
    fn old_pending_handoffs_are_stale() {
        let now = Utc::now();
        let handoff = |id: &str, age_minutes: i64, status: HandoffStatus| Handoff {
            id: id.to_string(),
            from_agent: "a".to_string(),
            to_agent: "b".to_string(),
            task: "api".to_string(),
            files: Vec::new(),
            context: None,
            status,
            created_at: now - Duration::minutes(age_minutes),
            updated_at: now,
        };
        let handoffs = vec![
            handoff("fresh", 10, HandoffStatus::Pending),
            handoff("old", 90, HandoffStatus::Pending),
            handoff("done", 90, HandoffStatus::Accepted),
        ];
        let findings = stale_handoffs(&handoffs, &AgentTeamConfig::default(), now);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].details.contains("old"));
    }
}

//! Supervisor loop for `rigour run`.
//!
//! Each cycle runs the agent, checks the File Guard, runs the pipeline, and
//! writes the report and (on failure) the fix packet. The loop ends on the
//! first pass, a guard trip, fail-fast, or when the iteration budget is spent.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::file_guard::{GuardVerdict, evaluate_guard, newly_changed};
use crate::core::packet::{FixPacket, PacketPolicy, generate_fix_packet};
use crate::core::types::Report;
use crate::exit_codes;
use crate::io::agent::{AgentExit, AgentRunner};
use crate::io::artifacts::{write_fix_packet, write_report};
use crate::io::config::PolicyConfig;
use crate::io::git::Git;
use crate::pipeline::GatePipeline;

/// Source of tracked-change snapshots. `None` means version control is unavailable.
pub trait ChangeSnapshot {
    fn tracked_changes(&self) -> Result<Option<BTreeSet<String>>>;
}

impl ChangeSnapshot for Git {
    fn tracked_changes(&self) -> Result<Option<BTreeSet<String>>> {
        Git::tracked_changes(self)
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub max_iterations: u32,
    pub fail_fast: bool,
    pub max_files_changed_per_cycle: usize,
    pub report_path: PathBuf,
    pub packet_path: PathBuf,
    pub packet_policy: PacketPolicy,
}

impl SupervisorConfig {
    /// Settings from policy; `iterations` overrides `supervisor.max_iterations`.
    pub fn from_policy(
        config: &PolicyConfig,
        root: &Path,
        iterations: Option<u32>,
        fail_fast: bool,
    ) -> Self {
        Self {
            max_iterations: iterations.unwrap_or(config.supervisor.max_iterations).max(1),
            fail_fast,
            max_files_changed_per_cycle: config.safety.max_files_changed_per_cycle,
            report_path: config.resolve(root, &config.output.report_path),
            packet_path: config.resolve(root, &config.output.fix_packet_path),
            packet_policy: config.packet_policy(),
        }
    }
}

/// What happened in one cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// 1-indexed.
    pub iteration: u32,
    pub max_iterations: u32,
    pub agent_exit: AgentExit,
    /// Paths that became changed during this cycle, sorted.
    pub newly_changed: Vec<String>,
    /// `None` when the File Guard tripped and no gate ran.
    pub report: Option<Report>,
    pub packet: Option<FixPacket>,
    pub packet_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorStop {
    Passed,
    GuardTripped { changed: Vec<String>, max: usize },
    FailFast,
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct SupervisorOutcome {
    pub iterations: u32,
    pub stop: SupervisorStop,
    pub last_report: Option<Report>,
}

impl SupervisorOutcome {
    pub fn exit_code(&self) -> i32 {
        match self.stop {
            SupervisorStop::Passed => exit_codes::PASS,
            SupervisorStop::GuardTripped { .. }
            | SupervisorStop::FailFast
            | SupervisorStop::BudgetExhausted => exit_codes::FAIL,
        }
    }
}

/// Run agent cycles until the pipeline passes or the loop has to stop.
///
/// Errors are reserved for failures of the harness itself (spawning the
/// agent, reading git status, writing artifacts).
#[instrument(skip_all, fields(root = %root.display(), max_iterations = config.max_iterations))]
pub fn run_supervisor<A, S, F>(
    root: &Path,
    pipeline: &GatePipeline,
    agent: &A,
    snapshot: &S,
    config: &SupervisorConfig,
    mut on_cycle: F,
) -> Result<SupervisorOutcome>
where
    A: AgentRunner,
    S: ChangeSnapshot,
    F: FnMut(&CycleOutcome),
{
    let mut last_report = None;
    for iteration in 1..=config.max_iterations {
        info!(iteration, "starting cycle");
        let before = snapshot.tracked_changes()?;
        let agent_exit = agent.run_agent(root)?;
        if !agent_exit.success() {
            warn!(code = ?agent_exit.code, "agent exited unsuccessfully, verifying anyway");
        }
        let after = snapshot.tracked_changes()?;
        let newly = match (&before, &after) {
            (Some(before), Some(after)) => newly_changed(before, after),
            _ => {
                warn!("version control unavailable, file guard skipped");
                BTreeSet::new()
            }
        };

        let mut cycle = CycleOutcome {
            iteration,
            max_iterations: config.max_iterations,
            agent_exit,
            newly_changed: newly.iter().cloned().collect(),
            report: None,
            packet: None,
            packet_path: config.packet_path.clone(),
        };

        if let GuardVerdict::Tripped { changed, max } =
            evaluate_guard(&newly, config.max_files_changed_per_cycle)
        {
            warn!(changed = changed.len(), max, "file guard tripped");
            on_cycle(&cycle);
            return Ok(SupervisorOutcome {
                iterations: iteration,
                stop: SupervisorStop::GuardTripped { changed, max },
                last_report,
            });
        }

        let report = pipeline.run_cycle(root, before.as_ref());
        write_report(&config.report_path, &report)?;

        if report.is_pass() {
            cycle.report = Some(report.clone());
            on_cycle(&cycle);
            return Ok(SupervisorOutcome {
                iterations: iteration,
                stop: SupervisorStop::Passed,
                last_report: Some(report),
            });
        }

        let packet = generate_fix_packet(&report, &config.packet_policy);
        if let Some(packet) = &packet {
            write_fix_packet(&config.packet_path, packet)?;
        }
        cycle.report = Some(report.clone());
        cycle.packet = packet;
        on_cycle(&cycle);
        last_report = Some(report);

        if config.fail_fast {
            return Ok(SupervisorOutcome {
                iterations: iteration,
                stop: SupervisorStop::FailFast,
                last_report,
            });
        }
    }

    Ok(SupervisorOutcome {
        iterations: config.max_iterations,
        stop: SupervisorStop::BudgetExhausted,
        last_report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scoring::SeverityWeights;
    use crate::core::types::{Finding, Provenance, Severity};
    use crate::io::discovery::ScanFilter;
    use crate::test_support::{ScriptedAgentRunner, ScriptedSnapshot, StaticGate, changed_set};

    fn config(root: &Path, max_iterations: u32, fail_fast: bool) -> SupervisorConfig {
        SupervisorConfig {
            max_iterations,
            fail_fast,
            max_files_changed_per_cycle: 10,
            report_path: root.join("rigour-report.json"),
            packet_path: root.join("rigour-fix-packet.json"),
            packet_policy: PacketPolicy {
                protected_paths: Vec::new(),
                max_files_changed: 10,
                allowed_dependencies: None,
            },
        }
    }

    fn pipeline(findings: Vec<Finding>) -> GatePipeline {
        let mut pipeline =
            GatePipeline::new(SeverityWeights::default(), ScanFilter::default(), Vec::new());
        pipeline.register(Box::new(StaticGate::new("static", findings)));
        pipeline
    }

    fn failing() -> Vec<Finding> {
        vec![Finding::new(
            "FILE_TOO_LARGE",
            "File exceeds line limit",
            "src/big.rs has 900 lines",
            Severity::Medium,
            Provenance::Traditional,
        )]
    }

    #[test]
    fn ten_changed_files_pass_the_guard() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = ScriptedSnapshot::new(vec![Some(changed_set(0)), Some(changed_set(10))]);
        let agent = ScriptedAgentRunner::succeeding(1);
        let outcome = run_supervisor(
            temp.path(),
            &pipeline(Vec::new()),
            &agent,
            &snapshot,
            &config(temp.path(), 3, false),
            |_| {},
        )
        .expect("run");
        assert_eq!(outcome.stop, SupervisorStop::Passed);
        assert_eq!(outcome.exit_code(), exit_codes::PASS);
        assert!(temp.path().join("rigour-report.json").exists());
    }

    #[test]
    fn eleven_changed_files_trip_guard_without_running_gates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = ScriptedSnapshot::new(vec![Some(changed_set(0)), Some(changed_set(11))]);
        let agent = ScriptedAgentRunner::succeeding(1);
        let mut cycles = Vec::new();
        let outcome = run_supervisor(
            temp.path(),
            &pipeline(Vec::new()),
            &agent,
            &snapshot,
            &config(temp.path(), 3, false),
            |cycle| cycles.push(cycle.clone()),
        )
        .expect("run");
        assert!(matches!(
            outcome.stop,
            SupervisorStop::GuardTripped { max: 10, ref changed } if changed.len() == 11
        ));
        assert_eq!(outcome.exit_code(), exit_codes::FAIL);
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].report.is_none());
        assert!(!temp.path().join("rigour-report.json").exists());
    }

    #[test]
    fn failing_cycles_exhaust_budget_and_write_packet() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = ScriptedSnapshot::always(Some(changed_set(1)));
        let agent = ScriptedAgentRunner::succeeding(2);
        let mut iterations = Vec::new();
        let outcome = run_supervisor(
            temp.path(),
            &pipeline(failing()),
            &agent,
            &snapshot,
            &config(temp.path(), 2, false),
            |cycle| iterations.push(cycle.iteration),
        )
        .expect("run");
        assert_eq!(outcome.stop, SupervisorStop::BudgetExhausted);
        assert_eq!(iterations, vec![1, 2]);
        assert_eq!(agent.calls(), 2);
        assert!(temp.path().join("rigour-fix-packet.json").exists());
    }

    #[test]
    fn fail_fast_stops_after_first_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = ScriptedSnapshot::always(Some(changed_set(1)));
        let agent = ScriptedAgentRunner::succeeding(3);
        let outcome = run_supervisor(
            temp.path(),
            &pipeline(failing()),
            &agent,
            &snapshot,
            &config(temp.path(), 3, true),
            |_| {},
        )
        .expect("run");
        assert_eq!(outcome.stop, SupervisorStop::FailFast);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(agent.calls(), 1);
    }

    #[test]
    fn agent_failure_is_only_a_warning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = ScriptedSnapshot::always(None);
        let agent = ScriptedAgentRunner::new(vec![Some(2)]);
        let outcome = run_supervisor(
            temp.path(),
            &pipeline(Vec::new()),
            &agent,
            &snapshot,
            &config(temp.path(), 1, false),
            |_| {},
        )
        .expect("run");
        assert_eq!(outcome.stop, SupervisorStop::Passed);
    }
}

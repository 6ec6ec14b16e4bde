//! Gate pipeline: runs every check unit, then external commands, and scores the result.
//!
//! Units run one after another. A unit that errors is recorded as `ERROR`
//! with a synthetic finding and never stops the run.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::core::scoring::{SeverityWeights, compute_scores, histograms};
use crate::core::types::{
    Failure, Finding, GateStatus, GateSummary, GoldenRecord, Provenance, Report, Severity, Stats,
};
use crate::gates::agent_team::AgentTeamGate;
use crate::gates::checkpoint::CheckpointGate;
use crate::gates::command::{CommandGate, CommandOutcome};
use crate::gates::context_drift::ContextDriftGate;
use crate::gates::environment::{self, EnvironmentGate};
use crate::gates::file_size::FileSizeGate;
use crate::gates::protected_paths::ProtectedPathsGate;
use crate::gates::retry_breaker::RetryBreakerGate;
use crate::gates::{Gate, GateContext};
use crate::governance::Governance;
use crate::governance::retry::RetryTracker;
use crate::io::config::PolicyConfig;
use crate::io::discovery::{ScanFilter, discover_golden_record};
use crate::io::history::{ScoreEntry, ScoreHistory};

/// Rule id of the finding recorded for a unit that failed internally.
pub const GATE_INTERNAL_ERROR: &str = "GATE_INTERNAL_ERROR";

pub struct GatePipeline {
    gates: Vec<Box<dyn Gate>>,
    commands: Vec<CommandGate>,
    weights: SeverityWeights,
    filter: ScanFilter,
    source_extensions: Vec<String>,
    context_enabled: bool,
    retry: Option<RetryTracker>,
    /// Stores re-read from disk at the start of every run.
    governance: Option<Governance>,
    history: bool,
}

impl GatePipeline {
    /// Pipeline with no units, no commands, and no post-run recording.
    pub fn new(weights: SeverityWeights, filter: ScanFilter, source_extensions: Vec<String>) -> Self {
        Self {
            gates: Vec::new(),
            commands: Vec::new(),
            weights,
            filter,
            source_extensions,
            context_enabled: false,
            retry: None,
            governance: None,
            history: false,
        }
    }

    /// Build the enabled built-in units in execution order.
    ///
    /// The retry breaker goes first, the rest follow declaration order, and
    /// the environment unit is then moved to the very front.
    pub fn from_config(config: &PolicyConfig, governance: &Governance) -> Result<Self> {
        let gates_cfg = &config.gates;
        let mut pipeline = Self::new(
            gates_cfg.severity_weights.clone(),
            ScanFilter::new(&config.ignore, &config.include)?,
            gates_cfg.file_size.extensions.clone(),
        );
        pipeline.context_enabled = gates_cfg.context.enabled;
        pipeline.history = config.output.history;
        pipeline.governance = Some(governance.clone());

        if gates_cfg.retry_loop_breaker.enabled {
            pipeline.register(Box::new(RetryBreakerGate::new(
                governance.retry.clone(),
                &gates_cfg.retry_loop_breaker,
            )));
            pipeline.retry = Some(governance.retry_tracker(config));
        }
        if gates_cfg.environment.enabled {
            pipeline.register(Box::new(EnvironmentGate::new(&gates_cfg.environment)));
        }
        if gates_cfg.checkpoint.enabled {
            pipeline.register(Box::new(CheckpointGate::new(
                governance.checkpoints.clone(),
                &gates_cfg.checkpoint,
            )));
        }
        if gates_cfg.agent_team.enabled {
            pipeline.register(Box::new(AgentTeamGate::new(
                governance.agents.clone(),
                &gates_cfg.agent_team,
            )));
        }
        if gates_cfg.protected_paths.enabled {
            pipeline.register(Box::new(ProtectedPathsGate::new(
                &config.safety.protected_paths,
            )?));
        }
        if gates_cfg.file_size.enabled {
            pipeline.register(Box::new(FileSizeGate::new(gates_cfg.file_size.max_lines)));
        }
        if gates_cfg.context_drift.enabled {
            pipeline.register(Box::new(ContextDriftGate));
        }
        if let Some(index) = pipeline
            .gates
            .iter()
            .position(|g| g.id() == environment::GATE_ID)
        {
            let env_gate = pipeline.gates.remove(index);
            pipeline.gates.insert(0, env_gate);
        }

        let timeout = Duration::from_secs(config.commands.timeout_secs);
        for (name, argv) in config.commands.ordered() {
            pipeline.commands.push(CommandGate::new(
                name,
                argv,
                timeout,
                config.commands.output_limit_bytes,
            ));
        }
        debug!(gates = ?pipeline.gate_ids(), "pipeline constructed");
        Ok(pipeline)
    }

    /// Append a custom unit after the built-in ones.
    pub fn register(&mut self, gate: Box<dyn Gate>) {
        self.gates.push(gate);
    }

    pub fn gate_ids(&self) -> Vec<&str> {
        self.gates.iter().map(|g| g.id()).collect()
    }

    pub fn run(&self, root: &Path) -> Report {
        self.run_at(root, Utc::now())
    }

    pub fn run_at(&self, root: &Path, now: DateTime<Utc>) -> Report {
        self.execute(root, now, None)
    }

    /// Run for one supervisor cycle: changes already in `baseline` are not the agent's.
    pub fn run_cycle(&self, root: &Path, baseline: Option<&BTreeSet<String>>) -> Report {
        self.execute(root, Utc::now(), baseline)
    }

    #[instrument(skip_all, fields(root = %root.display(), gates = self.gates.len()))]
    fn execute(
        &self,
        root: &Path,
        now: DateTime<Utc>,
        baseline: Option<&BTreeSet<String>>,
    ) -> Report {
        let started = Instant::now();
        // `rigour checkpoint` and `rigour agent` write from other processes.
        if let Some(governance) = &self.governance {
            governance.invalidate(root);
        }
        let golden_record = self.discover(root);
        let ctx = GateContext {
            root,
            golden_record: golden_record.as_ref(),
            filter: &self.filter,
            source_extensions: &self.source_extensions,
            now,
            baseline,
        };

        let mut summary = Vec::new();
        let mut failures = Vec::new();
        for gate in &self.gates {
            let id = gate.id().to_string();
            let status = match gate.run(&ctx) {
                Ok(findings) => {
                    debug!(gate = %id, findings = findings.len(), "gate finished");
                    let status = if findings.is_empty() {
                        GateStatus::Pass
                    } else {
                        GateStatus::Fail
                    };
                    failures.extend(findings.into_iter().map(|finding| Failure {
                        gate: id.clone(),
                        finding,
                    }));
                    status
                }
                Err(err) => {
                    error!(gate = %id, error = %format!("{err:#}"), "gate errored");
                    failures.push(Failure {
                        gate: id.clone(),
                        finding: internal_error(&id, &err),
                    });
                    GateStatus::Error
                }
            };
            summary.push(GateSummary { gate: id, status });
        }

        for command in &self.commands {
            let gate = command.name().to_string();
            let status = match command.run(root) {
                CommandOutcome::Skipped => GateStatus::Skip,
                CommandOutcome::Passed => GateStatus::Pass,
                CommandOutcome::Failed(finding) => {
                    failures.push(Failure {
                        gate: gate.clone(),
                        finding,
                    });
                    GateStatus::Fail
                }
                CommandOutcome::Errored(finding) => {
                    failures.push(Failure {
                        gate: gate.clone(),
                        finding,
                    });
                    GateStatus::Error
                }
            };
            summary.push(GateSummary { gate, status });
        }

        let findings = failures.iter().map(|f| &f.finding);
        let scores = compute_scores(findings.clone(), &self.weights);
        let (severity_breakdown, provenance_breakdown) = histograms(findings);
        let report = Report {
            status: if failures.is_empty() {
                GateStatus::Pass
            } else {
                GateStatus::Fail
            },
            summary,
            failures,
            stats: Stats {
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                score: scores.score,
                ai_health_score: scores.ai_health_score,
                structural_score: scores.structural_score,
                severity_breakdown,
                provenance_breakdown,
            },
            golden_record,
        };
        info!(
            status = %report.status,
            score = report.stats.score,
            failures = report.failures.len(),
            "pipeline finished"
        );
        self.record(root, &report, now);
        report
    }

    fn discover(&self, root: &Path) -> Option<GoldenRecord> {
        if !self.context_enabled {
            return None;
        }
        match discover_golden_record(root, &self.filter, &self.source_extensions) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "golden record discovery failed");
                None
            }
        }
    }

    /// Post-run bookkeeping. Failures here never change the report.
    fn record(&self, root: &Path, report: &Report, now: DateTime<Utc>) {
        if let Some(retry) = &self.retry
            && let Err(err) = retry.record_cycle(root, report, now)
        {
            warn!(error = %format!("{err:#}"), "failed to record retry state");
        }
        if self.history
            && let Err(err) = ScoreHistory::new(root).record(&ScoreEntry::from_report(report, now))
        {
            warn!(error = %format!("{err:#}"), "failed to record score history");
        }
    }
}

fn internal_error(gate: &str, err: &anyhow::Error) -> Finding {
    Finding::new(
        GATE_INTERNAL_ERROR,
        format!("Gate '{gate}' failed internally"),
        format!("{err:#}"),
        Severity::Medium,
        Provenance::Traditional,
    )
    .with_hint("Inspect the error, fix the environment or configuration, and re-run")
}

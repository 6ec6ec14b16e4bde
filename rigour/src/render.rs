//! Human-readable summaries for `rigour check` and `rigour run`.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::Report;
use crate::supervisor::CycleOutcome;

const REPORT_TEMPLATE: &str = include_str!("templates/report_summary.txt");
const CYCLE_TEMPLATE: &str = include_str!("templates/cycle_summary.txt");

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_template("report", REPORT_TEMPLATE)?;
    env.add_template("cycle", CYCLE_TEMPLATE)?;
    Ok(env)
}

pub fn render_report_summary(report: &Report) -> Result<String> {
    let env = environment()?;
    let rendered = env.get_template("report")?.render(context! {
        status => report.status.as_str(),
        stats => &report.stats,
        summary => &report.summary,
        failures => &report.failures,
    })?;
    Ok(rendered)
}

fn headline(cycle: &CycleOutcome) -> String {
    let Some(report) = &cycle.report else {
        return format!(
            "file guard tripped, {} files changed in one cycle",
            cycle.newly_changed.len()
        );
    };
    if report.is_pass() {
        format!("PASS (score {})", report.stats.score)
    } else {
        format!(
            "FAIL (score {}, {} violations)",
            report.stats.score,
            report.failures.len()
        )
    }
}

/// One cycle: headline, the files that tripped the guard, and the numbered fix packet violations.
pub fn render_cycle_summary(cycle: &CycleOutcome) -> Result<String> {
    let env = environment()?;
    let changed: &[String] = if cycle.report.is_none() {
        cycle.newly_changed.as_slice()
    } else {
        &[]
    };
    let violations = cycle
        .packet
        .as_ref()
        .map(|packet| packet.violations.as_slice())
        .unwrap_or_default();
    let rendered = env.get_template("cycle")?.render(context! {
        iteration => cycle.iteration,
        max_iterations => cycle.max_iterations,
        headline => headline(cycle),
        changed => changed,
        violations => violations,
        packet_path => cycle.packet_path.display().to_string(),
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::{PacketPolicy, generate_fix_packet};
    use crate::core::types::{
        Failure, Finding, GateStatus, GateSummary, Provenance, ProvenanceCounts, Severity,
        SeverityCounts, Stats,
    };
    use crate::io::agent::AgentExit;
    use std::path::PathBuf;

    fn failing_report() -> Report {
        let finding = Finding::new(
            "FILE_TOO_LARGE",
            "File exceeds line limit",
            "src/big.rs has 900 lines (limit 500)",
            Severity::Medium,
            Provenance::Traditional,
        )
        .with_files(["src/big.rs"])
        .with_hint("Split src/big.rs");
        Report {
            status: GateStatus::Fail,
            summary: vec![GateSummary {
                gate: "file-size".to_string(),
                status: GateStatus::Fail,
            }],
            failures: vec![Failure {
                gate: "file-size".to_string(),
                finding,
            }],
            stats: Stats {
                score: 95,
                ai_health_score: 100,
                structural_score: 95,
                duration_ms: 4,
                severity_breakdown: SeverityCounts {
                    medium: 1,
                    ..SeverityCounts::default()
                },
                provenance_breakdown: ProvenanceCounts {
                    traditional: 1,
                    ..ProvenanceCounts::default()
                },
            },
            golden_record: None,
        }
    }

    fn cycle(report: Option<Report>, newly_changed: Vec<String>) -> CycleOutcome {
        let policy = PacketPolicy {
            protected_paths: Vec::new(),
            max_files_changed: 10,
            allowed_dependencies: None,
        };
        let packet = report.as_ref().and_then(|r| generate_fix_packet(r, &policy));
        CycleOutcome {
            iteration: 2,
            max_iterations: 3,
            agent_exit: AgentExit { code: Some(0) },
            newly_changed,
            report,
            packet,
            packet_path: PathBuf::from("rigour-fix-packet.json"),
        }
    }

    #[test]
    fn report_summary_lists_gates_and_numbered_violations() {
        let rendered = render_report_summary(&failing_report()).expect("render");
        assert!(rendered.starts_with("Rigour FAIL: score 95/100"));
        assert!(rendered.contains("FAIL file-size"));
        assert!(rendered.contains("1. [medium] File exceeds line limit (file-size): src/big.rs"));
        assert!(rendered.contains("hint: Split src/big.rs"));
    }

    #[test]
    fn failed_cycle_points_at_fix_packet() {
        let rendered =
            render_cycle_summary(&cycle(Some(failing_report()), Vec::new())).expect("render");
        assert!(rendered.starts_with("Cycle 2/3: FAIL (score 95, 1 violations)"));
        assert!(rendered.contains("1. [medium] File exceeds line limit (src/big.rs)"));
        assert!(rendered.contains("Fix packet: rigour-fix-packet.json"));
    }

    #[test]
    fn tripped_cycle_lists_changed_files() {
        let rendered =
            render_cycle_summary(&cycle(None, vec!["a.rs".to_string(), "b.rs".to_string()]))
                .expect("render");
        assert!(rendered.contains("file guard tripped, 2 files changed"));
        assert!(rendered.contains("changed: a.rs, b.rs"));
        assert!(!rendered.contains("Fix packet"));
    }
}

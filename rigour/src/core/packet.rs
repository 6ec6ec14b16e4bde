//! Fix packet generation: a failing report becomes a remediation protocol.
//!
//! The packet is derived entirely from the report and policy. It is never
//! diffed against a previous packet.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::types::{Failure, GateStatus, Report, Severity};

pub const FIX_PACKET_VERSION: u32 = 2;

/// Policy inputs copied into the packet's `constraints` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketPolicy {
    pub protected_paths: Vec<String>,
    pub max_files_changed: usize,
    /// Explicit dependency allow-list. `None` means no new dependencies.
    pub allowed_dependencies: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: String,
    pub gate: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub title: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub protected_paths: Vec<String>,
    pub max_files_changed: usize,
    pub no_new_deps: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paradigm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixPacket {
    pub version: u32,
    pub goal: String,
    pub violations: Vec<Violation>,
    pub constraints: Constraints,
}

/// Build a packet from a failing report.
///
/// Returns `None` unless `report.status` is `FAIL`. Violations are ordered by
/// descending severity; findings of equal severity keep report order.
pub fn generate_fix_packet(report: &Report, policy: &PacketPolicy) -> Option<FixPacket> {
    if report.status != GateStatus::Fail {
        return None;
    }

    let mut violations: Vec<Violation> = report.failures.iter().map(violation_from).collect();
    violations.sort_by(|a, b| b.severity.cmp(&a.severity));

    let allowed = policy.allowed_dependencies.clone().unwrap_or_default();
    let paradigm = report
        .golden_record
        .as_ref()
        .and_then(|record| record.paradigm)
        .map(|p| p.as_str().to_string());

    Some(FixPacket {
        version: FIX_PACKET_VERSION,
        goal: format!(
            "Resolve {} violation(s) so that `rigour check` passes without widening the change",
            violations.len()
        ),
        violations,
        constraints: Constraints {
            protected_paths: policy.protected_paths.clone(),
            max_files_changed: policy.max_files_changed,
            no_new_deps: policy.allowed_dependencies.is_none(),
            allowed_dependencies: allowed,
            paradigm,
        },
    })
}

fn violation_from(failure: &Failure) -> Violation {
    let finding = &failure.finding;
    let files = (!finding.files.is_empty()).then(|| finding.files.clone());

    let instructions = finding.hint.as_ref().map(|hint| {
        let mut steps = Vec::new();
        if let Some(files) = &files {
            steps.push(format!("Limit edits to: {}", files.join(", ")));
        }
        steps.push(hint.clone());
        steps.push("Re-run `rigour check` and confirm this id is gone".to_string());
        steps
    });

    let metrics = finding.line.map(|line| {
        let mut map = Map::new();
        map.insert("line".to_string(), Value::from(line));
        if let Some(end) = finding.end_line {
            map.insert("end_line".to_string(), Value::from(end));
        }
        map
    });

    Violation {
        id: finding.id.clone(),
        gate: failure.gate.clone(),
        severity: finding.severity,
        category: Some(finding.provenance.as_str().to_string()),
        title: finding.title.clone(),
        details: finding.details.clone(),
        files,
        hint: finding.hint.clone(),
        instructions,
        metrics,
    }
}

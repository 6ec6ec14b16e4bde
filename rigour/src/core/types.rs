//! Shared deterministic types for findings, reports, and project context.
//!
//! These types define the stable contract between gates, the pipeline, and
//! persisted artifacts. They carry no I/O and serialize deterministically.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a finding. Ordering is ascending (`Low < Critical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin classification of a finding. Decides which sub-score it affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Size, complexity, structure, dependency policy.
    Traditional,
    /// AI-specific code smells (hallucinated imports, duplication drift, ...).
    AiDrift,
    Security,
    /// Process rules: checkpoints, agent teams, retry loops.
    Governance,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Traditional => "traditional",
            Provenance::AiDrift => "ai-drift",
            Provenance::Security => "security",
            Provenance::Governance => "governance",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a whole report or of a single gate within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateStatus {
    Pass,
    Fail,
    Skip,
    Error,
}

impl GateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GateStatus::Pass => "PASS",
            GateStatus::Fail => "FAIL",
            GateStatus::Skip => "SKIP",
            GateStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected issue produced by a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable rule identifier (e.g. `CHECKPOINT_MISSING`).
    pub id: String,
    pub title: String,
    pub details: String,
    pub severity: Severity,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Finding {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        details: impl Into<String>,
        severity: Severity,
        provenance: Provenance,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            details: details.into(),
            severity,
            provenance,
            files: Vec::new(),
            line: None,
            end_line: None,
            hint: None,
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lines(mut self, line: u32, end_line: Option<u32>) -> Self {
        self.line = Some(line);
        self.end_line = end_line;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// A finding stamped with the gate that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub gate: String,
    #[serde(flatten)]
    pub finding: Finding,
}

/// Per-gate status in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSummary {
    pub gate: String,
    pub status: GateStatus,
}

/// Counts of findings by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// Counts of findings by provenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceCounts {
    pub traditional: usize,
    pub ai_drift: usize,
    pub security: usize,
    pub governance: usize,
}

impl ProvenanceCounts {
    pub fn add(&mut self, provenance: Provenance) {
        match provenance {
            Provenance::Traditional => self.traditional += 1,
            Provenance::AiDrift => self.ai_drift += 1,
            Provenance::Security => self.security += 1,
            Provenance::Governance => self.governance += 1,
        }
    }
}

/// Statistics block of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub duration_ms: u64,
    pub score: u32,
    pub ai_health_score: u32,
    pub structural_score: u32,
    pub severity_breakdown: SeverityCounts,
    pub provenance_breakdown: ProvenanceCounts,
}

/// Outcome of one pipeline run. Never mutated after the pipeline returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub status: GateStatus,
    pub summary: Vec<GateSummary>,
    pub failures: Vec<Failure>,
    pub stats: Stats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub golden_record: Option<GoldenRecord>,
}

impl Report {
    pub fn gate_status(&self, gate: &str) -> Option<GateStatus> {
        self.summary
            .iter()
            .find(|entry| entry.gate == gate)
            .map(|entry| entry.status)
    }

    pub fn is_pass(&self) -> bool {
        self.status == GateStatus::Pass
    }
}

/// Dominant file naming convention of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingConvention {
    SnakeCase,
    KebabCase,
    CamelCase,
    PascalCase,
}

impl NamingConvention {
    /// Classify a file stem. Single lowercase words match no convention.
    pub fn classify(stem: &str) -> Option<Self> {
        let has_upper = stem.chars().any(|c| c.is_ascii_uppercase());
        let first_upper = stem.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if stem.contains('_') && !stem.contains('-') && !has_upper {
            return Some(Self::SnakeCase);
        }
        if stem.contains('-') && !stem.contains('_') && !has_upper {
            return Some(Self::KebabCase);
        }
        if stem.contains('_') || stem.contains('-') || !has_upper {
            return None;
        }
        if first_upper {
            Some(Self::PascalCase)
        } else {
            Some(Self::CamelCase)
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NamingConvention::SnakeCase => "snake_case",
            NamingConvention::KebabCase => "kebab-case",
            NamingConvention::CamelCase => "camelCase",
            NamingConvention::PascalCase => "PascalCase",
        }
    }
}

/// Detected coding paradigm echoed back to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Paradigm {
    Functional,
    Oop,
}

impl Paradigm {
    pub fn as_str(self) -> &'static str {
        match self {
            Paradigm::Functional => "functional",
            Paradigm::Oop => "oop",
        }
    }
}

/// Project-wide anchors discovered once per pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenRecord {
    /// Environment variable names referenced in source, with reference counts.
    pub env_anchors: BTreeMap<String, usize>,
    pub naming: Option<NamingConvention>,
    pub paradigm: Option<Paradigm>,
    pub files_scanned: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_ascending() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn provenance_serializes_kebab_case() {
        let json = serde_json::to_string(&Provenance::AiDrift).expect("serialize");
        assert_eq!(json, "\"ai-drift\"");
    }

    #[test]
    fn failure_flattens_finding_fields() {
        let failure = Failure {
            gate: "file-size".to_string(),
            finding: Finding::new(
                "FILE_TOO_LARGE",
                "File too large",
                "src/big.rs has 900 lines",
                Severity::Medium,
                Provenance::Traditional,
            )
            .with_files(["src/big.rs"]),
        };
        let value = serde_json::to_value(&failure).expect("serialize");
        assert_eq!(value["gate"], "file-size");
        assert_eq!(value["id"], "FILE_TOO_LARGE");
        assert_eq!(value["files"][0], "src/big.rs");
        assert!(value.get("hint").is_none());
    }

    #[test]
    fn classifies_naming_conventions() {
        assert_eq!(
            NamingConvention::classify("user_service"),
            Some(NamingConvention::SnakeCase)
        );
        assert_eq!(
            NamingConvention::classify("user-service"),
            Some(NamingConvention::KebabCase)
        );
        assert_eq!(
            NamingConvention::classify("userService"),
            Some(NamingConvention::CamelCase)
        );
        assert_eq!(
            NamingConvention::classify("UserService"),
            Some(NamingConvention::PascalCase)
        );
        assert_eq!(NamingConvention::classify("main"), None);
    }
}

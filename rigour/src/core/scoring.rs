//! Severity-weighted scoring with provenance-isolated sub-scores.
//!
//! - `score` is deducted by every finding.
//! - `ai_health_score` is deducted only by `ai-drift` findings.
//! - `structural_score` is deducted only by `traditional` findings.
//!
//! `security` and `governance` findings affect the overall score only.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::{Finding, Provenance, ProvenanceCounts, Severity, SeverityCounts};

pub const MAX_SCORE: u32 = 100;

/// Points deducted per finding of each severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            critical: 25,
            high: 15,
            medium: 5,
            low: 2,
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// Weights must be monotonic: critical >= high >= medium >= low.
    pub fn validate(&self) -> Result<()> {
        if self.critical < self.high || self.high < self.medium || self.medium < self.low {
            return Err(anyhow!(
                "severity weights must be monotonic (critical >= high >= medium >= low), got {}/{}/{}/{}",
                self.critical,
                self.high,
                self.medium,
                self.low
            ));
        }
        Ok(())
    }
}

/// The three scores of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scores {
    pub score: u32,
    pub ai_health_score: u32,
    pub structural_score: u32,
}

/// Compute overall and sub-scores from findings, each floored at 0.
pub fn compute_scores<'a, I>(findings: I, weights: &SeverityWeights) -> Scores
where
    I: IntoIterator<Item = &'a Finding>,
{
    let mut total = 0u32;
    let mut ai_drift = 0u32;
    let mut structural = 0u32;
    for finding in findings {
        let weight = weights.weight(finding.severity);
        total = total.saturating_add(weight);
        match finding.provenance {
            Provenance::AiDrift => ai_drift = ai_drift.saturating_add(weight),
            Provenance::Traditional => structural = structural.saturating_add(weight),
            Provenance::Security | Provenance::Governance => {}
        }
    }
    Scores {
        score: MAX_SCORE.saturating_sub(total),
        ai_health_score: MAX_SCORE.saturating_sub(ai_drift),
        structural_score: MAX_SCORE.saturating_sub(structural),
    }
}

/// Severity and provenance histograms.
pub fn histograms<'a, I>(findings: I) -> (SeverityCounts, ProvenanceCounts)
where
    I: IntoIterator<Item = &'a Finding>,
{
    let mut severity = SeverityCounts::default();
    let mut provenance = ProvenanceCounts::default();
    for finding in findings {
        severity.add(finding.severity);
        provenance.add(finding.provenance);
    }
    (severity, provenance)
}

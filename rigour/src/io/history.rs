//! Append-only score history (`.rigour/score-history.jsonl`).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::drift::{TrendDirection, classify_trend, tail};
use crate::core::types::{GateStatus, ProvenanceCounts, Report, SeverityCounts};
use crate::io::store::{state_dir, write_atomic};

pub const HISTORY_FILE_NAME: &str = "score-history.jsonl";
/// Entries kept after a trim.
pub const MAX_HISTORY: usize = 100;
const TREND_WINDOW: usize = 10;
const AVERAGE_WINDOW: usize = 5;
/// Slope (points per run) separating a trend from noise.
const TREND_SLOPE_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub timestamp: DateTime<Utc>,
    pub status: GateStatus,
    pub score: u32,
    pub ai_health_score: u32,
    pub structural_score: u32,
    pub failure_count: usize,
    pub severity_breakdown: SeverityCounts,
    pub provenance_breakdown: ProvenanceCounts,
}

impl ScoreEntry {
    pub fn from_report(report: &Report, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            status: report.status,
            score: report.stats.score,
            ai_health_score: report.stats.ai_health_score,
            structural_score: report.stats.structural_score,
            failure_count: report.failures.len(),
            severity_breakdown: report.stats.severity_breakdown,
            provenance_breakdown: report.stats.provenance_breakdown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreTrend {
    pub direction: TrendDirection,
    /// `recent_average - previous_average`.
    pub delta: f64,
    pub recent_average: f64,
    pub previous_average: f64,
}

/// Score history for one project root.
#[derive(Debug, Clone)]
pub struct ScoreHistory {
    path: PathBuf,
}

impl ScoreHistory {
    pub fn new(root: &Path) -> Self {
        Self {
            path: state_dir(root).join(HISTORY_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one compact JSON line.
    #[instrument(skip_all, fields(score = entry.score))]
    pub fn append(&self, entry: &ScoreEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(entry).context("serialize score entry")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", self.path.display()))?;
        Ok(())
    }

    /// All entries, oldest first. Lines that fail to parse are skipped.
    pub fn load(&self) -> Result<Vec<ScoreEntry>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", self.path.display()));
            }
        };
        let mut entries = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!(line = index + 1, error = %err, "skipping malformed history line"),
            }
        }
        Ok(entries)
    }

    /// Keep only the most recent `max` entries. Returns the number pruned.
    pub fn trim(&self, max: usize) -> Result<usize> {
        let entries = self.load()?;
        if entries.len() <= max {
            return Ok(0);
        }
        let pruned = entries.len() - max;
        let mut buf = String::new();
        for entry in &entries[pruned..] {
            buf.push_str(&serde_json::to_string(entry).context("serialize score entry")?);
            buf.push('\n');
        }
        write_atomic(&self.path, &buf)?;
        debug!(pruned, kept = max, "score history trimmed");
        Ok(pruned)
    }

    /// Append, then trim when the file has grown past [`MAX_HISTORY`].
    pub fn record(&self, entry: &ScoreEntry) -> Result<()> {
        self.append(entry)?;
        self.trim(MAX_HISTORY)?;
        Ok(())
    }

    /// Trend over recent scores, or `None` with no history.
    pub fn trend(&self) -> Result<Option<ScoreTrend>> {
        let scores: Vec<f64> = self.load()?.iter().map(|e| f64::from(e.score)).collect();
        Ok(trend_of(&scores))
    }
}

/// Direction from the last ten scores; averages over the last five and the five before.
pub fn trend_of(scores: &[f64]) -> Option<ScoreTrend> {
    if scores.is_empty() {
        return None;
    }
    let direction = classify_trend(tail(scores, TREND_WINDOW), TREND_SLOPE_THRESHOLD);
    let recent = tail(scores, AVERAGE_WINDOW);
    let before = &scores[..scores.len() - recent.len()];
    let previous = tail(before, AVERAGE_WINDOW);
    let recent_average = average(recent);
    let previous_average = if previous.is_empty() {
        recent_average
    } else {
        average(previous)
    };
    Some(ScoreTrend {
        direction,
        delta: recent_average - previous_average,
        recent_average,
        previous_average,
    })
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: u32) -> ScoreEntry {
        ScoreEntry {
            timestamp: Utc::now(),
            status: if score == 100 {
                GateStatus::Pass
            } else {
                GateStatus::Fail
            },
            score,
            ai_health_score: 100,
            structural_score: score,
            failure_count: usize::from(score < 100),
            severity_breakdown: SeverityCounts::default(),
            provenance_breakdown: ProvenanceCounts::default(),
        }
    }

    #[test]
    fn missing_file_is_empty_history() {
        let temp = tempfile::tempdir().expect("tempdir");
        let history = ScoreHistory::new(temp.path());
        assert!(history.load().expect("load").is_empty());
        assert_eq!(history.trend().expect("trend"), None);
    }

    #[test]
    fn trim_keeps_most_recent_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let history = ScoreHistory::new(temp.path());
        for score in 0..105 {
            history.append(&entry(score)).expect("append");
        }
        assert_eq!(history.trim(MAX_HISTORY).expect("trim"), 5);
        let entries = history.load().expect("load");
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0].score, 5);
        assert_eq!(entries[99].score, 104);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let history = ScoreHistory::new(temp.path());
        history.append(&entry(90)).expect("append");
        let mut raw = fs::read_to_string(history.path()).expect("read");
        raw.push_str("{broken\n");
        fs::write(history.path(), raw).expect("write");
        history.append(&entry(80)).expect("append");
        let scores: Vec<u32> = history.load().expect("load").iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![90, 80]);
    }

    #[test]
    fn trend_compares_recent_and_previous_windows() {
        let scores = [60.0, 60.0, 60.0, 60.0, 60.0, 90.0, 90.0, 90.0, 90.0, 90.0];
        let trend = trend_of(&scores).expect("trend");
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert!((trend.delta - 30.0).abs() < 1e-9);
        assert!((trend.previous_average - 60.0).abs() < 1e-9);
    }

    #[test]
    fn short_history_is_stable_with_zero_delta() {
        let trend = trend_of(&[80.0]).expect("trend");
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.delta, 0.0);
    }
}

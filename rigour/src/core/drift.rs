//! Trend classification over short score series.
//!
//! Uses the closed-form least-squares slope of score against index.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Degrading,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Stable => "stable",
            TrendDirection::Degrading => "degrading",
        }
    }
}

/// Least-squares slope of `values` against `0..n`. Returns 0 for fewer than two points.
pub fn slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n_f;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        numerator += dx * (y - mean_y);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Classify a series: slope at or beyond `±threshold` is a trend, anything in between is stable.
pub fn classify_trend(values: &[f64], threshold: f64) -> TrendDirection {
    let threshold = threshold.abs();
    let s = slope(values);
    if s > threshold {
        TrendDirection::Improving
    } else if s < -threshold {
        TrendDirection::Degrading
    } else {
        TrendDirection::Stable
    }
}

/// Return the last `window` elements of `values` (or all of them if shorter).
pub fn tail(values: &[f64], window: usize) -> &[f64] {
    let start = values.len().saturating_sub(window);
    &values[start..]
}

//! Context drift: code that ignores the project's established conventions.
//!
//! Both checks compare against the golden record and do nothing without one.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use tracing::instrument;

use super::{Gate, GateContext};
use crate::core::types::{Finding, NamingConvention, Provenance, Severity};
use crate::io::discovery::source_files;

pub const GATE_ID: &str = "context-drift";

/// Everything before the last `_` (`DATABASE_URL` -> `DATABASE`).
fn env_stem(name: &str) -> Option<&str> {
    name.rsplit_once('_')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
}

/// `(variant, anchor)` pairs: names referenced once that share a stem with an established anchor.
pub fn env_variants(anchors: &BTreeMap<String, usize>) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    for (name, count) in anchors {
        if *count != 1 {
            continue;
        }
        let Some(stem) = env_stem(name) else {
            continue;
        };
        if let Some((anchor, _)) = anchors
            .iter()
            .find(|(other, other_count)| {
                **other_count >= 2 && *other != name && env_stem(other) == Some(stem)
            })
        {
            pairs.push((name.as_str(), anchor.as_str()));
        }
    }
    pairs
}

/// Files whose stem follows a recognizable convention other than `dominant`.
pub fn naming_outliers(files: &[String], dominant: NamingConvention) -> Vec<String> {
    files
        .iter()
        .filter(|rel| {
            Path::new(rel.as_str())
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(NamingConvention::classify)
                .is_some_and(|convention| convention != dominant)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ContextDriftGate;

impl Gate for ContextDriftGate {
    fn id(&self) -> &str {
        GATE_ID
    }

    #[instrument(skip_all, fields(gate = GATE_ID))]
    fn run(&self, ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        let Some(record) = ctx.golden_record else {
            return Ok(Vec::new());
        };
        let mut findings = Vec::new();

        if let Some(dominant) = record.naming {
            let files = source_files(ctx.root, ctx.filter, ctx.source_extensions)?;
            let outliers = naming_outliers(&files, dominant);
            if !outliers.is_empty() {
                findings.push(
                    Finding::new(
                        "NAMING_DRIFT",
                        "File naming drifts from project convention",
                        format!(
                            "{} file(s) do not follow the dominant {} convention",
                            outliers.len(),
                            dominant.as_str()
                        ),
                        Severity::Low,
                        Provenance::AiDrift,
                    )
                    .with_files(outliers)
                    .with_hint(format!("Rename these files to {}", dominant.as_str())),
                );
            }
        }

        for (variant, anchor) in env_variants(&record.env_anchors) {
            findings.push(
                Finding::new(
                    "ENV_VAR_DRIFT",
                    "Environment variable name drift",
                    format!(
                        "{variant} is referenced once and looks like a variant of the established {anchor}"
                    ),
                    Severity::Medium,
                    Provenance::AiDrift,
                )
                .with_hint(format!("Use {anchor} unless a new variable is really intended")),
            );
        }

        Ok(findings)
    }
}

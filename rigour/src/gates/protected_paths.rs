//! Protected paths: tracked changes touching protected globs are critical.
//!
//! Inside a supervisor cycle only paths changed since the cycle's baseline count.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use glob::Pattern;
use tracing::{debug, instrument};

use super::{Gate, GateContext};
use crate::core::file_guard::newly_changed;
use crate::core::types::{Finding, Provenance, Severity};
use crate::io::git::Git;

pub const GATE_ID: &str = "protected-paths";

/// Changed paths matching any protected pattern, paired with the first matching pattern.
pub fn protected_matches<'a>(
    changed: &'a BTreeSet<String>,
    patterns: &'a [Pattern],
) -> Vec<(&'a str, &'a Pattern)> {
    changed
        .iter()
        .filter_map(|path| {
            patterns
                .iter()
                .find(|p| p.matches(path))
                .map(|p| (path.as_str(), p))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ProtectedPathsGate {
    patterns: Vec<Pattern>,
}

impl ProtectedPathsGate {
    pub fn new(protected_paths: &[String]) -> Result<Self> {
        let patterns = protected_paths
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("invalid protected path glob '{p}'")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl Gate for ProtectedPathsGate {
    fn id(&self) -> &str {
        GATE_ID
    }

    #[instrument(skip_all, fields(gate = GATE_ID))]
    fn run(&self, ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        let Some(changed) = Git::new(ctx.root).tracked_changes()? else {
            debug!("not a git repository, skipping protected path check");
            return Ok(Vec::new());
        };
        let changed = match ctx.baseline {
            Some(baseline) => newly_changed(baseline, &changed),
            None => changed,
        };
        Ok(protected_matches(&changed, &self.patterns)
            .into_iter()
            .map(|(path, pattern)| {
                Finding::new(
                    "PROTECTED_PATH_MODIFIED",
                    "Protected path modified",
                    format!("{path} matches protected pattern '{}'", pattern.as_str()),
                    Severity::Critical,
                    Provenance::Security,
                )
                .with_files([path])
                .with_hint(format!("Revert changes to {path}; protected files are off limits"))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(globs: &[&str]) -> Vec<Pattern> {
        globs.iter().map(|g| Pattern::new(g).expect("glob")).collect()
    }

    #[test]
    fn matches_changed_paths_against_globs() {
        let changed: BTreeSet<String> = ["src/lib.rs", ".github/workflows/ci.yml", "rigour.toml"]
            .into_iter()
            .map(str::to_string)
            .collect();
        let globs = patterns(&[".github/**", "rigour.toml"]);
        let hits: Vec<&str> = protected_matches(&changed, &globs)
            .into_iter()
            .map(|(path, _)| path)
            .collect();
        assert_eq!(hits, vec![".github/workflows/ci.yml", "rigour.toml"]);
    }

    #[test]
    fn soft_skips_outside_git() {
        let temp = tempfile::tempdir().expect("tempdir");
        let gate = ProtectedPathsGate::new(&["**".to_string()]).expect("gate");
        let filter = crate::io::discovery::ScanFilter::default();
        let ctx = GateContext {
            root: temp.path(),
            golden_record: None,
            filter: &filter,
            source_extensions: &[],
            now: chrono::Utc::now(),
            baseline: None,
        };
        assert!(gate.run(&ctx).expect("run").is_empty());
    }

    #[test]
    fn baseline_excludes_edits_made_before_the_cycle() {
        let repo = crate::test_support::TestRepo::new().expect("repo");
        repo.write(".github/workflows/ci.yml", "on: push\n").expect("write");
        repo.commit("ci").expect("commit");
        repo.write(".github/workflows/ci.yml", "on: pull_request\n").expect("edit");

        let gate = ProtectedPathsGate::new(&[".github/**".to_string()]).expect("gate");
        let filter = crate::io::discovery::ScanFilter::default();
        let mut ctx = GateContext {
            root: repo.path(),
            golden_record: None,
            filter: &filter,
            source_extensions: &[],
            now: chrono::Utc::now(),
            baseline: None,
        };
        let whole_tree = gate.run(&ctx).expect("run");
        assert_eq!(whole_tree.len(), 1);
        assert_eq!(whole_tree[0].files, vec![".github/workflows/ci.yml"]);

        let before: BTreeSet<String> = [".github/workflows/ci.yml".to_string()].into();
        ctx.baseline = Some(&before);
        assert!(gate.run(&ctx).expect("run").is_empty());
    }
}

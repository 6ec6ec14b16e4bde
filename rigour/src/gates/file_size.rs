//! File size: source files longer than the configured line limit.

use std::fs;

use anyhow::Result;
use tracing::{debug, instrument};

use super::{Gate, GateContext};
use crate::core::types::{Finding, Provenance, Severity};
use crate::io::discovery::source_files;

pub const GATE_ID: &str = "file-size";

#[derive(Debug, Clone)]
pub struct FileSizeGate {
    max_lines: usize,
}

impl FileSizeGate {
    pub fn new(max_lines: usize) -> Self {
        Self { max_lines }
    }
}

impl Gate for FileSizeGate {
    fn id(&self) -> &str {
        GATE_ID
    }

    #[instrument(skip_all, fields(gate = GATE_ID, max_lines = self.max_lines))]
    fn run(&self, ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for rel in source_files(ctx.root, ctx.filter, ctx.source_extensions)? {
            let path = ctx.root.join(&rel);
            let Ok(text) = fs::read_to_string(&path) else {
                debug!(path = %path.display(), "skipping unreadable file");
                continue;
            };
            let lines = text.lines().count();
            if lines <= self.max_lines {
                continue;
            }
            let first_excess = u32::try_from(self.max_lines + 1).unwrap_or(u32::MAX);
            let last = u32::try_from(lines).unwrap_or(u32::MAX);
            findings.push(
                Finding::new(
                    "FILE_TOO_LARGE",
                    "File exceeds line limit",
                    format!("{rel} has {lines} lines (limit {})", self.max_lines),
                    Severity::Medium,
                    Provenance::Traditional,
                )
                .with_files([rel.clone()])
                .with_lines(first_excess, Some(last))
                .with_hint(format!(
                    "Split {rel} into smaller modules of at most {} lines",
                    self.max_lines
                )),
            );
        }
        Ok(findings)
    }
}

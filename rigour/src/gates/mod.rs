//! Check units run by the gate pipeline.
//!
//! Every unit implements [`Gate`]: a stable id plus `run(context) -> findings`.
//! Units never touch pipeline state; any persistence they read is their own.

pub mod agent_team;
pub mod checkpoint;
pub mod command;
pub mod context_drift;
pub mod environment;
pub mod file_size;
pub mod protected_paths;
pub mod retry_breaker;

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::core::types::{Finding, GoldenRecord};
use crate::io::discovery::ScanFilter;

/// Inputs shared by every unit in one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub root: &'a Path,
    /// `None` when context anchoring is disabled or discovery failed.
    pub golden_record: Option<&'a GoldenRecord>,
    /// Compiled `ignore`/`include` globs.
    pub filter: &'a ScanFilter,
    /// Extensions (without dot) treated as source files.
    pub source_extensions: &'a [String],
    pub now: DateTime<Utc>,
    /// Tracked changes present before the current supervisor cycle.
    /// `None` judges the whole working tree.
    pub baseline: Option<&'a BTreeSet<String>>,
}

pub trait Gate {
    /// Stable identifier used in report summaries (e.g. `file-size`).
    fn id(&self) -> &str;

    /// Inspect the project. Errors are caught by the pipeline.
    fn run(&self, ctx: &GateContext<'_>) -> Result<Vec<Finding>>;
}

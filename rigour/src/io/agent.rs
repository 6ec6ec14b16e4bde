//! Agent invocation for the supervisor loop.
//!
//! The [`AgentRunner`] trait decouples the loop from process spawning. Tests
//! use scripted runners that mutate the workspace without a subprocess.

use std::path::Path;

use anyhow::Result;
use tracing::{info, instrument};

use crate::io::process::run_inherited;

/// Result of one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl AgentExit {
    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

pub trait AgentRunner {
    /// Run the agent once in `workdir`. Spawn failures are errors; a non-zero exit is not.
    fn run_agent(&self, workdir: &Path) -> Result<AgentExit>;
}

/// Runs an argv with inherited stdio and no timeout.
#[derive(Debug, Clone)]
pub struct ShellAgentRunner {
    argv: Vec<String>,
}

impl ShellAgentRunner {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl AgentRunner for ShellAgentRunner {
    #[instrument(skip_all, fields(program = self.argv.first().map(String::as_str)))]
    fn run_agent(&self, workdir: &Path) -> Result<AgentExit> {
        info!(workdir = %workdir.display(), "starting agent");
        let status = run_inherited(&self.argv, workdir)?;
        Ok(AgentExit {
            code: status.code(),
        })
    }
}

//! External command checks (format, lint, typecheck, test).
//!
//! Unlike [`super::Gate`] units, a command check can be unconfigured, which
//! the pipeline records as `SKIP`.

use std::path::Path;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::core::types::{Finding, Provenance, Severity};
use crate::io::process::run_command_with_timeout;

/// Lines of command output quoted in a failure finding.
const OUTPUT_TAIL_LINES: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Skipped,
    Passed,
    /// Non-zero exit or timeout.
    Failed(Finding),
    /// The command could not be run at all.
    Errored(Finding),
}

#[derive(Debug, Clone)]
pub struct CommandGate {
    name: String,
    argv: Option<Vec<String>>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandGate {
    pub fn new(
        name: &str,
        argv: Option<&[String]>,
        timeout: Duration,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            argv: argv.map(<[String]>::to_vec),
            timeout,
            output_limit_bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn severity(&self) -> Severity {
        match self.name.as_str() {
            "test" | "typecheck" => Severity::High,
            "format" => Severity::Low,
            _ => Severity::Medium,
        }
    }

    fn rule_id(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.name.to_uppercase())
    }

    #[instrument(skip_all, fields(check = %self.name))]
    pub fn run(&self, root: &Path) -> CommandOutcome {
        let Some(argv) = &self.argv else {
            return CommandOutcome::Skipped;
        };
        let shown = argv.join(" ");
        let output =
            match run_command_with_timeout(argv, root, self.timeout, self.output_limit_bytes) {
                Ok(output) => output,
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "command check could not run");
                    return CommandOutcome::Errored(
                        Finding::new(
                            self.rule_id("ERROR"),
                            format!("{} command could not run", self.name),
                            format!("`{shown}`: {err:#}"),
                            Severity::Medium,
                            Provenance::Traditional,
                        )
                        .with_hint(format!("Check commands.{} in rigour.toml", self.name)),
                    );
                }
            };
        if output.timed_out {
            return CommandOutcome::Failed(
                Finding::new(
                    self.rule_id("TIMEOUT"),
                    format!("{} command timed out", self.name),
                    format!("`{shown}` exceeded {}s", self.timeout.as_secs()),
                    self.severity(),
                    Provenance::Traditional,
                )
                .with_hint("Make the command faster or raise commands.timeout_secs"),
            );
        }
        if output.success() {
            info!("command check passed");
            return CommandOutcome::Passed;
        }
        let code = output
            .status
            .code()
            .map_or_else(|| "a signal".to_string(), |c| format!("exit code {c}"));
        let tail = output.tail(OUTPUT_TAIL_LINES);
        let details = if tail.trim().is_empty() {
            format!("`{shown}` failed with {code}")
        } else {
            format!("`{shown}` failed with {code}:\n{tail}")
        };
        CommandOutcome::Failed(
            Finding::new(
                self.rule_id("FAILED"),
                format!("{} command failed", self.name),
                details,
                self.severity(),
                Provenance::Traditional,
            )
            .with_hint(format!("Run `{shown}` locally and fix what it reports")),
        )
    }
}

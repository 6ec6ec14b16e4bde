//! Environment alignment: required variables are set and tools match pinned versions.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, instrument};

use super::{Gate, GateContext};
use crate::core::types::{Finding, Provenance, Severity};
use crate::io::config::EnvironmentConfig;
use crate::io::process::run_command_with_timeout;

pub const GATE_ID: &str = "environment-alignment";
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const VERSION_PROBE_LIMIT: usize = 4096;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").expect("version pattern"));

/// First dotted version number in `text` (e.g. `1.82.0` from `rustc 1.82.0 (f6e511eec 2024-10-15)`).
pub fn extract_version(text: &str) -> Option<&str> {
    VERSION_RE.find(text).map(|m| m.as_str())
}

#[derive(Debug, Clone)]
pub struct EnvironmentGate {
    required_env: Vec<String>,
    tools: BTreeMap<String, String>,
}

impl EnvironmentGate {
    pub fn new(config: &EnvironmentConfig) -> Self {
        Self {
            required_env: config.required_env.clone(),
            tools: config.tools.clone(),
        }
    }

    fn check_tool(&self, ctx: &GateContext<'_>, tool: &str, prefix: &str) -> Option<Finding> {
        let argv = vec![tool.to_string(), "--version".to_string()];
        let output =
            match run_command_with_timeout(&argv, ctx.root, VERSION_PROBE_TIMEOUT, VERSION_PROBE_LIMIT)
            {
                Ok(output) if output.success() => output,
                Ok(_) | Err(_) => {
                    return Some(
                        Finding::new(
                            "TOOL_MISSING",
                            format!("Tool '{tool}' unavailable"),
                            format!("`{tool} --version` did not succeed; expected version {prefix}*"),
                            Severity::High,
                            Provenance::Traditional,
                        )
                        .with_hint(format!("Install {tool} {prefix} and make it available on PATH")),
                    );
                }
            };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let found = extract_version(&stdout).or_else(|| extract_version(&stderr));
        debug!(tool, found = ?found, expected = prefix, "tool version probed");
        match found {
            Some(version) if version.starts_with(prefix) => None,
            other => Some(
                Finding::new(
                    "TOOL_VERSION_MISMATCH",
                    format!("Tool '{tool}' version mismatch"),
                    format!(
                        "expected {tool} {prefix}*, found {}",
                        other.unwrap_or("an unrecognized version")
                    ),
                    Severity::Medium,
                    Provenance::Traditional,
                )
                .with_hint(format!("Switch to {tool} {prefix} before continuing")),
            ),
        }
    }
}

impl Gate for EnvironmentGate {
    fn id(&self) -> &str {
        GATE_ID
    }

    #[instrument(skip_all, fields(gate = GATE_ID))]
    fn run(&self, ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for name in &self.required_env {
            let set = std::env::var_os(name).is_some_and(|value| !value.is_empty());
            if !set {
                findings.push(
                    Finding::new(
                        "ENV_VAR_MISSING",
                        format!("Required environment variable {name} is not set"),
                        format!("{name} is listed in gates.environment.required_env"),
                        Severity::High,
                        Provenance::Traditional,
                    )
                    .with_hint(format!("Export {name} before running the agent")),
                );
            }
        }
        for (tool, prefix) in &self.tools {
            if let Some(finding) = self.check_tool(ctx, tool, prefix) {
                findings.push(finding);
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::discovery::ScanFilter;
    use chrono::Utc;

    fn run(gate: &EnvironmentGate) -> Vec<Finding> {
        let temp = tempfile::tempdir().expect("tempdir");
        let filter = ScanFilter::default();
        let ctx = GateContext {
            root: temp.path(),
            golden_record: None,
            filter: &filter,
            source_extensions: &[],
            now: Utc::now(),
            baseline: None,
        };
        gate.run(&ctx).expect("run")
    }

    #[test]
    fn extracts_first_dotted_version() {
        assert_eq!(
            extract_version("rustc 1.82.0 (f6e511eec 2024-10-15)"),
            Some("1.82.0")
        );
        assert_eq!(extract_version("git version 2.43.0"), Some("2.43.0"));
        assert_eq!(extract_version("no digits"), None);
    }

    #[test]
    fn missing_required_variable_is_flagged() {
        let gate = EnvironmentGate::new(&EnvironmentConfig {
            enabled: true,
            required_env: vec![
                "PATH".to_string(),
                "RIGOUR_TEST_SURELY_UNSET_VARIABLE".to_string(),
            ],
            tools: BTreeMap::new(),
        });
        let findings = run(&gate);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "ENV_VAR_MISSING");
        assert!(findings[0].title.contains("RIGOUR_TEST_SURELY_UNSET_VARIABLE"));
    }

    #[test]
    fn unavailable_tool_is_flagged() {
        let mut tools = BTreeMap::new();
        tools.insert("rigour-no-such-tool".to_string(), "1.".to_string());
        let gate = EnvironmentGate::new(&EnvironmentConfig {
            enabled: true,
            required_env: Vec::new(),
            tools,
        });
        let findings = run(&gate);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "TOOL_MISSING");
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn version_prefix_mismatch_is_flagged() {
        let mut tools = BTreeMap::new();
        tools.insert("git".to_string(), "0.0.".to_string());
        let gate = EnvironmentGate::new(&EnvironmentConfig {
            enabled: true,
            required_env: Vec::new(),
            tools,
        });
        let findings = run(&gate);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "TOOL_VERSION_MISMATCH");
    }
}

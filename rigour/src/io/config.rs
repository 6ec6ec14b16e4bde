//! Policy configuration stored in `rigour.toml` at the project root.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::packet::PacketPolicy;
use crate::core::scoring::SeverityWeights;
use crate::io::store::write_atomic;

pub const CONFIG_FILE_NAME: &str = "rigour.toml";

/// Missing or invalid policy file. Fatal before any gate runs.
#[derive(Debug)]
pub struct ConfigError {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error in {}: {}", self.path.display(), self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Policy configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values
/// written by `rigour init`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Glob patterns (relative to the project root) excluded from file scans.
    pub ignore: Vec<String>,
    /// When non-empty, only files matching one of these globs are scanned.
    pub include: Vec<String>,
    pub gates: GatesConfig,
    pub commands: CommandsConfig,
    pub safety: SafetyConfig,
    pub output: OutputConfig,
    pub supervisor: SupervisorSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatesConfig {
    pub severity_weights: SeverityWeights,
    pub context: ContextConfig,
    pub environment: EnvironmentConfig,
    pub retry_loop_breaker: RetryLoopBreakerConfig,
    pub checkpoint: CheckpointConfig,
    pub agent_team: AgentTeamConfig,
    pub protected_paths: ToggleConfig,
    pub file_size: FileSizeConfig,
    pub context_drift: ToggleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToggleConfig {
    pub enabled: bool,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContextConfig {
    /// Run golden-record discovery once per pipeline run.
    pub enabled: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub enabled: bool,
    /// Environment variables that must be set.
    pub required_env: Vec<String>,
    /// Tool name to version prefix (e.g. `rustc = "1.8"`).
    pub tools: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryLoopBreakerConfig {
    pub enabled: bool,
    /// Consecutive identical failing cycles before the breaker fires.
    pub max_repeats: u32,
    /// A score gain above this resets the repeat counter.
    pub min_score_gain: u32,
}

impl Default for RetryLoopBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_repeats: 3,
            min_score_gain: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckpointConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub quality_threshold: u32,
    pub drift_detection: bool,
    /// Least-squares slope (points per checkpoint) below which a trend is degrading.
    pub drift_slope_threshold: f64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 15,
            quality_threshold: 80,
            drift_detection: true,
            drift_slope_threshold: -3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskOwnership {
    Strict,
    Collaborative,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentTeamConfig {
    pub enabled: bool,
    pub max_concurrent_agents: usize,
    pub task_ownership: TaskOwnership,
    /// Pending handoffs older than this are flagged.
    pub handoff_timeout_minutes: u64,
}

impl Default for AgentTeamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent_agents: 3,
            task_ownership: TaskOwnership::Strict,
            handoff_timeout_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileSizeConfig {
    pub enabled: bool,
    pub max_lines: usize,
    /// File extensions (without dot) considered source files.
    pub extensions: Vec<String>,
}

impl Default for FileSizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_lines: 500,
            extensions: default_source_extensions(),
        }
    }
}

pub fn default_source_extensions() -> Vec<String> {
    ["rs", "py", "ts", "tsx", "js", "jsx", "go", "java", "kt", "rb"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// External command checks. Unset commands are recorded as `SKIP`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    pub format: Option<Vec<String>>,
    pub lint: Option<Vec<String>>,
    pub typecheck: Option<Vec<String>>,
    pub test: Option<Vec<String>>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            format: None,
            lint: None,
            typecheck: None,
            test: None,
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl CommandsConfig {
    /// Command checks in execution order.
    pub fn ordered(&self) -> [(&'static str, Option<&[String]>); 4] {
        [
            ("format", self.format.as_deref()),
            ("lint", self.lint.as_deref()),
            ("typecheck", self.typecheck.as_deref()),
            ("test", self.test.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SafetyConfig {
    pub protected_paths: Vec<String>,
    pub max_files_changed_per_cycle: usize,
    /// Explicit dependency allow-list. Unset means no new dependencies.
    pub allowed_dependencies: Option<Vec<String>>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            protected_paths: vec![".github/**".to_string(), CONFIG_FILE_NAME.to_string()],
            max_files_changed_per_cycle: 10,
            allowed_dependencies: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    pub report_path: PathBuf,
    pub fix_packet_path: PathBuf,
    /// Append a score entry to `.rigour/score-history.jsonl` after every run.
    pub history: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from("rigour-report.json"),
            fix_packet_path: PathBuf::from("rigour-fix-packet.json"),
            history: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorSection {
    pub max_iterations: u32,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self { max_iterations: 3 }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            ignore: vec![
                "target/**".to_string(),
                "node_modules/**".to_string(),
                "dist/**".to_string(),
            ],
            include: Vec::new(),
            gates: GatesConfig::default(),
            commands: CommandsConfig::default(),
            safety: SafetyConfig::default(),
            output: OutputConfig::default(),
            supervisor: SupervisorSection::default(),
        }
    }
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            severity_weights: SeverityWeights::default(),
            context: ContextConfig::default(),
            environment: EnvironmentConfig::default(),
            retry_loop_breaker: RetryLoopBreakerConfig::default(),
            checkpoint: CheckpointConfig::default(),
            agent_team: AgentTeamConfig::default(),
            protected_paths: ToggleConfig::default(),
            file_size: FileSizeConfig::default(),
            context_drift: ToggleConfig::default(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        self.gates.severity_weights.validate()?;
        if self.gates.retry_loop_breaker.max_repeats == 0 {
            return Err(anyhow!("gates.retry_loop_breaker.max_repeats must be > 0"));
        }
        let checkpoint = &self.gates.checkpoint;
        if checkpoint.interval_minutes == 0 {
            return Err(anyhow!("gates.checkpoint.interval_minutes must be > 0"));
        }
        if checkpoint.quality_threshold > 100 {
            return Err(anyhow!("gates.checkpoint.quality_threshold must be <= 100"));
        }
        if !checkpoint.drift_slope_threshold.is_finite() || checkpoint.drift_slope_threshold >= 0.0
        {
            return Err(anyhow!(
                "gates.checkpoint.drift_slope_threshold must be a negative number"
            ));
        }
        if self.gates.agent_team.max_concurrent_agents == 0 {
            return Err(anyhow!("gates.agent_team.max_concurrent_agents must be > 0"));
        }
        if self.gates.file_size.max_lines == 0 {
            return Err(anyhow!("gates.file_size.max_lines must be > 0"));
        }
        for (name, command) in self.commands.ordered() {
            if let Some(argv) = command
                && argv.first().is_none_or(|program| program.trim().is_empty())
            {
                return Err(anyhow!("commands.{name} must be a non-empty array"));
            }
        }
        if self.commands.timeout_secs == 0 {
            return Err(anyhow!("commands.timeout_secs must be > 0"));
        }
        if self.commands.output_limit_bytes == 0 {
            return Err(anyhow!("commands.output_limit_bytes must be > 0"));
        }
        if self.safety.max_files_changed_per_cycle == 0 {
            return Err(anyhow!("safety.max_files_changed_per_cycle must be > 0"));
        }
        if self.supervisor.max_iterations == 0 {
            return Err(anyhow!("supervisor.max_iterations must be > 0"));
        }
        for pattern in self.ignore.iter().chain(&self.include).chain(&self.safety.protected_paths) {
            glob::Pattern::new(pattern).with_context(|| format!("invalid glob '{pattern}'"))?;
        }
        Ok(())
    }

    pub fn packet_policy(&self) -> PacketPolicy {
        PacketPolicy {
            protected_paths: self.safety.protected_paths.clone(),
            max_files_changed: self.safety.max_files_changed_per_cycle,
            allowed_dependencies: self.safety.allowed_dependencies.clone(),
        }
    }

    /// Resolve a configured output path against the project root.
    pub fn resolve(&self, root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

/// Load and validate config from a TOML file.
///
/// A missing, unreadable, unparsable, or invalid file is a [`ConfigError`].
pub fn load_config(path: &Path) -> Result<PolicyConfig> {
    let config_error = |message: String| ConfigError {
        path: path.to_path_buf(),
        message,
    };
    if !path.exists() {
        return Err(config_error("file not found (run `rigour init`)".to_string()).into());
    }
    let contents = fs::read_to_string(path).map_err(|err| config_error(err.to_string()))?;
    let cfg: PolicyConfig =
        toml::from_str(&contents).map_err(|err| config_error(err.to_string()))?;
    cfg.validate()
        .map_err(|err| config_error(format!("{err:#}")))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PolicyConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_is_config_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_config(&temp.path().join("missing.toml")).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        let cfg = PolicyConfig::default();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "[safety]\nmax_files_changed_per_cycle = 4\n\n[commands]\ntest = [\"cargo\", \"test\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.safety.max_files_changed_per_cycle, 4);
        assert_eq!(
            cfg.commands.test,
            Some(vec!["cargo".to_string(), "test".to_string()])
        );
        assert_eq!(cfg.gates.checkpoint.quality_threshold, 80);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[commands]\nlint = []\n").expect("write");
        let err = load_config(&path).unwrap_err();
        let config_err = err.downcast_ref::<ConfigError>().expect("config error");
        assert!(config_err.message.contains("commands.lint"));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[gates\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }
}

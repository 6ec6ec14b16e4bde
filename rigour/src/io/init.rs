//! Scaffolding for `rigour init`: the policy file and the `.rigour/` state directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use super::config::{CONFIG_FILE_NAME, PolicyConfig, write_config};
use super::store::STATE_DIR;

/// Canonical paths for a project root.
#[derive(Debug, Clone)]
pub struct RigourPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    pub gitignore_path: PathBuf,
}

impl RigourPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(STATE_DIR);
        Self {
            config_path: root.join(CONFIG_FILE_NAME),
            gitignore_path: state_dir.join(".gitignore"),
            state_dir,
            root,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Overwrite an existing `rigour.toml` with defaults.
    pub force: bool,
}

/// Write the default policy and create `.rigour/`.
///
/// Fails if `rigour.toml` already exists unless `options.force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<RigourPaths> {
    let paths = RigourPaths::new(root);
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "rigour init: {CONFIG_FILE_NAME} already exists (use --force to overwrite)"
        ));
    }
    if paths.state_dir.exists() && !paths.state_dir.is_dir() {
        return Err(anyhow!("rigour init: {STATE_DIR} exists but is not a directory"));
    }

    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create directory {}", paths.state_dir.display()))?;
    fs::write(&paths.gitignore_path, STATE_GITIGNORE)
        .with_context(|| format!("write file {}", paths.gitignore_path.display()))?;
    write_config(&paths.config_path, &PolicyConfig::default())?;

    info!(root = %paths.root.display(), "project initialized");
    Ok(paths)
}

const STATE_GITIGNORE: &str = "*\n";

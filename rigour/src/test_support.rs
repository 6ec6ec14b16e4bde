//! Test-only helpers: scripted gates, agents and snapshots plus a temporary git repository.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::Finding;
use crate::gates::{Gate, GateContext};
use crate::io::agent::{AgentExit, AgentRunner};
use crate::io::git::Git;
use crate::supervisor::ChangeSnapshot;

/// Gate that always returns the same findings.
pub struct StaticGate {
    id: String,
    findings: Vec<Finding>,
}

impl StaticGate {
    pub fn new(id: &str, findings: Vec<Finding>) -> Self {
        Self {
            id: id.to_string(),
            findings,
        }
    }
}

impl Gate for StaticGate {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self, _ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        Ok(self.findings.clone())
    }
}

/// Gate whose run always errors.
pub struct FailingGate {
    id: String,
}

impl FailingGate {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl Gate for FailingGate {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self, _ctx: &GateContext<'_>) -> Result<Vec<Finding>> {
        Err(anyhow!("{} exploded", self.id))
    }
}

type AgentAction = Box<dyn Fn(&Path) -> Result<()>>;

/// Agent runner that replays scripted exit codes, optionally running an action first.
///
/// Running past the end of the script is an error.
#[derive(Default)]
pub struct ScriptedAgentRunner {
    script: RefCell<VecDeque<(Option<AgentAction>, Option<i32>)>>,
    calls: RefCell<usize>,
}

impl ScriptedAgentRunner {
    pub fn new(codes: Vec<Option<i32>>) -> Self {
        Self {
            script: RefCell::new(codes.into_iter().map(|code| (None, code)).collect()),
            calls: RefCell::new(0),
        }
    }

    /// `count` successful runs that change nothing.
    pub fn succeeding(count: usize) -> Self {
        Self::new(vec![Some(0); count])
    }

    /// Queue a run that applies `action` to the workdir and exits with `code`.
    pub fn then(self, code: i32, action: impl Fn(&Path) -> Result<()> + 'static) -> Self {
        self.script
            .borrow_mut()
            .push_back((Some(Box::new(action)), Some(code)));
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl AgentRunner for ScriptedAgentRunner {
    fn run_agent(&self, workdir: &Path) -> Result<AgentExit> {
        *self.calls.borrow_mut() += 1;
        let (action, code) = self
            .script
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted agent ran out of steps"))?;
        if let Some(action) = action {
            action(workdir)?;
        }
        Ok(AgentExit { code })
    }
}

/// Snapshot source that replays scripted change sets, repeating the last one.
pub struct ScriptedSnapshot {
    snapshots: RefCell<VecDeque<Option<BTreeSet<String>>>>,
    last: RefCell<Option<BTreeSet<String>>>,
}

impl ScriptedSnapshot {
    pub fn new(snapshots: Vec<Option<BTreeSet<String>>>) -> Self {
        Self {
            snapshots: RefCell::new(snapshots.into()),
            last: RefCell::new(None),
        }
    }

    pub fn always(snapshot: Option<BTreeSet<String>>) -> Self {
        Self::new(vec![snapshot])
    }
}

impl ChangeSnapshot for ScriptedSnapshot {
    fn tracked_changes(&self) -> Result<Option<BTreeSet<String>>> {
        if let Some(next) = self.snapshots.borrow_mut().pop_front() {
            *self.last.borrow_mut() = next;
        }
        Ok(self.last.borrow().clone())
    }
}

/// `count` distinct paths `src/file_<n>.rs`.
pub fn changed_set(count: usize) -> BTreeSet<String> {
    (0..count).map(|n| format!("src/file_{n}.rs")).collect()
}

/// Temporary git repository with one initial commit.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp repo")?;
        let repo = Self { dir };
        repo.git(&["init", "-q"])?;
        repo.git(&["config", "user.email", "rigour@example.com"])?;
        repo.git(&["config", "user.name", "Rigour Tests"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.write("README.md", "# fixture\n")?;
        repo.commit("initial")?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a file relative to the repository root, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("mkdir {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Stage everything and commit. Returns false when there was nothing to commit.
    pub fn commit(&self, message: &str) -> Result<bool> {
        let git = Git::new(self.path());
        git.add_all()?;
        git.commit_staged(message)
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

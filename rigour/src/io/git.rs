//! Git adapter for the File Guard and protected-path checks.
//!
//! Only porcelain status output is consumed, so we keep a small, explicit
//! wrapper around `git` subprocess calls.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::file_guard::{StatusEntry, tracked_changes};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// True if the workdir is inside a git work tree. A missing `git` binary counts as false.
    pub fn is_repo(&self) -> bool {
        match self.run(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => {
                output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true"
            }
            Err(_) => false,
        }
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// Tracked changed paths, or `None` when the workdir is not a git repository.
    #[instrument(skip_all)]
    pub fn tracked_changes(&self) -> Result<Option<BTreeSet<String>>> {
        if !self.is_repo() {
            debug!(workdir = %self.workdir.display(), "not a git repository");
            return Ok(None);
        }
        let entries = self.status_porcelain()?;
        let changed = tracked_changes(&entries);
        debug!(changed = changed.len(), "tracked changes");
        Ok(Some(changed))
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// Commit staged changes with a message. Returns false when nothing is staged.
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        let staged = self.run(&["diff", "--cached", "--name-only"])?;
        if String::from_utf8_lossy(&staged.stdout).trim().is_empty() {
            return Ok(false);
        }
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Parse one `XY path` porcelain line. Renames resolve to the new path.
pub fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: unquote(path.trim()),
        });
    }
    if line.len() < 4 || !line.is_char_boundary(2) || !line.is_char_boundary(3) {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry {
        code,
        path: unquote(&path),
    })
}

fn unquote(path: &str) -> String {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;

    #[test]
    fn parses_untracked_line() {
        let e = parse_status_line("?? foo.txt").expect("parse");
        assert_eq!(
            e,
            StatusEntry {
                code: "??".to_string(),
                path: "foo.txt".to_string()
            }
        );
    }

    #[test]
    fn parses_modified_line() {
        let e = parse_status_line(" M src/main.rs").expect("parse");
        assert_eq!(
            e,
            StatusEntry {
                code: " M".to_string(),
                path: "src/main.rs".to_string()
            }
        );
    }

    #[test]
    fn parses_rename_line_uses_new_path() {
        let e = parse_status_line("R  old.txt -> new.txt").expect("parse");
        assert_eq!(e.path, "new.txt");
    }

    #[test]
    fn strips_quotes_from_paths_with_spaces() {
        let e = parse_status_line(" M \"docs/my notes.md\"").expect("parse");
        assert_eq!(e.path, "docs/my notes.md");
    }

    #[test]
    fn rejects_short_lines() {
        assert!(parse_status_line("M").is_err());
    }

    #[test]
    fn non_repo_has_no_tracked_changes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path());
        assert!(!git.is_repo());
        assert_eq!(git.tracked_changes().expect("changes"), None);
    }

    #[test]
    fn tracked_changes_ignore_untracked_files() {
        let repo = TestRepo::new().expect("repo");
        repo.write("notes.txt", "new\n").expect("write");
        repo.write("README.md", "# changed\n").expect("write");
        let changed = Git::new(repo.path())
            .tracked_changes()
            .expect("status")
            .expect("inside repo");
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec!["README.md"]);

        assert!(repo.commit("update").expect("commit"));
        assert!(!repo.commit("nothing staged").expect("commit"));
    }
}

//! Snapshot stores for governance state under `.rigour/`.
//!
//! Each store owns one JSON file per project root and keeps an in-memory
//! cache keyed by that root. Writes go through temp file + rename. Concurrent
//! writers from separate processes are not coordinated; the last writer wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Directory (relative to the project root) holding governance state.
pub const STATE_DIR: &str = ".rigour";

pub fn state_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR)
}

/// Generate `<prefix>-<YYYYmmddTHHMMSS>-<6 alphanumerics>`.
pub fn new_id(prefix: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase();
    format!("{prefix}-{}-{suffix}", now.format("%Y%m%dT%H%M%S"))
}

/// Serialize `value` as pretty JSON with a trailing newline and replace `path` atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Replace `path` with `contents` via a sibling temp file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents).with_context(|| format!("write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// One persisted session document per project root.
#[derive(Debug)]
pub struct SessionStore<T> {
    file_name: &'static str,
    cache: Mutex<HashMap<PathBuf, T>>,
}

impl<T> SessionStore<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    pub fn new(file_name: &'static str) -> Self {
        Self {
            file_name,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, root: &Path) -> PathBuf {
        state_dir(root).join(self.file_name)
    }

    /// Cached value, else the file on disk. Missing or corrupt files read as `None`.
    pub fn load(&self, root: &Path) -> Option<T> {
        if let Some(value) = self.lock().get(root) {
            return Some(value.clone());
        }
        let path = self.path_for(root);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable session file, starting fresh");
                return None;
            }
        };
        match serde_json::from_str::<T>(&contents) {
            Ok(value) => {
                debug!(path = %path.display(), "session loaded from disk");
                self.lock().insert(root.to_path_buf(), value.clone());
                Some(value)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt session file, starting fresh");
                None
            }
        }
    }

    /// Persist `value` and refresh the cache.
    pub fn save(&self, root: &Path, value: &T) -> Result<()> {
        let path = self.path_for(root);
        write_json_atomic(&path, value).with_context(|| format!("save {}", path.display()))?;
        self.lock().insert(root.to_path_buf(), value.clone());
        Ok(())
    }

    /// Load, transform, and save in one read-modify-write.
    pub fn update<F>(&self, root: &Path, apply: F) -> Result<T>
    where
        F: FnOnce(Option<T>) -> Result<T>,
    {
        let next = apply(self.load(root))?;
        self.save(root, &next)?;
        Ok(next)
    }

    /// Delete the file and forget the cached value.
    pub fn remove(&self, root: &Path) -> Result<()> {
        self.invalidate(root);
        let path = self.path_for(root);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
        }
    }

    /// Drop the cached value for one project; the next load re-reads disk.
    pub fn invalidate(&self, root: &Path) {
        self.lock().remove(root);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, T>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

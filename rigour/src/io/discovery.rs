//! Project scanning: file walking with ignore/include globs and golden record discovery.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use glob::Pattern;
use regex::Regex;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::core::types::{GoldenRecord, NamingConvention, Paradigm};

/// Directories never descended into, regardless of configuration.
const SKIPPED_DIRS: [&str; 4] = [".git", ".rigour", "target", "node_modules"];

static ENV_ACCESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:env::var(?:_os)?\(|env!\(|os\.getenv\(|os\.environ\.get\(|os\.environ\[|System\.getenv\(|os\.Getenv\(|ENV\[|ENV\.fetch\(|process\.env\[)\s*["']([A-Z][A-Z0-9_]*)["']|process\.env\.([A-Z][A-Z0-9_]*)"#,
    )
    .expect("env access pattern")
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?(?:pub(?:\(crate\))?\s+)?(?:abstract\s+)?(?:class|impl)\b")
        .expect("class pattern")
});

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?:export\s+)?(?:pub(?:\(crate\))?\s+)?(?:async\s+)?(?:fn|def|function|func)\s+\w+",
    )
    .expect("function pattern")
});

/// Compiled ignore/include globs, matched against `/`-separated relative paths.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    ignore: Vec<Pattern>,
    include: Vec<Pattern>,
}

impl ScanFilter {
    pub fn new(ignore: &[String], include: &[String]) -> Result<Self> {
        Ok(Self {
            ignore: compile(ignore)?,
            include: compile(include)?,
        })
    }

    pub fn allows(&self, rel_path: &str) -> bool {
        if self.ignore.iter().any(|p| p.matches(rel_path)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| p.matches(rel_path))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("invalid glob '{p}'")))
        .collect()
}

/// Relative paths of all files under `root` accepted by `filter`, sorted.
pub fn walk_files(root: &Path, filter: &ScanFilter) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        e.depth() == 0
            || !(e.file_type().is_dir()
                && e.file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
    }) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("strip prefix {}", entry.path().display()))?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if filter.allows(&rel) {
            files.push(rel);
        }
    }
    files.sort();
    Ok(files)
}

/// Files whose extension is one of `extensions`.
pub fn source_files(root: &Path, filter: &ScanFilter, extensions: &[String]) -> Result<Vec<String>> {
    Ok(walk_files(root, filter)?
        .into_iter()
        .filter(|rel| {
            Path::new(rel)
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|e| e == ext))
        })
        .collect())
}

/// Environment variable names referenced in `text`, in order of appearance.
pub fn env_references(text: &str) -> Vec<String> {
    ENV_ACCESS_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Walk the project once and build its golden record.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn discover_golden_record(
    root: &Path,
    filter: &ScanFilter,
    extensions: &[String],
) -> Result<GoldenRecord> {
    let files = source_files(root, filter, extensions)?;
    let mut env_anchors: BTreeMap<String, usize> = BTreeMap::new();
    let mut naming_counts: BTreeMap<NamingConvention, usize> = BTreeMap::new();
    let mut classes = 0usize;
    let mut functions = 0usize;

    for rel in &files {
        if let Some(convention) = Path::new(rel)
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(NamingConvention::classify)
        {
            *naming_counts.entry(convention).or_default() += 1;
        }
        let path = root.join(rel);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping non-text file");
                continue;
            }
        };
        for name in env_references(&text) {
            *env_anchors.entry(name).or_default() += 1;
        }
        classes += CLASS_RE.find_iter(&text).count();
        functions += FUNCTION_RE.find_iter(&text).count();
    }

    let record = GoldenRecord {
        env_anchors,
        naming: dominant(&naming_counts),
        paradigm: paradigm_of(classes, functions),
        files_scanned: files.len(),
    };
    debug!(
        files = record.files_scanned,
        anchors = record.env_anchors.len(),
        naming = ?record.naming,
        paradigm = ?record.paradigm,
        "golden record discovered"
    );
    Ok(record)
}

/// Strict plurality winner; ties yield `None`.
fn dominant(counts: &BTreeMap<NamingConvention, usize>) -> Option<NamingConvention> {
    let max = counts.values().copied().max()?;
    let mut winners = counts.iter().filter(|(_, count)| **count == max);
    let (winner, _) = winners.next()?;
    if winners.next().is_some() {
        return None;
    }
    Some(*winner)
}

fn paradigm_of(classes: usize, functions: usize) -> Option<Paradigm> {
    match (classes, functions) {
        (0, 0) => None,
        (c, f) if c > f => Some(Paradigm::Oop),
        _ => Some(Paradigm::Functional),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, contents).expect("write");
    }

    fn rust_only() -> Vec<String> {
        vec!["rs".to_string(), "py".to_string()]
    }

    #[test]
    fn filter_applies_ignore_then_include() {
        let filter = ScanFilter::new(
            &["target/**".to_string()],
            &["src/**".to_string()],
        )
        .expect("filter");
        assert!(filter.allows("src/main.rs"));
        assert!(!filter.allows("target/debug/build.rs"));
        assert!(!filter.allows("docs/readme.md"));
    }

    #[test]
    fn walk_skips_state_and_vcs_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(temp.path(), "src/lib.rs", "");
        write(temp.path(), ".git/config", "");
        write(temp.path(), ".rigour/retry-state.json", "{}");
        write(temp.path(), "node_modules/pkg/index.js", "");
        let files = walk_files(temp.path(), &ScanFilter::default()).expect("walk");
        assert_eq!(files, vec!["src/lib.rs"]);
    }

    #[test]
    fn env_references_cover_common_access_patterns() {
        let text = r#"
            let url = std::env::var("DATABASE_URL");
            key = os.environ["API_KEY"]
            const port = process.env.PORT;
            const host = process.env['HOST'];
        "#;
        assert_eq!(
            env_references(text),
            vec!["DATABASE_URL", "API_KEY", "PORT", "HOST"]
        );
    }

    #[test]
    fn discovers_anchors_naming_and_paradigm() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(
            temp.path(),
            "src/user_service.rs",
            "pub fn load() {\n    std::env::var(\"DATABASE_URL\");\n}\nfn helper() {}\n",
        );
        write(
            temp.path(),
            "src/order_repo.rs",
            "fn save() {\n    std::env::var(\"DATABASE_URL\");\n}\n",
        );
        write(temp.path(), "src/lib.rs", "pub mod user_service;\n");
        write(temp.path(), "README.md", "env::var(\"IGNORED\")");

        let record = discover_golden_record(temp.path(), &ScanFilter::default(), &rust_only())
            .expect("discover");
        assert_eq!(record.files_scanned, 3);
        assert_eq!(record.env_anchors.get("DATABASE_URL"), Some(&2));
        assert!(!record.env_anchors.contains_key("IGNORED"));
        assert_eq!(record.naming, Some(NamingConvention::SnakeCase));
        assert_eq!(record.paradigm, Some(Paradigm::Functional));
    }

    #[test]
    fn class_heavy_code_is_oop() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(
            temp.path(),
            "app/models.py",
            "class User:\n    def name(self):\n        pass\n\nclass Order:\n    pass\n",
        );
        let record = discover_golden_record(temp.path(), &ScanFilter::default(), &rust_only())
            .expect("discover");
        assert_eq!(record.paradigm, Some(Paradigm::Oop));
    }

    #[test]
    fn naming_ties_have_no_dominant_convention() {
        let mut counts = BTreeMap::new();
        counts.insert(NamingConvention::SnakeCase, 2);
        counts.insert(NamingConvention::CamelCase, 2);
        assert_eq!(dominant(&counts), None);
        counts.insert(NamingConvention::SnakeCase, 3);
        assert_eq!(dominant(&counts), Some(NamingConvention::SnakeCase));
    }
}

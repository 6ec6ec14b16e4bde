//! Deterministic classification of version-control changes for the File Guard.

use std::collections::BTreeSet;

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Outcome of the per-cycle file budget check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Within { changed: usize },
    Tripped { changed: Vec<String>, max: usize },
}

/// True if a status code counts as a tracked change (`M`, `A`, `D`, or `R`).
///
/// Untracked (`??`) entries never count, so newly created files do not trip the guard.
pub fn is_changed_code(code: &str) -> bool {
    if code == "??" {
        return false;
    }
    code.chars().any(|c| matches!(c, 'M' | 'A' | 'D' | 'R'))
}

/// Collect the set of tracked changed paths from status entries.
pub fn tracked_changes(entries: &[StatusEntry]) -> BTreeSet<String> {
    entries
        .iter()
        .filter(|entry| is_changed_code(&entry.code))
        .map(|entry| entry.path.clone())
        .collect()
}

/// Paths changed after the cycle that were not already changed before it.
pub fn newly_changed(before: &BTreeSet<String>, after: &BTreeSet<String>) -> BTreeSet<String> {
    after.difference(before).cloned().collect()
}

/// Trip when strictly more than `max` paths changed in one cycle.
pub fn evaluate_guard(newly: &BTreeSet<String>, max: usize) -> GuardVerdict {
    if newly.len() > max {
        return GuardVerdict::Tripped {
            changed: newly.iter().cloned().collect(),
            max,
        };
    }
    GuardVerdict::Within {
        changed: newly.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, path: &str) -> StatusEntry {
        StatusEntry {
            code: code.to_string(),
            path: path.to_string(),
        }
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn untracked_is_not_a_change() {
        assert!(!is_changed_code("??"));
        assert!(!is_changed_code("!!"));
    }

    #[test]
    fn modified_added_deleted_renamed_are_changes() {
        for code in [" M", "M ", "MM", "A ", " D", "R ", "AM"] {
            assert!(is_changed_code(code), "expected {code:?} to count");
        }
    }

    #[test]
    fn tracked_changes_excludes_untracked() {
        let entries = vec![
            entry(" M", "src/lib.rs"),
            entry("??", "docs/NEW.md"),
            entry("R ", "src/new_name.rs"),
        ];
        assert_eq!(
            tracked_changes(&entries),
            set(&["src/lib.rs", "src/new_name.rs"])
        );
    }

    #[test]
    fn newly_changed_is_set_difference() {
        let before = set(&["a.rs", "b.rs"]);
        let after = set(&["a.rs", "b.rs", "c.rs"]);
        assert_eq!(newly_changed(&before, &after), set(&["c.rs"]));
    }

    #[test]
    fn guard_allows_exactly_max() {
        let newly: BTreeSet<String> = (0..10).map(|i| format!("f{i}.rs")).collect();
        assert_eq!(
            evaluate_guard(&newly, 10),
            GuardVerdict::Within { changed: 10 }
        );
    }

    #[test]
    fn guard_trips_above_max() {
        let newly: BTreeSet<String> = (0..11).map(|i| format!("f{i:02}.rs")).collect();
        match evaluate_guard(&newly, 10) {
            GuardVerdict::Tripped { changed, max } => {
                assert_eq!(changed.len(), 11);
                assert_eq!(max, 10);
            }
            other => panic!("expected trip, got {other:?}"),
        }
    }
}

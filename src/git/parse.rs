//! Git output parsing.

use chrono::{DateTime, FixedOffset};

/// Working-tree state parsed from `git status --porcelain=v1 -z`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
    pub conflicts: Vec<String>,
}

impl WorkingTreeStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.modified.is_empty()
            && self.untracked.is_empty()
            && self.conflicts.is_empty()
    }

    /// Files the index or working tree touches (not untracked). Used by
    /// autostash planning to predict stash-pop overlap.
    pub fn dirty_tracked_files(&self) -> Vec<&str> {
        self.staged
            .iter()
            .chain(self.modified.iter())
            .chain(self.conflicts.iter())
            .map(String::as_str)
            .collect()
    }
}

const CONFLICT_PAIRS: [&str; 7] = ["DD", "AU", "UD", "UA", "DU", "AA", "UU"];

/// Parse NUL-delimited `git status --porcelain=v1 -z` output.
///
/// Entry format is `XY <path>`, with rename/copy entries (`X` in `{R,C}`)
/// followed by a second NUL-separated token holding the original path.
/// One file can land in both the staged and modified buckets (`MM`).
pub fn parse_porcelain_z(output: &str) -> WorkingTreeStatus {
    let mut status = WorkingTreeStatus::default();
    let mut tokens = output.split('\0');

    while let Some(entry) = tokens.next() {
        if entry.len() < 3 {
            continue;
        }
        let x = entry.as_bytes()[0] as char;
        let y = entry.as_bytes()[1] as char;
        let xy = &entry[..2];
        let path = entry[3..].to_string();

        // Renames and copies carry the source path as the next token.
        if x == 'R' || x == 'C' {
            let _ = tokens.next();
        }

        if xy == "??" {
            status.untracked.push(path);
            continue;
        }
        if CONFLICT_PAIRS.contains(&xy) {
            status.conflicts.push(path);
            continue;
        }
        if matches!(x, 'M' | 'A' | 'D' | 'R' | 'C') {
            status.staged.push(path.clone());
        }
        if matches!(y, 'M' | 'D') {
            status.modified.push(path);
        }
    }

    status
}

/// Parse `git rev-list --left-right --count <left>...<right>` output
/// (`"<left>\t<right>"`) into `(left, right)`.
pub fn parse_left_right(output: &str) -> Option<(u64, u64)> {
    let mut parts = output.split_whitespace();
    let left = parts.next()?.parse().ok()?;
    let right = parts.next()?.parse().ok()?;
    Some((left, right))
}

/// Parse a `%cI` (strict ISO 8601) commit timestamp.
pub fn parse_commit_timestamp(output: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(output.trim()).ok()
}

/// Extract a pull-request number from a squash-merge commit subject.
///
/// Forge squash merges conventionally end the subject with `(#N)`.
pub fn parse_pr_number(subject: &str) -> Option<u64> {
    let trimmed = subject.trim_end();
    let open = trimmed.rfind("(#")?;
    let rest = &trimmed[open + 2..];
    let close = rest.find(')')?;
    if close + 1 != rest.len() {
        return None;
    }
    rest[..close].parse().ok()
}

/// Parse `git remote` output into remote names.
pub fn parse_remote_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Extract the default branch from `git remote show <remote>` output
/// (the `HEAD branch: <name>` line). Returns `None` for `(unknown)`.
pub fn parse_remote_show_head(output: &str) -> Option<String> {
    for line in output.lines() {
        if let Some(rest) = line.trim().strip_prefix("HEAD branch:") {
            let name = rest.trim();
            if name.is_empty() || name == "(unknown)" {
                return None;
            }
            return Some(name.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porcelain_empty_output() {
        let status = parse_porcelain_z("");
        assert!(status.is_clean());
    }

    #[test]
    fn porcelain_categorises_basic_entries() {
        let raw = "M  staged.rs\0 M modified.rs\0?? new.rs\0UU conflicted.rs\0";
        let status = parse_porcelain_z(raw);
        assert_eq!(status.staged, vec!["staged.rs"]);
        assert_eq!(status.modified, vec!["modified.rs"]);
        assert_eq!(status.untracked, vec!["new.rs"]);
        assert_eq!(status.conflicts, vec!["conflicted.rs"]);
    }

    #[test]
    fn porcelain_mm_counts_both_buckets() {
        // Staged then modified again: shows up in both categories.
        let status = parse_porcelain_z("MM both.rs\0");
        assert_eq!(status.staged, vec!["both.rs"]);
        assert_eq!(status.modified, vec!["both.rs"]);
    }

    #[test]
    fn porcelain_rename_consumes_source_path() {
        // Rename entries carry "new\0old"; the old path must not be
        // misread as a separate entry.
        let raw = "R  new-name.rs\0old-name.rs\0?? other.rs\0";
        let status = parse_porcelain_z(raw);
        assert_eq!(status.staged, vec!["new-name.rs"]);
        assert_eq!(status.untracked, vec!["other.rs"]);
    }

    #[rstest::rstest]
    #[case("DD")]
    #[case("AU")]
    #[case("UD")]
    #[case("UA")]
    #[case("DU")]
    #[case("AA")]
    #[case("UU")]
    fn porcelain_conflict_pairs(#[case] xy: &str) {
        let raw = format!("{xy} f\0");
        let status = parse_porcelain_z(&raw);
        assert_eq!(status.conflicts.len(), 1, "pair {xy}");
        assert!(status.staged.is_empty(), "pair {xy}");
        assert!(status.modified.is_empty(), "pair {xy}");
    }

    #[test]
    fn porcelain_deleted_unstaged() {
        let status = parse_porcelain_z(" D gone.rs\0");
        assert_eq!(status.modified, vec!["gone.rs"]);
        assert!(status.staged.is_empty());
    }

    #[test]
    fn left_right_parses_tab_separated() {
        assert_eq!(parse_left_right("3\t7\n"), Some((3, 7)));
        assert_eq!(parse_left_right("0\t0"), Some((0, 0)));
        assert_eq!(parse_left_right(""), None);
        assert_eq!(parse_left_right("garbage"), None);
    }

    #[test]
    fn commit_timestamp_roundtrips() {
        let ts = parse_commit_timestamp("2026-03-01T12:30:00+02:00\n").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-01T12:30:00+02:00");
        assert!(parse_commit_timestamp("not a date").is_none());
    }

    #[test]
    fn pr_number_from_squash_subject() {
        assert_eq!(parse_pr_number("Add login flow (#482)"), Some(482));
        assert_eq!(parse_pr_number("Add login flow (#482) and more"), None);
        assert_eq!(parse_pr_number("No marker here"), None);
        assert_eq!(parse_pr_number("Nested (see #12) (#34)"), Some(34));
    }

    #[test]
    fn remote_show_head_branch() {
        let output = "* remote upstream\n  Fetch URL: x\n  HEAD branch: main\n";
        assert_eq!(parse_remote_show_head(output), Some("main".into()));
        assert_eq!(
            parse_remote_show_head("  HEAD branch: (unknown)\n"),
            None
        );
    }
}

//! Read-only git plumbing helpers.
//!
//! Thin named wrappers over [`git`](super::git). Every helper tolerates
//! failure by returning `Option`/`bool`/empty collections, so the status
//! gatherer can always complete all five sections.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

use super::{GitOutput, git, git_with_stdin, parse};

/// Whether `name` resolves to a commit.
pub fn ref_exists(dir: &Path, name: &str) -> bool {
    git(
        dir,
        &["rev-parse", "--verify", "--quiet", &format!("{name}^{{commit}}")],
    )
    .success()
}

/// Whether a local branch of this name exists.
pub fn local_branch_exists(dir: &Path, branch: &str) -> bool {
    git(
        dir,
        &["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")],
    )
    .success()
}

/// Current branch, or `None` when detached.
pub fn current_branch(dir: &Path) -> Option<String> {
    let out = git(dir, &["branch", "--show-current"]);
    if !out.success() || out.out().is_empty() {
        None
    } else {
        Some(out.out().to_string())
    }
}

pub fn head_sha(dir: &Path) -> Option<String> {
    let out = git(dir, &["rev-parse", "HEAD"]);
    out.success().then(|| out.out().to_string())
}

pub fn short_sha(dir: &Path, rev: &str) -> Option<String> {
    let out = git(dir, &["rev-parse", "--short", rev]);
    out.success().then(|| out.out().to_string())
}

/// `git merge-base --is-ancestor <ancestor> <descendant>`.
pub fn is_ancestor(dir: &Path, ancestor: &str, descendant: &str) -> bool {
    git(dir, &["merge-base", "--is-ancestor", ancestor, descendant]).success()
}

pub fn merge_base(dir: &Path, a: &str, b: &str) -> Option<String> {
    let out = git(dir, &["merge-base", a, b]);
    out.success().then(|| out.out().to_string())
}

/// `(left, right)` of `git rev-list --left-right --count <left>...<right>`.
pub fn left_right_count(dir: &Path, left: &str, right: &str) -> Option<(u64, u64)> {
    let out = git(
        dir,
        &["rev-list", "--left-right", "--count", &format!("{left}...{right}")],
    );
    if !out.success() {
        return None;
    }
    parse::parse_left_right(&out.stdout)
}

/// Commits reachable from `range` (e.g. `"base..HEAD"`), newest first.
pub fn rev_list(dir: &Path, range: &str) -> Vec<String> {
    let out = git(dir, &["rev-list", range]);
    if !out.success() {
        return Vec::new();
    }
    out.stdout.lines().map(String::from).collect()
}

pub fn count_commits(dir: &Path, range: &str) -> Option<u64> {
    let out = git(dir, &["rev-list", "--count", range]);
    if !out.success() {
        return None;
    }
    out.out().parse().ok()
}

/// Remote names configured on this repo.
pub fn remote_names(dir: &Path) -> Vec<String> {
    let out = git(dir, &["remote"]);
    if !out.success() {
        return Vec::new();
    }
    parse::parse_remote_names(&out.stdout)
}

/// A `git config` value, `None` when unset.
pub fn config_get(dir: &Path, key: &str) -> Option<String> {
    let out = git(dir, &["config", "--get", key]);
    (out.success() && !out.out().is_empty()).then(|| out.out().to_string())
}

pub fn remote_url(dir: &Path, remote: &str) -> Option<String> {
    config_get(dir, &format!("remote.{remote}.url"))
}

/// Default branch of `remote`, via the `refs/remotes/<remote>/HEAD` symref,
/// falling back to `git remote show` (which hits the network) when the
/// symref was never set.
pub fn default_branch(dir: &Path, remote: &str) -> Option<String> {
    let symref = git(
        dir,
        &["symbolic-ref", &format!("refs/remotes/{remote}/HEAD")],
    );
    if symref.success() {
        let prefix = format!("refs/remotes/{remote}/");
        if let Some(branch) = symref.out().strip_prefix(&prefix) {
            return Some(branch.to_string());
        }
    }
    let show = git(dir, &["remote", "show", remote]);
    if show.success() {
        return parse::parse_remote_show_head(&show.stdout);
    }
    None
}

/// Tracking ref of the current branch (`origin/feat`), or `None` when no
/// upstream is configured *or the configured upstream ref is missing*
/// (the "gone" case; callers distinguish it via branch config).
pub fn upstream_ref(dir: &Path) -> Option<String> {
    let out = git(
        dir,
        &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{upstream}"],
    );
    (out.success() && !out.out().is_empty()).then(|| out.out().to_string())
}

/// Committer timestamp of a rev, strict ISO 8601.
pub fn commit_time(dir: &Path, rev: &str) -> Option<DateTime<FixedOffset>> {
    let out = git(dir, &["log", "-1", "--format=%cI", rev]);
    if !out.success() {
        return None;
    }
    parse::parse_commit_timestamp(&out.stdout)
}

pub fn commit_subject(dir: &Path, rev: &str) -> Option<String> {
    let out = git(dir, &["log", "-1", "--format=%s", rev]);
    out.success().then(|| out.out().to_string())
}

/// The worktree-private git dir (`.git/worktrees/<name>` for linked trees).
pub fn git_dir(dir: &Path) -> Option<PathBuf> {
    resolve_git_path(dir, &git(dir, &["rev-parse", "--git-dir"]))
}

/// The shared git dir (the canonical repo's `.git`).
pub fn git_common_dir(dir: &Path) -> Option<PathBuf> {
    resolve_git_path(dir, &git(dir, &["rev-parse", "--git-common-dir"]))
}

fn resolve_git_path(dir: &Path, out: &GitOutput) -> Option<PathBuf> {
    if !out.success() {
        return None;
    }
    let path = PathBuf::from(out.out());
    let absolute = if path.is_relative() {
        dir.join(path)
    } else {
        path
    };
    // Canonicalize to resolve symlinks (e.g. /var -> /private/var on macOS)
    dunce::canonicalize(&absolute).ok()
}

/// Shallow-clone probe: a `shallow` file in the common dir.
pub fn is_shallow(dir: &Path) -> bool {
    git_common_dir(dir).is_some_and(|d| d.join("shallow").exists())
}

/// File paths changed across `range` (e.g. `"HEAD..origin/main"`).
pub fn changed_files(dir: &Path, range: &str) -> Vec<String> {
    let out = git(dir, &["diff", "--name-only", range]);
    if !out.success() {
        return Vec::new();
    }
    out.stdout
        .lines()
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// Patch ids
// ============================================================================

fn patch_id_of_diff(dir: &Path, diff: &str) -> Option<String> {
    if diff.trim().is_empty() {
        return None;
    }
    let out = git_with_stdin(dir, &["patch-id", "--stable"], diff);
    if !out.success() {
        return None;
    }
    out.out()
        .split_whitespace()
        .next()
        .map(String::from)
}

/// Stable patch-id of a single commit's diff.
pub fn commit_patch_id(dir: &Path, rev: &str) -> Option<String> {
    let diff = git(dir, &["diff-tree", "--patch", "--unified=3", rev]);
    if !diff.success() {
        return None;
    }
    patch_id_of_diff(dir, &diff.stdout)
}

/// Stable patch-id of the cumulative diff `from..to`.
///
/// This is what a squash merge of the whole range would produce as a single
/// commit, making it comparable against per-commit patch-ids on the target.
pub fn range_patch_id(dir: &Path, from: &str, to: &str) -> Option<String> {
    let diff = git(dir, &["diff", "--unified=3", from, to]);
    if !diff.success() {
        return None;
    }
    patch_id_of_diff(dir, &diff.stdout)
}

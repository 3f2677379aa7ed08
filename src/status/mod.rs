//! Per-repo status: the five-section `RepoStatus` record and its gatherer.
//!
//! The gatherer completes every section even when individual git calls
//! fail: a broken repo degrades to defaults (`null` base, zero counts)
//! instead of preventing the rest of the workspace from rendering.

use std::path::Path;

use chrono::{DateTime, FixedOffset};
use schemars::JsonSchema;
use serde::Serialize;

use crate::cache::QueryCache;
use crate::git::{git, parse, queries};
use crate::remotes::RepoRemotes;

pub mod filter;
pub mod flags;
pub mod merge_detect;

pub use flags::{RepoFlags, would_lose_work};

/// What kind of checkout a repo worktree is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorktreeKind {
    /// A standalone clone (`.git` is a directory).
    Full,
    /// A linked worktree (`.git` is a file pointing at the canonical repo).
    Linked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HeadMode {
    Attached { branch: String },
    Detached,
}

impl HeadMode {
    pub fn branch(&self) -> Option<&str> {
        match self {
            HeadMode::Attached { branch } => Some(branch),
            HeadMode::Detached => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub worktree_kind: WorktreeKind,
    pub head: HeadMode,
    pub shallow: bool,
}

/// Working-tree counts from porcelain status. File lists per category are
/// kept alongside for verbose output and autostash planning but stay out
/// of the JSON shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct LocalStatus {
    pub staged: u64,
    pub modified: u64,
    pub untracked: u64,
    pub conflicts: u64,
    #[serde(skip)]
    #[schemars(skip)]
    pub files: parse::WorkingTreeStatus,
}

impl LocalStatus {
    pub fn from_files(files: parse::WorkingTreeStatus) -> Self {
        LocalStatus {
            staged: files.staged.len() as u64,
            modified: files.modified.len() as u64,
            untracked: files.untracked.len() as u64,
            conflicts: files.conflicts.len() as u64,
            files,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.staged > 0 || self.modified > 0 || self.untracked > 0 || self.conflicts > 0
    }

    /// Dirty in a way `git stash push` would pick up by default.
    pub fn dirty_tracked(&self) -> bool {
        self.staged > 0 || self.modified > 0 || self.conflicts > 0
    }
}

/// How a branch was merged into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MergeKind {
    Merge,
    Squash,
}

/// Divergence from the integration target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BaseStatus {
    /// The base remote, `None` for local-only repos (base is a local
    /// branch).
    pub remote: Option<String>,
    /// The resolved base ref, e.g. `upstream/main` or a local `main`.
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub ahead: u64,
    pub behind: u64,
    pub merged_into_base: Option<MergeKind>,
    /// For stacked workspaces: the configured base itself was merged into
    /// the repo's default branch (time to retarget).
    pub base_merged_into_default: Option<MergeKind>,
    /// The `base` config value, when it resolved.
    pub configured_ref: Option<String>,
    /// PR number sniffed from the squash commit subject.
    pub detected_pr: Option<u64>,
    /// The target commit carrying the squashed branch.
    pub merge_commit: Option<String>,
    /// Local commits made after the detected merge point.
    pub new_commits_after_merge: Option<u64>,
}

/// Tracking-branch mode of the share remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RefMode {
    /// Never pushed; no remote branch of this name.
    NoRef,
    /// No upstream configured, but the share remote has a same-named
    /// branch.
    Implicit,
    /// An upstream is configured and its ref exists.
    Configured,
    /// An upstream was configured but the remote branch is gone.
    Gone,
}

/// Divergence from the share remote's copy of the branch. Counts are
/// `None` when not computed (noRef / gone), preserving the difference
/// between "known zero" and "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareStatus {
    pub remote: String,
    /// The tracking ref compared against, for modes that have one.
    #[serde(rename = "ref")]
    pub ref_name: Option<String>,
    pub ref_mode: RefMode,
    pub to_push: Option<u64>,
    pub to_pull: Option<u64>,
    /// Commit pairs on both sides carrying the same patch-id ("you rebased
    /// locally" rather than genuine divergence).
    pub rebased: u64,
}

/// An in-progress git operation, detected from the worktree's git dir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Operation {
    Rebase,
    Merge,
    CherryPick,
    Revert,
    Bisect,
    Am,
}

/// The central per-repo record: identity, local working tree, base
/// divergence, share divergence, in-progress operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepoStatus {
    pub name: String,
    pub identity: Identity,
    pub local: LocalStatus,
    pub base: Option<BaseStatus>,
    pub share: Option<ShareStatus>,
    pub operation: Option<Operation>,
    pub last_commit: Option<DateTime<FixedOffset>>,
}

impl RepoStatus {
    pub fn branch(&self) -> Option<&str> {
        self.identity.head.branch()
    }
}

/// Inputs to one status gather.
pub struct GatherParams<'a> {
    pub name: &'a str,
    pub worktree_dir: &'a Path,
    /// Configured base branch from `.arbws/config`, if any.
    pub config_base: Option<&'a str>,
    /// Resolved remote roles; `None` = local-only repo.
    pub remotes: Option<&'a RepoRemotes>,
    pub cache: &'a QueryCache,
}

/// Gather a full `RepoStatus`. Infallible by design: every git failure
/// downgrades its field.
pub fn gather_status(params: &GatherParams<'_>) -> RepoStatus {
    let dir = params.worktree_dir;

    let identity = gather_identity(dir);
    let operation = detect_operation(dir);
    let local = gather_local(dir);
    let share = gather_share(dir, &identity, params.remotes);
    let base = gather_base(params, &identity, share.as_ref());
    let last_commit = queries::commit_time(dir, "HEAD");

    RepoStatus {
        name: params.name.to_string(),
        identity,
        local,
        base,
        share,
        operation,
        last_commit,
    }
}

fn gather_identity(dir: &Path) -> Identity {
    // Linked worktrees have a `.git` *file* pointing at the canonical
    // repo's worktrees dir.
    let dotgit = dir.join(".git");
    let worktree_kind = if dotgit.is_file() {
        WorktreeKind::Linked
    } else {
        WorktreeKind::Full
    };

    let head = match queries::current_branch(dir) {
        Some(branch) => HeadMode::Attached { branch },
        None => HeadMode::Detached,
    };

    Identity {
        worktree_kind,
        head,
        shallow: queries::is_shallow(dir),
    }
}

/// Probe order is significant and mutually exclusive: the first marker
/// found names the operation.
fn detect_operation(dir: &Path) -> Option<Operation> {
    let git_dir = queries::git_dir(dir)?;
    if git_dir.join("rebase-merge").exists() {
        return Some(Operation::Rebase);
    }
    if git_dir.join("rebase-apply").exists() {
        // `git am` and the legacy rebase backend share the directory; the
        // `applying` marker distinguishes them.
        if git_dir.join("rebase-apply/applying").exists() {
            return Some(Operation::Am);
        }
        return Some(Operation::Rebase);
    }
    if git_dir.join("MERGE_HEAD").exists() {
        return Some(Operation::Merge);
    }
    if git_dir.join("CHERRY_PICK_HEAD").exists() {
        return Some(Operation::CherryPick);
    }
    if git_dir.join("REVERT_HEAD").exists() {
        return Some(Operation::Revert);
    }
    if git_dir.join("BISECT_LOG").exists() {
        return Some(Operation::Bisect);
    }
    None
}

fn gather_local(dir: &Path) -> LocalStatus {
    let out = git(dir, &["status", "--porcelain=v1", "-z"]);
    if !out.success() {
        return LocalStatus::default();
    }
    LocalStatus::from_files(parse::parse_porcelain_z(&out.stdout))
}

fn gather_share(
    dir: &Path,
    identity: &Identity,
    remotes: Option<&RepoRemotes>,
) -> Option<ShareStatus> {
    let remotes = remotes?;
    let branch = identity.head.branch()?;
    let share_remote = remotes.share.clone();

    let (ref_mode, ref_name) = if let Some(upstream) = queries::upstream_ref(dir) {
        (RefMode::Configured, Some(upstream))
    } else {
        let implicit = format!("{share_remote}/{branch}");
        if queries::ref_exists(dir, &implicit) {
            (RefMode::Implicit, Some(implicit))
        } else if queries::config_get(dir, &format!("branch.{branch}.remote")).is_some() {
            // Tracking was configured but the remote branch is gone
            // (deleted after merge, pruned by fetch).
            (RefMode::Gone, None)
        } else {
            (RefMode::NoRef, None)
        }
    };

    let (to_pull, to_push) = match &ref_name {
        Some(ref_name) => match queries::left_right_count(dir, ref_name, "HEAD") {
            Some((pull, push)) => (Some(pull), Some(push)),
            None => (None, None),
        },
        None => (None, None),
    };

    let rebased = match (&ref_name, to_push, to_pull) {
        (Some(ref_name), Some(push), Some(pull)) if push > 0 && pull > 0 => {
            merge_detect::rebased_count(
                dir,
                &format!("{ref_name}..HEAD"),
                &format!("HEAD..{ref_name}"),
            )
        }
        _ => 0,
    };

    Some(ShareStatus {
        remote: share_remote,
        ref_name,
        ref_mode,
        to_push,
        to_pull,
        rebased,
    })
}

fn gather_base(
    params: &GatherParams<'_>,
    identity: &Identity,
    share: Option<&ShareStatus>,
) -> Option<BaseStatus> {
    let dir = params.worktree_dir;
    let base_remote = params.remotes.map(|r| r.base.clone());

    let (ref_name, configured_ref) = resolve_base_ref(params, base_remote.as_deref())?;

    let (behind, ahead) = queries::left_right_count(dir, &ref_name, "HEAD").unwrap_or((0, 0));

    let mut status = BaseStatus {
        remote: base_remote.clone(),
        ref_name: ref_name.clone(),
        ahead,
        behind,
        merged_into_base: None,
        base_merged_into_default: None,
        configured_ref: configured_ref.clone(),
        detected_pr: None,
        merge_commit: None,
        new_commits_after_merge: None,
    };

    // Merge detection only matters when there is divergence and a branch.
    let attached = identity.head.branch().is_some();
    if (ahead > 0 || behind > 0) && attached {
        if let Some(found) = merge_detect::detect_merge(dir, "HEAD", &ref_name) {
            status.merged_into_base = Some(found.kind);
        } else if squash_scan_worthwhile(share)
            && let Some(found) = merge_detect::detect_squash(dir, "HEAD", &ref_name)
        {
            status.merged_into_base = Some(found.kind);
            status.merge_commit = found.merge_commit;
            status.new_commits_after_merge = found.new_commits_after_merge;
            status.detected_pr = found.detected_pr;
        }
    }

    // Stacked base: has the configured base itself been merged into the
    // repo's true default? Skipped when the two refs coincide (the answer
    // would be tautologically yes).
    if let (Some(configured), Some(remote)) = (&configured_ref, &base_remote) {
        let true_default = params.cache.default_branch(dir, remote);
        if let Some(default) = true_default
            && default != *configured
        {
            let base_ref = format!("{remote}/{configured}");
            let default_ref = format!("{remote}/{default}");
            if let Some(found) = merge_detect::detect_merge(dir, &base_ref, &default_ref) {
                status.base_merged_into_default = Some(found.kind);
            } else if let Some(found) = merge_detect::detect_squash(dir, &base_ref, &default_ref) {
                status.base_merged_into_default = Some(found.kind);
            }
        }
    }

    Some(status)
}

/// The cumulative-patch-id scan is O(window) git calls; only run it when
/// the answer is likely to matter: the share branch is gone (deleted
/// after merge) or exactly in sync (nothing else explains the divergence).
fn squash_scan_worthwhile(share: Option<&ShareStatus>) -> bool {
    match share {
        Some(share) => {
            share.ref_mode == RefMode::Gone
                || (share.to_push == Some(0) && share.to_pull == Some(0))
        }
        // Local-only repos have no cheaper signal; scan.
        None => true,
    }
}

fn resolve_base_ref(
    params: &GatherParams<'_>,
    base_remote: Option<&str>,
) -> Option<(String, Option<String>)> {
    let dir = params.worktree_dir;

    if let Some(config_base) = params.config_base {
        match base_remote {
            Some(remote) => {
                let candidate = format!("{remote}/{config_base}");
                if queries::ref_exists(dir, &candidate) {
                    return Some((candidate, Some(config_base.to_string())));
                }
            }
            None => {
                if queries::local_branch_exists(dir, config_base) {
                    return Some((config_base.to_string(), Some(config_base.to_string())));
                }
            }
        }
        // A configured base that doesn't resolve falls through to the
        // default branch rather than erroring; status must still render.
    }

    match base_remote {
        Some(remote) => {
            let default = params.cache.default_branch(dir, remote)?;
            Some((format!("{remote}/{default}"), None))
        }
        // Local repos fall back to whichever conventional default exists.
        None => ["main", "master"]
            .into_iter()
            .find(|b| queries::local_branch_exists(dir, b))
            .map(|b| (b.to_string(), None)),
    }
}

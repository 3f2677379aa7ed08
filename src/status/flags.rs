//! Derived boolean flags over `RepoStatus`.
//!
//! A flat record computed purely from the status plus the workspace's
//! expected branch. The filter language and all classification tables
//! consume these rather than re-deriving conditions.

use schemars::JsonSchema;
use serde::Serialize;

use super::{HeadMode, RefMode, RepoStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepoFlags {
    pub is_dirty: bool,
    pub is_unpushed: bool,
    pub needs_pull: bool,
    pub needs_rebase: bool,
    pub is_diverged: bool,
    pub is_drifted: bool,
    pub is_detached: bool,
    pub has_operation: bool,
    pub is_local: bool,
    pub is_gone: bool,
    pub is_shallow: bool,
    pub is_merged: bool,
    pub is_base_merged: bool,
}

impl RepoFlags {
    pub fn derive(status: &RepoStatus, expected_branch: &str) -> Self {
        let share = status.share.as_ref();
        let base = status.base.as_ref();

        let is_detached = matches!(status.identity.head, HeadMode::Detached);
        let is_drifted = match &status.identity.head {
            HeadMode::Attached { branch } => branch != expected_branch,
            HeadMode::Detached => false,
        };

        // A branch that was never pushed but has commits over base is
        // unpushed work just as much as a positive toPush count.
        let is_unpushed = share.is_some_and(|s| {
            s.to_push.unwrap_or(0) > 0
                || (s.ref_mode == RefMode::NoRef && base.map(|b| b.ahead).unwrap_or(0) > 0)
        });

        RepoFlags {
            is_dirty: status.local.is_dirty(),
            is_unpushed,
            needs_pull: share.is_some_and(|s| s.to_pull.unwrap_or(0) > 0),
            needs_rebase: base.is_some_and(|b| b.behind > 0),
            is_diverged: base.is_some_and(|b| b.ahead > 0 && b.behind > 0),
            is_drifted,
            is_detached,
            has_operation: status.operation.is_some(),
            is_local: share.is_none(),
            is_gone: share.is_some_and(|s| s.ref_mode == RefMode::Gone),
            is_shallow: status.identity.shallow,
            is_merged: base.is_some_and(|b| b.merged_into_base.is_some()),
            is_base_merged: base.is_some_and(|b| b.base_merged_into_default.is_some()),
        }
    }

    /// The invariant gate-keeping destructive commands: deleting this repo
    /// would lose something.
    pub fn would_lose_work(&self) -> bool {
        self.is_dirty
            || self.is_unpushed
            || self.is_detached
            || self.is_drifted
            || self.has_operation
    }

    /// Wants a user action before the workspace is safely disposable or
    /// mergeable.
    pub fn needs_attention(&self) -> bool {
        self.would_lose_work() || self.needs_pull || self.needs_rebase || self.is_gone
    }
}

/// Convenience wrapper used by `would_lose_work` call sites that hold a
/// status rather than flags.
pub fn would_lose_work(status: &RepoStatus, expected_branch: &str) -> bool {
    RepoFlags::derive(status, expected_branch).would_lose_work()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::git::parse::WorkingTreeStatus;
    use crate::status::{
        BaseStatus, HeadMode, Identity, LocalStatus, RefMode, RepoStatus, ShareStatus,
        WorktreeKind,
    };

    /// A clean, attached, fully-synced linked worktree to mutate in tests.
    pub fn baseline(branch: &str) -> RepoStatus {
        RepoStatus {
            name: "api".into(),
            identity: Identity {
                worktree_kind: WorktreeKind::Linked,
                head: HeadMode::Attached {
                    branch: branch.into(),
                },
                shallow: false,
            },
            local: LocalStatus::default(),
            base: Some(BaseStatus {
                remote: Some("origin".into()),
                ref_name: "origin/main".into(),
                ahead: 0,
                behind: 0,
                merged_into_base: None,
                base_merged_into_default: None,
                configured_ref: None,
                detected_pr: None,
                merge_commit: None,
                new_commits_after_merge: None,
            }),
            share: Some(ShareStatus {
                remote: "origin".into(),
                ref_name: Some(format!("origin/{branch}")),
                ref_mode: RefMode::Configured,
                to_push: Some(0),
                to_pull: Some(0),
                rebased: 0,
            }),
            operation: None,
            last_commit: None,
        }
    }

    pub fn dirty(mut status: RepoStatus) -> RepoStatus {
        status.local = LocalStatus::from_files(WorkingTreeStatus {
            modified: vec!["src/lib.rs".into()],
            ..Default::default()
        });
        status
    }
}

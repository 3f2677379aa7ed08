//! Push / pull classification against the share remote.
//!
//! Pure functions over `RepoStatus`; the command handlers turn the actions
//! into plan rows and git invocations.

use std::path::Path;

use crate::git::queries;
use crate::status::{MergeKind, RefMode, RepoStatus};

use super::Outcome;

/// What `arb push` decided for one repo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushAction {
    Skip(String),
    UpToDate,
    Push {
        /// The remote branch existed before and was deleted; pushing
        /// recreates it.
        recreate: bool,
        /// First push of this branch (`-u` sets upstream either way).
        new_branch: bool,
        force: bool,
    },
}

impl PushAction {
    pub fn to_outcome(&self) -> Outcome {
        match self {
            PushAction::Skip(reason) => Outcome::skip(reason.clone()),
            PushAction::UpToDate => Outcome::UpToDate,
            PushAction::Push { force: true, .. } => Outcome::will("force-push"),
            PushAction::Push {
                new_branch: true, ..
            } => Outcome::will("push (new branch)"),
            PushAction::Push { recreate: true, .. } => Outcome::will("push (recreate)"),
            PushAction::Push { .. } => Outcome::will("push"),
        }
    }
}

/// Classify one repo for `arb push`.
pub fn classify_push(
    status: &RepoStatus,
    expected_branch: &str,
    force: bool,
    fetch_failed: bool,
) -> PushAction {
    if fetch_failed {
        return PushAction::Skip("fetch failed".into());
    }
    let Some(share) = &status.share else {
        return PushAction::Skip("local-only repo".into());
    };
    let Some(branch) = status.branch() else {
        return PushAction::Skip("detached HEAD".into());
    };
    if branch != expected_branch {
        return PushAction::Skip(format!("on branch {branch} (drifted)"));
    }

    match share.ref_mode {
        RefMode::Gone => {
            return PushAction::Push {
                recreate: true,
                new_branch: false,
                force: false,
            };
        }
        RefMode::NoRef => {
            let ahead = status.base.as_ref().map(|b| b.ahead).unwrap_or(0);
            if ahead == 0 {
                return PushAction::Skip("no commits to push".into());
            }
            return PushAction::Push {
                recreate: false,
                new_branch: true,
                force: false,
            };
        }
        RefMode::Configured | RefMode::Implicit => {}
    }

    let (Some(to_push), Some(to_pull)) = (share.to_push, share.to_pull) else {
        return PushAction::Skip("cannot compute divergence".into());
    };

    match (to_push, to_pull) {
        (0, 0) => PushAction::UpToDate,
        (0, _) => PushAction::Skip("behind share (pull first)".into()),
        (_, 0) => PushAction::Push {
            recreate: false,
            new_branch: false,
            force: false,
        },
        (_, _) if force => PushAction::Push {
            recreate: false,
            new_branch: false,
            force: true,
        },
        (_, _) => PushAction::Skip(format!(
            "diverged from {} (use --force)",
            share.remote
        )),
    }
}

/// How a pull integrates remote commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    Rebase,
    Merge,
}

impl PullMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullMode::Rebase => "rebase",
            PullMode::Merge => "merge",
        }
    }
}

/// Resolve the pull mode: explicit flag, then `branch.<name>.rebase`,
/// then `pull.rebase`, else merge.
pub fn resolve_pull_mode(
    dir: &Path,
    branch: &str,
    rebase_flag: bool,
    merge_flag: bool,
) -> PullMode {
    if rebase_flag {
        return PullMode::Rebase;
    }
    if merge_flag {
        return PullMode::Merge;
    }
    let configured = queries::config_get(dir, &format!("branch.{branch}.rebase"))
        .or_else(|| queries::config_get(dir, "pull.rebase"));
    match configured.as_deref() {
        // "merges" and "interactive" are rebase flavours.
        Some("true") | Some("merges") | Some("interactive") => PullMode::Rebase,
        _ => PullMode::Merge,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullAction {
    Skip(String),
    UpToDate,
    Pull { mode: PullMode },
}

impl PullAction {
    pub fn to_outcome(&self) -> Outcome {
        match self {
            PullAction::Skip(reason) => Outcome::skip(reason.clone()),
            PullAction::UpToDate => Outcome::UpToDate,
            PullAction::Pull { mode } => Outcome::will(format!("pull ({})", mode.as_str())),
        }
    }
}

/// Classify one repo for `arb pull`.
pub fn classify_pull(
    status: &RepoStatus,
    expected_branch: &str,
    mode: PullMode,
    fetch_failed: bool,
) -> PullAction {
    if fetch_failed {
        return PullAction::Skip("fetch failed".into());
    }
    let Some(share) = &status.share else {
        return PullAction::Skip("local-only repo".into());
    };
    let Some(branch) = status.branch() else {
        return PullAction::Skip("detached HEAD".into());
    };
    if branch != expected_branch {
        return PullAction::Skip(format!("on branch {branch} (drifted)"));
    }

    match share.ref_mode {
        RefMode::NoRef => return PullAction::Skip("never pushed".into()),
        RefMode::Gone => return PullAction::Skip("remote branch gone".into()),
        RefMode::Configured | RefMode::Implicit => {}
    }

    if let Some(base) = &status.base {
        if base.merged_into_base == Some(MergeKind::Merge)
            || base.merged_into_base == Some(MergeKind::Squash)
        {
            return PullAction::Skip("already merged into base".into());
        }
        if base.base_merged_into_default.is_some() {
            return PullAction::Skip("base merged into default (retarget first)".into());
        }
    }

    let to_pull = share.to_pull.unwrap_or(0);
    if to_pull == 0 {
        return PullAction::UpToDate;
    }

    // All remote-only commits are rebase-equivalents of local work: the
    // branch was rewritten locally, pulling would duplicate commits.
    if share.to_push.unwrap_or(0) > 0 && share.rebased >= to_pull {
        return PullAction::Skip("rebased locally (push --force instead)".into());
    }

    PullAction::Pull { mode }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::flags::test_support::{baseline, dirty};
    use crate::status::{HeadMode, RefMode};

    fn with_share(
        to_push: Option<u64>,
        to_pull: Option<u64>,
        ref_mode: RefMode,
    ) -> RepoStatus {
        let mut status = baseline("feat");
        {
            let share = status.share.as_mut().unwrap();
            share.to_push = to_push;
            share.to_pull = to_pull;
            share.ref_mode = ref_mode;
            if matches!(ref_mode, RefMode::NoRef | RefMode::Gone) {
                share.ref_name = None;
            }
        }
        status
    }

    #[test]
    fn push_up_to_date() {
        let status = with_share(Some(0), Some(0), RefMode::Configured);
        assert_eq!(
            classify_push(&status, "feat", false, false),
            PushAction::UpToDate
        );
    }

    #[test]
    fn push_simple_ahead() {
        let status = with_share(Some(2), Some(0), RefMode::Configured);
        assert_eq!(
            classify_push(&status, "feat", false, false),
            PushAction::Push {
                recreate: false,
                new_branch: false,
                force: false
            }
        );
    }

    #[test]
    fn push_behind_says_pull_first() {
        let status = with_share(Some(0), Some(3), RefMode::Configured);
        assert!(matches!(
            classify_push(&status, "feat", false, false),
            PushAction::Skip(reason) if reason.contains("pull first")
        ));
    }

    #[test]
    fn push_diverged_needs_force() {
        let status = with_share(Some(3), Some(3), RefMode::Configured);
        assert!(matches!(
            classify_push(&status, "feat", false, false),
            PushAction::Skip(reason) if reason.contains("--force")
        ));
        assert_eq!(
            classify_push(&status, "feat", true, false),
            PushAction::Push {
                recreate: false,
                new_branch: false,
                force: true
            }
        );
    }

    #[test]
    fn push_gone_recreates() {
        let status = with_share(None, None, RefMode::Gone);
        assert_eq!(
            classify_push(&status, "feat", false, false),
            PushAction::Push {
                recreate: true,
                new_branch: false,
                force: false
            }
        );
    }

    #[test]
    fn push_noref_depends_on_base_ahead() {
        let mut status = with_share(None, None, RefMode::NoRef);
        assert!(matches!(
            classify_push(&status, "feat", false, false),
            PushAction::Skip(reason) if reason.contains("no commits")
        ));
        status.base.as_mut().unwrap().ahead = 2;
        assert_eq!(
            classify_push(&status, "feat", false, false),
            PushAction::Push {
                recreate: false,
                new_branch: true,
                force: false
            }
        );
    }

    #[test]
    fn push_skips_detached_drifted_local_and_failed_fetch() {
        let mut detached = baseline("feat");
        detached.identity.head = HeadMode::Detached;
        assert!(matches!(
            classify_push(&detached, "feat", false, false),
            PushAction::Skip(_)
        ));

        let drifted = baseline("other");
        assert!(matches!(
            classify_push(&drifted, "feat", false, false),
            PushAction::Skip(reason) if reason.contains("drifted")
        ));

        let mut local = baseline("feat");
        local.share = None;
        assert!(matches!(
            classify_push(&local, "feat", false, false),
            PushAction::Skip(reason) if reason.contains("local")
        ));

        assert!(matches!(
            classify_push(&baseline("feat"), "feat", false, true),
            PushAction::Skip(reason) if reason.contains("fetch")
        ));
    }

    #[test]
    fn push_twice_is_idempotent() {
        // After a successful push the remote matches HEAD: second run
        // classifies up-to-date.
        let after = with_share(Some(0), Some(0), RefMode::Configured);
        assert_eq!(
            classify_push(&after, "feat", false, false),
            PushAction::UpToDate
        );
    }

    #[test]
    fn pull_up_to_date_and_simple() {
        let status = with_share(Some(0), Some(0), RefMode::Configured);
        assert_eq!(
            classify_pull(&status, "feat", PullMode::Merge, false),
            PullAction::UpToDate
        );

        let status = with_share(Some(0), Some(2), RefMode::Configured);
        assert_eq!(
            classify_pull(&status, "feat", PullMode::Rebase, false),
            PullAction::Pull {
                mode: PullMode::Rebase
            }
        );
    }

    #[test]
    fn pull_skips_noref_and_gone() {
        let noref = with_share(None, None, RefMode::NoRef);
        assert!(matches!(
            classify_pull(&noref, "feat", PullMode::Merge, false),
            PullAction::Skip(_)
        ));
        let gone = with_share(None, None, RefMode::Gone);
        assert!(matches!(
            classify_pull(&gone, "feat", PullMode::Merge, false),
            PullAction::Skip(reason) if reason.contains("gone")
        ));
    }

    #[test]
    fn pull_rebased_locally_hints_force_push() {
        let mut status = with_share(Some(3), Some(3), RefMode::Configured);
        status.share.as_mut().unwrap().rebased = 3;
        assert!(matches!(
            classify_pull(&status, "feat", PullMode::Merge, false),
            PullAction::Skip(reason) if reason.contains("push --force")
        ));
    }

    #[test]
    fn pull_genuine_divergence_still_pulls() {
        let mut status = with_share(Some(2), Some(3), RefMode::Configured);
        status.share.as_mut().unwrap().rebased = 1;
        assert_eq!(
            classify_pull(&status, "feat", PullMode::Merge, false),
            PullAction::Pull {
                mode: PullMode::Merge
            }
        );
    }

    #[test]
    fn pull_skips_merged_and_base_merged() {
        use crate::status::MergeKind;
        let mut merged = with_share(Some(0), Some(2), RefMode::Configured);
        merged.base.as_mut().unwrap().merged_into_base = Some(MergeKind::Squash);
        assert!(matches!(
            classify_pull(&merged, "feat", PullMode::Merge, false),
            PullAction::Skip(reason) if reason.contains("merged into base")
        ));

        let mut stacked = with_share(Some(0), Some(2), RefMode::Configured);
        stacked.base.as_mut().unwrap().base_merged_into_default = Some(MergeKind::Merge);
        assert!(matches!(
            classify_pull(&stacked, "feat", PullMode::Merge, false),
            PullAction::Skip(reason) if reason.contains("retarget")
        ));
    }

    #[test]
    fn dirty_does_not_block_push() {
        let status = dirty(with_share(Some(1), Some(0), RefMode::Configured));
        assert!(matches!(
            classify_push(&status, "feat", false, false),
            PushAction::Push { .. }
        ));
    }
}

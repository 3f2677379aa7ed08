//! Conflict prediction and autostash planning.
//!
//! Predictions run before execution so the plan can mark rows that will
//! conflict. Everything here is advisory: a failed prediction downgrades
//! to `None` and the operation proceeds.

use std::path::Path;

use crate::git::{git, queries};
use crate::status::LocalStatus;

/// Predicted result of a merge or rebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    Clean,
    Conflict {
        /// For rebases: the commits that will conflict when replayed.
        commits: Vec<String>,
    },
}

impl Prediction {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Prediction::Conflict { .. })
    }
}

/// Cap on commits walked during per-commit rebase prediction.
const MAX_PREDICTED_COMMITS: usize = 100;

/// Predict a merge of `theirs` into `ours` via `git merge-tree
/// --write-tree` (exit 0 = clean, 1 = conflict, anything else = unknown).
pub fn predict_merge(dir: &Path, ours: &str, theirs: &str) -> Option<Prediction> {
    let out = git(dir, &["merge-tree", "--write-tree", ours, theirs]);
    match out.exit {
        0 => Some(Prediction::Clean),
        1 => Some(Prediction::Conflict {
            commits: Vec::new(),
        }),
        _ => None,
    }
}

/// Predict a rebase of `upstream..HEAD` onto `onto`, naming the commits
/// that will conflict.
///
/// Replays each commit against a virtual tree: merge the commit's diff
/// (relative to its parent) into the running result with `merge-tree`.
/// Conflicting commits are recorded and skipped; the walk continues so
/// one bad commit doesn't hide later ones.
pub fn predict_rebase(dir: &Path, onto: &str, upstream: &str) -> Option<Prediction> {
    // Oldest first, the replay order.
    let mut commits = queries::rev_list(dir, &format!("{upstream}..HEAD"));
    commits.reverse();
    if commits.is_empty() {
        return Some(Prediction::Clean);
    }
    if commits.len() > MAX_PREDICTED_COMMITS {
        // Too deep to predict per-commit; fall back to a whole-branch
        // merge check.
        return predict_merge(dir, onto, "HEAD");
    }

    let mut current = onto.to_string();
    let mut conflicting = Vec::new();

    for commit in &commits {
        let parent = format!("{commit}~1");
        let out = git(
            dir,
            &[
                "merge-tree",
                "--write-tree",
                &format!("--merge-base={parent}"),
                &current,
                commit,
            ],
        );
        match out.exit {
            0 => {
                // First output line is the merged tree; chain it as the
                // next virtual base.
                if let Some(tree) = out.stdout.lines().next() {
                    current = tree.trim().to_string();
                }
            }
            1 => conflicting.push(commit.clone()),
            _ => return predict_merge(dir, onto, "HEAD"),
        }
    }

    if conflicting.is_empty() {
        Some(Prediction::Clean)
    } else {
        Some(Prediction::Conflict {
            commits: conflicting,
        })
    }
}

/// Autostash plan for one repo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StashPlan {
    pub needs_stash: bool,
    /// Files both the stash and the incoming ref touch; a stash pop will
    /// likely conflict on these.
    pub pop_conflict_files: Vec<String>,
}

/// Plan the autostash for an integration pulling in `incoming_ref`.
///
/// Untracked-only dirt needs no stash (neither rebase nor merge touches
/// untracked files that don't collide).
pub fn plan_autostash(dir: &Path, local: &LocalStatus, incoming_ref: &str) -> StashPlan {
    if !local.dirty_tracked() {
        return StashPlan::default();
    }

    let incoming = queries::changed_files(dir, &format!("HEAD..{incoming_ref}"));
    let pop_conflict_files = local
        .files
        .dirty_tracked_files()
        .into_iter()
        .filter(|f| incoming.iter().any(|i| i.as_str() == *f))
        .map(String::from)
        .collect();

    StashPlan {
        needs_stash: true,
        pop_conflict_files,
    }
}

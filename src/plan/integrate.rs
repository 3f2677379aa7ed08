//! Rebase / merge classification against the base branch, including
//! retargeting of stacked workspaces.

use std::path::Path;

use crate::git::queries;
use crate::status::RepoStatus;
use crate::status::merge_detect;

use super::Outcome;

/// Which integration operation a command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrateKind {
    Rebase,
    Merge,
}

impl IntegrateKind {
    pub fn verb(&self) -> &'static str {
        match self {
            IntegrateKind::Rebase => "rebase",
            IntegrateKind::Merge => "merge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrateAction {
    Skip(String),
    UpToDate,
    Operate,
}

impl IntegrateAction {
    pub fn to_outcome(&self, kind: IntegrateKind) -> Outcome {
        match self {
            IntegrateAction::Skip(reason) => Outcome::skip(reason.clone()),
            IntegrateAction::UpToDate => Outcome::UpToDate,
            IntegrateAction::Operate => Outcome::will(kind.verb()),
        }
    }
}

/// Classify one repo for `arb rebase` / `arb merge`.
pub fn classify_integrate(
    status: &RepoStatus,
    expected_branch: &str,
    autostash: bool,
    retarget: bool,
    fetch_failed: bool,
) -> IntegrateAction {
    if fetch_failed {
        return IntegrateAction::Skip("fetch failed".into());
    }
    if let Some(op) = status.operation {
        return IntegrateAction::Skip(format!("{op} in progress"));
    }
    let Some(branch) = status.branch() else {
        return IntegrateAction::Skip("detached HEAD".into());
    };
    if branch != expected_branch {
        return IntegrateAction::Skip(format!("on branch {branch} (drifted)"));
    }
    if status.local.is_dirty() && !autostash {
        return IntegrateAction::Skip("dirty working tree (use --autostash)".into());
    }
    let Some(base) = &status.base else {
        return IntegrateAction::Skip("no base branch resolved".into());
    };
    if base.base_merged_into_default.is_some() && !retarget {
        return IntegrateAction::Skip("base merged into default (use --retarget)".into());
    }
    if base.behind == 0 {
        return IntegrateAction::UpToDate;
    }
    IntegrateAction::Operate
}

/// Replay analysis for `--retarget`: which commits over the old base are
/// already on the new target (patch-equivalent) and which must be
/// replayed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayAnalysis {
    pub already_on_target: u64,
    pub to_replay: u64,
}

pub fn analyze_replay(dir: &Path, old_base: &str, new_base: &str) -> ReplayAnalysis {
    let local = queries::rev_list(dir, &format!("{old_base}..HEAD"));
    if local.is_empty() {
        return ReplayAnalysis::default();
    }
    let already = merge_detect::rebased_count(
        dir,
        &format!("{old_base}..HEAD"),
        &format!("{old_base}..{new_base}"),
    );
    let total = local.len() as u64;
    ReplayAnalysis {
        already_on_target: already,
        to_replay: total.saturating_sub(already),
    }
}

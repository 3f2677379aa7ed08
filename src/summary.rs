//! Workspace summary: parallel per-repo gather plus aggregation.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::Serialize;

use crate::cache::QueryCache;
use crate::context::ArbContext;
use crate::status::{GatherParams, RepoFlags, RepoStatus, gather_status};
use crate::workspace::Workspace;

/// One repo's gathered state plus derived flags.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RepoReport {
    #[serde(flatten)]
    pub status: RepoStatus,
    pub flags: RepoFlags,
    #[serde(skip)]
    #[schemars(skip)]
    pub dir: PathBuf,
}

/// Per-flag tallies across the workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueCounts {
    pub dirty: u64,
    pub unpushed: u64,
    pub behind_share: u64,
    pub behind_base: u64,
    pub diverged: u64,
    pub drifted: u64,
    pub detached: u64,
    pub operation: u64,
    pub local: u64,
    pub gone: u64,
    pub shallow: u64,
    pub merged: u64,
    pub base_merged: u64,
}

impl IssueCounts {
    fn tally(reports: &[RepoReport]) -> Self {
        let mut counts = IssueCounts::default();
        for report in reports {
            let f = &report.flags;
            counts.dirty += u64::from(f.is_dirty);
            counts.unpushed += u64::from(f.is_unpushed);
            counts.behind_share += u64::from(f.needs_pull);
            counts.behind_base += u64::from(f.needs_rebase);
            counts.diverged += u64::from(f.is_diverged);
            counts.drifted += u64::from(f.is_drifted);
            counts.detached += u64::from(f.is_detached);
            counts.operation += u64::from(f.has_operation);
            counts.local += u64::from(f.is_local);
            counts.gone += u64::from(f.is_gone);
            counts.shallow += u64::from(f.is_shallow);
            counts.merged += u64::from(f.is_merged);
            counts.base_merged += u64::from(f.is_base_merged);
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub workspace: String,
    pub branch: String,
    pub base: Option<String>,
    pub repos: Vec<RepoReport>,
    pub total: u64,
    /// Repos where `needs_attention` holds.
    pub with_issues: u64,
    /// Repos whose share divergence is fully explained by rebased commits
    /// (an `arb push --force` resolves them).
    pub rebased_only_count: u64,
    pub issue_counts: IssueCounts,
    /// Latest commit across all repos.
    pub last_commit: Option<DateTime<FixedOffset>>,
}

impl WorkspaceSummary {
    /// Whether every repo passes the destructive-command gate: nothing
    /// would lose work and no local-only repo carries commits over base.
    pub fn is_safe_to_delete(&self) -> bool {
        self.repos.iter().all(|r| {
            !r.flags.would_lose_work()
                && !(r.status.share.is_none()
                    && r.status.base.as_ref().map(|b| b.ahead).unwrap_or(0) > 0)
        })
    }
}

/// Gather every repo of a workspace in parallel and aggregate.
///
/// Repos gather concurrently (the work is git subprocesses dominated by
/// I/O); within the rayon pool the request cache coalesces shared lookups.
/// `progress` ticks once per finished repo.
pub fn summarize(
    ctx: &ArbContext,
    workspace: &Workspace,
    cache: &QueryCache,
    progress: Option<&(dyn Fn(&str) + Sync)>,
) -> WorkspaceSummary {
    let names = workspace.repos(ctx);
    let branch = workspace.branch().to_string();
    let base = workspace.base().map(String::from);

    let mut reports: Vec<RepoReport> = names
        .par_iter()
        .map(|name| {
            let dir = workspace.repo_dir(name);
            let remotes = cache.resolved_remotes(&dir).ok();
            let status = gather_status(&GatherParams {
                name,
                worktree_dir: &dir,
                config_base: base.as_deref(),
                remotes: remotes.as_ref(),
                cache,
            });
            let flags = RepoFlags::derive(&status, &branch);
            if let Some(progress) = progress {
                progress(name);
            }
            RepoReport { status, flags, dir }
        })
        .collect();
    reports.sort_by(|a, b| a.status.name.cmp(&b.status.name));

    let with_issues = reports
        .iter()
        .filter(|r| r.flags.needs_attention())
        .count() as u64;
    let rebased_only_count = reports
        .iter()
        .filter(|r| {
            r.status.share.as_ref().is_some_and(|s| {
                s.to_push.unwrap_or(0) > 0
                    && s.to_pull.unwrap_or(0) > 0
                    && s.rebased >= s.to_pull.unwrap_or(u64::MAX)
            })
        })
        .count() as u64;
    let last_commit = reports
        .iter()
        .filter_map(|r| r.status.last_commit)
        .max();
    let issue_counts = IssueCounts::tally(&reports);

    WorkspaceSummary {
        workspace: workspace.name.clone(),
        branch,
        base,
        total: reports.len() as u64,
        with_issues,
        rebased_only_count,
        issue_counts,
        last_commit,
        repos: reports,
    }
}

//! `arb push` / `arb pull`: share-remote sync planners.

use anyhow::Result;
use color_print::cformat;

use arborist::context::ArbContext;
use arborist::fetch::FetchRequest;
use arborist::git::{git, queries};
use arborist::plan::sync::{
    PullAction, PullMode, PushAction, classify_pull, classify_push, resolve_pull_mode,
};
use arborist::plan::{
    ExecOutcome, MutationOpts, MutationPlanner, PlanRow, conflict, run_mutation,
};

use super::{WorkspaceTarget, format_plan, row_from_report};
use crate::cli::MutationArgs;

// ============================================================================
// Push
// ============================================================================

pub struct PushDetail {
    action: PushAction,
    remote: String,
    to_push: u64,
}

struct PushPlanner {
    target: WorkspaceTarget,
    branch: String,
    force: bool,
}

impl MutationPlanner for PushPlanner {
    type Detail = PushDetail;

    fn verb(&self) -> &str {
        "push"
    }

    fn fetch_requests(&self) -> Vec<FetchRequest> {
        self.target.fetch_requests()
    }

    fn after_fetch(&self) {
        self.target.cache.invalidate_after_fetch();
    }

    fn assess(&self, fetch_failed: &[String]) -> Result<Vec<PlanRow<PushDetail>>> {
        let summary = self.target.summarize();
        Ok(summary
            .repos
            .iter()
            .map(|report| {
                let failed = fetch_failed.contains(&report.status.name);
                let action = classify_push(&report.status, &self.branch, self.force, failed);
                let detail = PushDetail {
                    action: action.clone(),
                    remote: report
                        .status
                        .share
                        .as_ref()
                        .map(|s| s.remote.clone())
                        .unwrap_or_default(),
                    to_push: report
                        .status
                        .share
                        .as_ref()
                        .and_then(|s| s.to_push)
                        .unwrap_or_else(|| {
                            report.status.base.as_ref().map(|b| b.ahead).unwrap_or(0)
                        }),
                };
                row_from_report(report, report.dir.clone(), action.to_outcome(), detail)
            })
            .collect())
    }

    fn format_plan(&self, rows: &[PlanRow<PushDetail>]) -> String {
        let title = cformat!("Push <bold>{}</> to share remotes:", self.branch);
        format_plan(&title, rows, |row| match row.detail.to_push {
            0 => String::new(),
            n => format!("{n} commit(s) → {}/{}", row.detail.remote, self.branch),
        })
    }

    fn execute(&self, row: &PlanRow<PushDetail>) -> ExecOutcome {
        let PushAction::Push { force, .. } = &row.detail.action else {
            return ExecOutcome::ok("nothing to do");
        };

        let mut args = vec!["push", "-u"];
        if *force {
            // Never plain --force: the lease catches a racing remote
            // update since our fetch.
            args.push("--force-with-lease");
        }
        args.push(&row.detail.remote);
        args.push(&self.branch);

        let out = git(&row.repo_dir, &args);
        if out.success() {
            let n = row.detail.to_push;
            ExecOutcome::ok(if *force {
                format!("force-pushed {n} commit(s)")
            } else if n == 0 {
                "pushed".to_string()
            } else {
                format!("pushed {n} commit(s)")
            })
        } else {
            ExecOutcome::failed("push rejected", out.stderr.trim().to_string())
        }
    }
}

pub fn handle_push(ctx: ArbContext, args: &MutationArgs) -> Result<()> {
    let target = WorkspaceTarget::open(ctx, None, args.filter_expr().as_deref())?;
    let branch = target.expected_branch();
    let planner = PushPlanner {
        target,
        branch,
        force: args.force,
    };
    run_mutation(
        &planner,
        &MutationOpts {
            yes: args.yes,
            force: args.force,
            dry_run: args.dry_run,
            fetch: args.fetch_or(true),
        },
    )
}

// ============================================================================
// Pull
// ============================================================================

pub struct PullDetail {
    action: PullAction,
    remote: String,
    share_ref: Option<String>,
    to_pull: u64,
}

struct PullPlanner {
    target: WorkspaceTarget,
    branch: String,
    rebase_flag: bool,
    merge_flag: bool,
}

impl MutationPlanner for PullPlanner {
    type Detail = PullDetail;

    fn verb(&self) -> &str {
        "pull"
    }

    fn fetch_requests(&self) -> Vec<FetchRequest> {
        self.target.fetch_requests()
    }

    fn after_fetch(&self) {
        self.target.cache.invalidate_after_fetch();
    }

    fn assess(&self, fetch_failed: &[String]) -> Result<Vec<PlanRow<PullDetail>>> {
        let summary = self.target.summarize();
        Ok(summary
            .repos
            .iter()
            .map(|report| {
                let failed = fetch_failed.contains(&report.status.name);
                let mode = resolve_pull_mode(
                    &report.dir,
                    &self.branch,
                    self.rebase_flag,
                    self.merge_flag,
                );
                let action = classify_pull(&report.status, &self.branch, mode, failed);
                let share = report.status.share.as_ref();
                let detail = PullDetail {
                    action: action.clone(),
                    remote: share.map(|s| s.remote.clone()).unwrap_or_default(),
                    share_ref: share.and_then(|s| s.ref_name.clone()),
                    to_pull: share.and_then(|s| s.to_pull).unwrap_or(0),
                };
                row_from_report(report, report.dir.clone(), action.to_outcome(), detail)
            })
            .collect())
    }

    fn post_assess(&self, rows: &mut [PlanRow<PullDetail>]) {
        for row in rows.iter_mut() {
            if !row.outcome.is_will() {
                continue;
            }
            let Some(share_ref) = row.detail.share_ref.clone() else {
                continue;
            };
            row.conflict = match row.detail.action {
                PullAction::Pull {
                    mode: PullMode::Rebase,
                } => conflict::predict_rebase(&row.repo_dir, &share_ref, &share_ref),
                _ => conflict::predict_merge(&row.repo_dir, "HEAD", &share_ref),
            };
        }
    }

    fn format_plan(&self, rows: &[PlanRow<PullDetail>]) -> String {
        let title = cformat!("Pull <bold>{}</> from share remotes:", self.branch);
        format_plan(&title, rows, |row| match row.detail.to_pull {
            0 => String::new(),
            n => format!("{n} commit(s) ← {}", row.detail.remote),
        })
    }

    fn execute(&self, row: &PlanRow<PullDetail>) -> ExecOutcome {
        let PullAction::Pull { mode } = &row.detail.action else {
            return ExecOutcome::ok("nothing to do");
        };

        let mode_arg = match mode {
            PullMode::Rebase => "--rebase",
            PullMode::Merge => "--no-rebase",
        };
        let out = git(
            &row.repo_dir,
            &["pull", mode_arg, &row.detail.remote, &self.branch],
        );
        if out.success() {
            return ExecOutcome::ok(format!(
                "pulled {} commit(s) ({})",
                row.detail.to_pull,
                mode.as_str()
            ));
        }

        // Distinguish a conflict (operation left in progress) from a
        // plain failure.
        let conflicted = queries::git_dir(&row.repo_dir).is_some_and(|d| {
            d.join("MERGE_HEAD").exists()
                || d.join("rebase-merge").exists()
                || d.join("rebase-apply").exists()
        });
        let detail = format!("{}\n{}", out.stdout.trim(), out.stderr.trim());
        if conflicted {
            ExecOutcome::conflicted(format!("{} conflict", mode.as_str()), detail)
        } else {
            ExecOutcome::failed("pull failed", detail)
        }
    }
}

pub fn handle_pull(
    ctx: ArbContext,
    rebase_flag: bool,
    merge_flag: bool,
    args: &MutationArgs,
) -> Result<()> {
    let target = WorkspaceTarget::open(ctx, None, args.filter_expr().as_deref())?;
    let branch = target.expected_branch();
    let planner = PullPlanner {
        target,
        branch,
        rebase_flag,
        merge_flag,
    };
    run_mutation(
        &planner,
        &MutationOpts {
            yes: args.yes,
            force: args.force,
            dry_run: args.dry_run,
            fetch: args.fetch_or(true),
        },
    )
}

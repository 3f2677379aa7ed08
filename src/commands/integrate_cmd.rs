//! `arb rebase` / `arb merge`: base-branch integration, including
//! retargeting stacked workspaces whose base has merged.

use anyhow::Result;
use color_print::cformat;

use arborist::context::ArbContext;
use arborist::error::ArbError;
use arborist::fetch::FetchRequest;
use arborist::git::{git, queries};
use arborist::plan::integrate::{
    IntegrateAction, IntegrateKind, ReplayAnalysis, analyze_replay, classify_integrate,
};
use arborist::plan::{
    ExecOutcome, MutationOpts, MutationPlanner, Outcome, PlanRow, conflict, run_mutation,
};
use arborist::status::LocalStatus;
use arborist::styling::{eprintln, warning_message};

use super::{WorkspaceTarget, format_plan, row_from_report};
use crate::cli::MutationArgs;

/// Per-repo retarget plan: replay `old..HEAD` onto the new base.
#[derive(Debug, Clone)]
struct RetargetPlan {
    old_base_ref: String,
    new_base_ref: String,
    replay: ReplayAnalysis,
}

pub struct IntegrateDetail {
    action: IntegrateAction,
    base_ref: Option<String>,
    behind: u64,
    local: LocalStatus,
    retarget: Option<RetargetPlan>,
}

struct IntegratePlanner {
    target: WorkspaceTarget,
    branch: String,
    kind: IntegrateKind,
    /// `Some(None)` = retarget to each repo's default branch;
    /// `Some(Some(b))` = retarget to branch `b` on the base remote.
    retarget: Option<Option<String>>,
    autostash: bool,
}

impl IntegratePlanner {
    fn plan_retarget(
        &self,
        report: &arborist::summary::RepoReport,
    ) -> std::result::Result<RetargetPlan, String> {
        let dir = &report.dir;
        let base = report
            .status
            .base
            .as_ref()
            .ok_or_else(|| "no base branch resolved".to_string())?;
        let remote = base
            .remote
            .clone()
            .ok_or_else(|| "local-only repo cannot retarget".to_string())?;
        let old_base_ref = base.ref_name.clone();

        let new_base_ref = match self.retarget.as_ref().expect("retarget mode") {
            // Bare --retarget: the repo's true default branch.
            None => {
                let default = self
                    .target
                    .cache
                    .default_branch(dir, &remote)
                    .ok_or_else(|| format!("cannot resolve default branch of {remote}"))?;
                format!("{remote}/{default}")
            }
            Some(branch) => {
                let candidate = format!("{remote}/{branch}");
                if !queries::ref_exists(dir, &candidate) {
                    return Err(format!("{candidate} does not exist"));
                }
                if !queries::is_ancestor(dir, &old_base_ref, &candidate) {
                    eprintln!(
                        "{}",
                        warning_message(format!(
                            "{}: {old_base_ref} is not merged into {candidate}",
                            report.status.name
                        ))
                    );
                }
                candidate
            }
        };

        Ok(RetargetPlan {
            replay: analyze_replay(dir, &old_base_ref, &new_base_ref),
            old_base_ref,
            new_base_ref,
        })
    }
}

impl MutationPlanner for IntegratePlanner {
    type Detail = IntegrateDetail;

    fn verb(&self) -> &str {
        self.kind.verb()
    }

    fn fetch_requests(&self) -> Vec<FetchRequest> {
        self.target.fetch_requests()
    }

    fn after_fetch(&self) {
        self.target.cache.invalidate_after_fetch();
    }

    fn assess(&self, fetch_failed: &[String]) -> Result<Vec<PlanRow<IntegrateDetail>>> {
        let summary = self.target.summarize();
        let retargeting = self.retarget.is_some();

        let mut rows = Vec::with_capacity(summary.repos.len());
        for report in &summary.repos {
            let failed = fetch_failed.contains(&report.status.name);
            let mut action = classify_integrate(
                &report.status,
                &self.branch,
                self.autostash,
                retargeting,
                failed,
            );
            // A retarget replays even when not behind the old base.
            if retargeting && action == IntegrateAction::UpToDate {
                action = IntegrateAction::Operate;
            }

            let mut retarget = None;
            if retargeting && action == IntegrateAction::Operate {
                match self.plan_retarget(report) {
                    Ok(plan) => retarget = Some(plan),
                    Err(reason) => action = IntegrateAction::Skip(reason),
                }
            }

            let base = report.status.base.as_ref();
            let detail = IntegrateDetail {
                action: action.clone(),
                base_ref: base.map(|b| b.ref_name.clone()),
                behind: base.map(|b| b.behind).unwrap_or(0),
                local: report.status.local.clone(),
                retarget,
            };
            rows.push(row_from_report(
                report,
                report.dir.clone(),
                action.to_outcome(self.kind),
                detail,
            ));
        }

        // Retarget is all-or-nothing: one blocked repo aborts before any
        // execution, so no repo ends up on a different base than its
        // siblings.
        if retargeting {
            let blocked: Vec<String> = rows
                .iter()
                .filter_map(|r| match &r.outcome {
                    Outcome::Skip { reason } => Some(format!("{}: {reason}", r.repo)),
                    _ => None,
                })
                .collect();
            if !blocked.is_empty() {
                return Err(ArbError::operation(format!(
                    "retarget blocked; no repos were changed:\n  {}",
                    blocked.join("\n  ")
                ))
                .into());
            }
        }

        Ok(rows)
    }

    fn post_assess(&self, rows: &mut [PlanRow<IntegrateDetail>]) {
        for row in rows.iter_mut() {
            if !row.outcome.is_will() {
                continue;
            }
            let (onto, upstream) = match (&row.detail.retarget, &row.detail.base_ref) {
                (Some(plan), _) => (plan.new_base_ref.clone(), plan.old_base_ref.clone()),
                (None, Some(base_ref)) => (base_ref.clone(), base_ref.clone()),
                (None, None) => continue,
            };

            row.conflict = match self.kind {
                IntegrateKind::Rebase => {
                    conflict::predict_rebase(&row.repo_dir, &onto, &upstream)
                }
                IntegrateKind::Merge => conflict::predict_merge(&row.repo_dir, "HEAD", &onto),
            };

            if self.autostash {
                let plan = conflict::plan_autostash(&row.repo_dir, &row.detail.local, &onto);
                row.needs_stash = plan.needs_stash;
                row.stash_pop_conflicts = plan.pop_conflict_files;
            }
        }
    }

    fn format_plan(&self, rows: &[PlanRow<IntegrateDetail>]) -> String {
        let title = match (&self.retarget, self.kind) {
            (Some(_), _) => cformat!("Retarget <bold>{}</> onto a new base:", self.branch),
            (None, IntegrateKind::Rebase) => {
                cformat!("Rebase <bold>{}</> onto base branches:", self.branch)
            }
            (None, IntegrateKind::Merge) => {
                cformat!("Merge base branches into <bold>{}</>:", self.branch)
            }
        };
        format_plan(&title, rows, |row| match &row.detail.retarget {
            Some(plan) => format!(
                "{} → {} ({} to replay, {} already there)",
                plan.old_base_ref,
                plan.new_base_ref,
                plan.replay.to_replay,
                plan.replay.already_on_target
            ),
            None => match &row.detail.base_ref {
                Some(base_ref) => format!("{} behind {}", row.detail.behind, base_ref),
                None => String::new(),
            },
        })
    }

    fn execute(&self, row: &PlanRow<IntegrateDetail>) -> ExecOutcome {
        match (&row.detail.retarget, self.kind) {
            (Some(plan), _) => self.execute_retarget(row, plan),
            (None, IntegrateKind::Rebase) => self.execute_rebase(row),
            (None, IntegrateKind::Merge) => self.execute_merge(row),
        }
    }
}

impl IntegratePlanner {
    fn execute_rebase(&self, row: &PlanRow<IntegrateDetail>) -> ExecOutcome {
        let Some(base_ref) = &row.detail.base_ref else {
            return ExecOutcome::failed("no base ref", String::new());
        };
        let mut args = vec!["rebase"];
        if self.autostash {
            args.push("--autostash");
        }
        args.push(base_ref);
        finish_rebase(&row.repo_dir, git(&row.repo_dir, &args), row.detail.behind)
    }

    fn execute_retarget(&self, row: &PlanRow<IntegrateDetail>, plan: &RetargetPlan) -> ExecOutcome {
        let mut args = vec!["rebase"];
        if self.autostash {
            args.push("--autostash");
        }
        args.extend(["--onto", &plan.new_base_ref, &plan.old_base_ref]);
        let out = git(&row.repo_dir, &args);
        if out.success() {
            ExecOutcome::ok(format!(
                "replayed {} commit(s) onto {}",
                plan.replay.to_replay, plan.new_base_ref
            ))
        } else {
            rebase_failure(&row.repo_dir, out)
        }
    }

    fn execute_merge(&self, row: &PlanRow<IntegrateDetail>) -> ExecOutcome {
        let Some(base_ref) = &row.detail.base_ref else {
            return ExecOutcome::failed("no base ref", String::new());
        };
        let dir = &row.repo_dir;

        // Merge has no --autostash; bracket it manually. A conflicting
        // pop is reported but does not fail the merge.
        let stashed = row.needs_stash && git(dir, &["stash", "push"]).success();

        let out = git(dir, &["merge", base_ref]);
        let outcome = if out.success() {
            ExecOutcome::ok(format!("merged {} commit(s)", row.detail.behind))
        } else if queries::git_dir(dir).is_some_and(|d| d.join("MERGE_HEAD").exists()) {
            ExecOutcome::conflicted(
                "merge conflict",
                format!("{}\n{}", out.stdout.trim(), out.stderr.trim()),
            )
        } else {
            ExecOutcome::failed("merge failed", out.stderr.trim().to_string())
        };

        if stashed {
            let pop = git(dir, &["stash", "pop"]);
            if !pop.success() {
                eprintln!(
                    "{}",
                    warning_message(format!(
                        "{}: stash pop conflicted; resolve and `git stash drop`",
                        row.repo
                    ))
                );
            }
        }
        outcome
    }
}

fn finish_rebase(
    dir: &std::path::Path,
    out: arborist::git::GitOutput,
    behind: u64,
) -> ExecOutcome {
    if out.success() {
        ExecOutcome::ok(format!("rebased onto {behind} new commit(s)"))
    } else {
        rebase_failure(dir, out)
    }
}

fn rebase_failure(dir: &std::path::Path, out: arborist::git::GitOutput) -> ExecOutcome {
    let in_progress = queries::git_dir(dir)
        .is_some_and(|d| d.join("rebase-merge").exists() || d.join("rebase-apply").exists());
    let detail = format!("{}\n{}", out.stdout.trim(), out.stderr.trim());
    if in_progress {
        ExecOutcome::conflicted("rebase conflict", detail)
    } else {
        ExecOutcome::failed("rebase failed", detail)
    }
}

pub fn handle_integrate(
    ctx: ArbContext,
    kind: IntegrateKind,
    retarget: Option<Option<String>>,
    args: &MutationArgs,
) -> Result<()> {
    let target = WorkspaceTarget::open(ctx, None, args.filter_expr().as_deref())?;
    let branch = target.expected_branch();
    let retarget_to = retarget.clone().flatten();

    let planner = IntegratePlanner {
        target,
        branch,
        kind,
        retarget,
        autostash: args.autostash,
    };
    run_mutation(
        &planner,
        &MutationOpts {
            yes: args.yes,
            force: args.force,
            dry_run: args.dry_run,
            fetch: args.fetch_or(true),
        },
    )?;

    // Only reached when every repo executed cleanly: move the workspace's
    // configured base. Retargeting to the default branch clears the key.
    let had_repos = !planner
        .target
        .workspace
        .repos(&planner.target.ctx)
        .is_empty();
    if planner.retarget.is_some() && !args.dry_run && had_repos {
        let mut workspace = planner.target.workspace;
        workspace.config.base = retarget_to;
        workspace.save_config()?;
        match &workspace.config.base {
            Some(base) => eprintln!("Workspace base is now '{base}'."),
            None => eprintln!("Workspace base cleared (back on the default branch)."),
        }
    }
    Ok(())
}

//! `arb delete` / `arb clean`: destroy workspaces, gated on safety.

use anyhow::Result;
use color_print::cformat;

use arborist::context::ArbContext;
use arborist::error::ArbError;
use arborist::git::git;
use arborist::plan::confirm_or_abort;
use arborist::styling::{eprintln, success_message, warning_message};
use arborist::summary::WorkspaceSummary;

use super::WorkspaceTarget;
use crate::cli::MutationArgs;

pub fn handle_delete(ctx: ArbContext, name: Option<&str>, args: &MutationArgs) -> Result<()> {
    let target = WorkspaceTarget::open(ctx, name, None)?;
    let summary = target.summarize();

    if !args.force && !summary.is_safe_to_delete() {
        let at_risk = summary
            .repos
            .iter()
            .filter(|r| {
                r.flags.would_lose_work()
                    || (r.status.share.is_none()
                        && r.status.base.as_ref().map(|b| b.ahead).unwrap_or(0) > 0)
            })
            .count();
        return Err(ArbError::operation(format!(
            "Refusing to delete: {at_risk} repo(s) have work that would be lost. \
             Use --force to override."
        ))
        .into());
    }

    if args.dry_run {
        eprintln!(
            "Would delete workspace '{}' ({} repo(s)).",
            summary.workspace, summary.total
        );
        return Ok(());
    }
    if !args.yes && !args.force {
        confirm_or_abort(&format!(
            "Delete workspace '{}' ({} repo(s))?",
            summary.workspace, summary.total
        ))?;
    }

    delete_workspace(&target, &summary, args.force)?;
    eprintln!(
        "{}",
        success_message(cformat!("Deleted workspace <bold>{}</>", summary.workspace))
    );
    Ok(())
}

fn delete_workspace(
    target: &WorkspaceTarget,
    summary: &WorkspaceSummary,
    force: bool,
) -> Result<()> {
    let branch = &summary.branch;

    for report in &summary.repos {
        let canonical = target.ctx.canonical_repo_dir(&report.status.name);
        let worktree_str = report.dir.to_string_lossy().to_string();

        if canonical.join(".git").exists() {
            let mut args = vec!["worktree", "remove"];
            if force {
                args.push("--force");
            }
            args.push(&worktree_str);
            let out = git(&canonical, &args);
            if !out.success() {
                return Err(ArbError::operation(format!(
                    "failed to remove worktree {}:\n{}",
                    report.status.name,
                    out.stderr.trim()
                ))
                .into());
            }
            // Clean up the worktree bookkeeping left behind.
            let _ = git(&canonical, &["worktree", "prune"]);

            delete_branch(&canonical, &report.status.name, branch, report, force);
        } else if report.dir.exists() {
            // Canonical repo is gone; the directory is all that's left.
            std::fs::remove_dir_all(&report.dir)?;
        }
    }

    std::fs::remove_dir_all(&target.workspace.dir)?;
    Ok(())
}

/// Delete the feature branch where that is safe: `-d` when git agrees or
/// the status shows it merged (squash merges defeat `-d`), `-D` under
/// `--force`. An undeletable branch is reported, never fatal.
fn delete_branch(
    canonical: &std::path::Path,
    repo: &str,
    branch: &str,
    report: &arborist::summary::RepoReport,
    force: bool,
) {
    let merged = report.flags.is_merged;
    let flag = if force || merged { "-D" } else { "-d" };
    let out = git(canonical, &["branch", flag, branch]);
    if !out.success() && !out.stderr.contains("not found") {
        eprintln!(
            "{}",
            warning_message(format!(
                "left branch '{branch}' in {repo} (delete with: git branch -D {branch})"
            ))
        );
    }
}

pub fn handle_clean(ctx: ArbContext, args: &MutationArgs) -> Result<()> {
    let workspaces = ctx.workspaces();
    if workspaces.is_empty() {
        eprintln!("No workspaces.");
        return Ok(());
    }

    let mut candidates = Vec::new();
    for name in &workspaces {
        let target = WorkspaceTarget::open(ctx.clone(), Some(name.as_str()), None)?;
        let summary = target.summarize();
        // Cleanable: everything integrated and nothing at risk.
        let all_merged = summary.total > 0
            && summary
                .repos
                .iter()
                .all(|r| r.flags.is_merged || r.flags.is_base_merged);
        if all_merged && summary.is_safe_to_delete() {
            candidates.push((target, summary));
        }
    }

    if candidates.is_empty() {
        eprintln!("Nothing to clean: no fully-merged workspaces.");
        return Ok(());
    }

    eprintln!("Merged workspaces:");
    for (_, summary) in &candidates {
        eprintln!("  {} ({} repo(s))", summary.workspace, summary.total);
    }
    if args.dry_run {
        eprintln!("Dry run; nothing deleted.");
        return Ok(());
    }
    if !args.yes && !args.force {
        confirm_or_abort(&format!("Delete {} workspace(s)?", candidates.len()))?;
    }

    for (target, summary) in &candidates {
        delete_workspace(target, summary, args.force)?;
        eprintln!("{}", success_message(format!("Deleted {}", summary.workspace)));
    }
    Ok(())
}

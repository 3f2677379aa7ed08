//! `arb branch`: show the feature branch, and the cross-repo rename
//! state machine.
//!
//! Rename is non-atomic across repos. `.arbws/config` carries the durable
//! migration state: `branch` is flipped to the new name up front and
//! `branch_rename_from` holds the old one until every repo has renamed.
//! A partial failure leaves the state in place for `--continue` or
//! `--abort`.

use anyhow::Result;
use color_print::cformat;

use arborist::cache::QueryCache;
use arborist::context::ArbContext;
use arborist::error::ArbError;
use arborist::git::{git, queries};
use arborist::plan::confirm_or_abort;
use arborist::plan::rename::{AbortAction, RenameAction, classify_abort, classify_rename};
use arborist::styling::{eprintln, success_message, warning_message};
use arborist::workspace::Workspace;

use crate::cli::MutationArgs;

pub fn handle_branch(ctx: &ArbContext) -> Result<()> {
    let workspace = Workspace::open(ctx, None)?;
    let expected = workspace.branch();

    eprintln!(
        "{}",
        cformat!("Workspace branch: <bold>{expected}</>")
    );
    if let Some(base) = workspace.base() {
        eprintln!("{}", cformat!("Stacked on: <bold>{base}</>"));
    }
    if let Some(old) = &workspace.config.branch_rename_from {
        eprintln!(
            "{}",
            warning_message(format!(
                "rename from '{old}' in progress (finish with `arb branch rename --continue`)"
            ))
        );
    }

    for repo in workspace.repos(ctx) {
        let dir = workspace.repo_dir(&repo);
        let line = match queries::current_branch(&dir) {
            Some(branch) if branch == expected => cformat!("  {repo}  <green>{branch}</>"),
            Some(branch) => cformat!("  {repo}  <yellow>{branch}</> (drifted)"),
            None => cformat!("  {repo}  <red>detached</>"),
        };
        eprintln!("{line}");
    }
    Ok(())
}

pub struct RenameOptions<'a> {
    pub new_name: Option<&'a str>,
    pub cont: bool,
    pub abort: bool,
    pub delete_remote: bool,
    pub workspace_name: Option<&'a str>,
}

pub fn handle_branch_rename(
    ctx: &ArbContext,
    opts: &RenameOptions<'_>,
    args: &MutationArgs,
) -> Result<()> {
    let workspace = Workspace::open(ctx, None)?;

    match (workspace.config.rename_in_progress(), opts.cont, opts.abort) {
        (false, true, _) | (false, _, true) => {
            Err(ArbError::user("no branch rename in progress").into())
        }
        (true, false, false) => Err(ArbError::user(
            "a branch rename is in progress; use --continue or --abort",
        )
        .into()),
        (false, false, false) => {
            let new_name = opts
                .new_name
                .ok_or_else(|| ArbError::user("pass the new branch name"))?;
            start_rename(ctx, workspace, new_name, opts, args)
        }
        (true, true, false) => continue_rename(ctx, workspace, opts, args),
        (true, _, true) => abort_rename(ctx, workspace, args),
    }
}

fn start_rename(
    ctx: &ArbContext,
    mut workspace: Workspace,
    new_name: &str,
    opts: &RenameOptions<'_>,
    args: &MutationArgs,
) -> Result<()> {
    let old_name = workspace.branch().to_string();
    if new_name == old_name {
        return Err(ArbError::user("new name equals the current branch").into());
    }

    let repos = workspace.repos(ctx);
    if args.dry_run {
        eprintln!(
            "Would rename '{old_name}' → '{new_name}' across {} repo(s).",
            repos.len()
        );
        return Ok(());
    }
    if !args.yes && !args.force {
        confirm_or_abort(&format!(
            "Rename branch '{old_name}' → '{new_name}' across {} repo(s)?",
            repos.len()
        ))?;
    }

    // Durable state first, so a crash mid-rename is resumable.
    workspace.config.branch = Some(new_name.to_string());
    workspace.config.branch_rename_from = Some(old_name.clone());
    workspace.save_config()?;

    run_renames(ctx, workspace, &old_name, new_name, opts)
}

fn continue_rename(
    ctx: &ArbContext,
    workspace: Workspace,
    opts: &RenameOptions<'_>,
    args: &MutationArgs,
) -> Result<()> {
    let old_name = workspace
        .config
        .branch_rename_from
        .clone()
        .expect("rename in progress");
    let new_name = workspace.branch().to_string();
    if args.dry_run {
        eprintln!("Would continue rename '{old_name}' → '{new_name}'.");
        return Ok(());
    }
    run_renames(ctx, workspace, &old_name, &new_name, opts)
}

/// Rename every repo still on the old name; clear the migration state
/// only when none remain behind.
fn run_renames(
    ctx: &ArbContext,
    mut workspace: Workspace,
    old_name: &str,
    new_name: &str,
    opts: &RenameOptions<'_>,
) -> Result<()> {
    let repos = workspace.repos(ctx);
    let mut failures = Vec::new();

    for repo in &repos {
        let dir = workspace.repo_dir(repo);
        match classify_rename(queries::current_branch(&dir).as_deref(), old_name, new_name) {
            RenameAction::AlreadyOnNew => {
                eprintln!("  {repo}: already on {new_name}");
            }
            RenameAction::WillRename => {
                let out = git(&dir, &["branch", "-m", old_name, new_name]);
                if out.success() {
                    eprintln!("{}", cformat!("  {repo}: <green>renamed</>"));
                } else {
                    eprintln!(
                        "{}",
                        cformat!("  {repo}: <red>failed</> {}", out.stderr.trim())
                    );
                    failures.push(repo.clone());
                }
            }
            RenameAction::SkipDetached => {
                eprintln!("{}", warning_message(format!("{repo}: detached, skipped")));
                failures.push(repo.clone());
            }
            RenameAction::SkipOtherBranch(branch) => {
                eprintln!(
                    "{}",
                    warning_message(format!("{repo}: on '{branch}', skipped"))
                );
                failures.push(repo.clone());
            }
        }
    }

    if !failures.is_empty() {
        return Err(ArbError::operation(format!(
            "rename incomplete in {}; fix and run `arb branch rename --continue` \
             (or roll back with --abort)",
            failures.join(", ")
        ))
        .into());
    }

    workspace.config.branch_rename_from = None;
    workspace.save_config()?;

    // Remote deletion only after every local rename succeeded, so --abort
    // never has to touch remotes.
    if opts.delete_remote {
        delete_remote_branches(&workspace, ctx, old_name);
    }

    if let Some(ws_name) = rename_workspace_dir_target(&workspace, old_name, new_name, opts) {
        rename_workspace_dir(ctx, &workspace, &ws_name)?;
    }

    eprintln!(
        "{}",
        success_message(cformat!(
            "Renamed branch to <bold>{new_name}</> across {} repo(s)",
            repos.len()
        ))
    );
    Ok(())
}

fn abort_rename(ctx: &ArbContext, mut workspace: Workspace, args: &MutationArgs) -> Result<()> {
    let old_name = workspace
        .config
        .branch_rename_from
        .clone()
        .expect("rename in progress");
    let new_name = workspace.branch().to_string();

    if args.dry_run {
        eprintln!("Would roll back rename, restoring '{old_name}'.");
        return Ok(());
    }

    let repos = workspace.repos(ctx);
    let mut failures = Vec::new();

    for repo in &repos {
        let dir = workspace.repo_dir(repo);
        match classify_abort(queries::current_branch(&dir).as_deref(), &old_name, &new_name) {
            AbortAction::RollBack => {
                let out = git(&dir, &["branch", "-m", &new_name, &old_name]);
                if out.success() {
                    eprintln!("{}", cformat!("  {repo}: <green>rolled back</>"));
                } else {
                    eprintln!(
                        "{}",
                        cformat!("  {repo}: <red>failed</> {}", out.stderr.trim())
                    );
                    failures.push(repo.clone());
                }
            }
            AbortAction::AlreadyReverted => {
                eprintln!("  {repo}: already on {old_name}");
            }
            AbortAction::SkipUnknown(branch) => {
                eprintln!(
                    "{}",
                    warning_message(format!(
                        "{repo}: on '{}', left untouched",
                        branch.as_deref().unwrap_or("(detached)")
                    ))
                );
            }
        }
    }

    if !failures.is_empty() {
        // Keep the migration state so the abort can be retried.
        return Err(ArbError::operation(format!(
            "abort incomplete in {}; retry `arb branch rename --abort`",
            failures.join(", ")
        ))
        .into());
    }

    workspace.config.branch = Some(old_name.clone());
    workspace.config.branch_rename_from = None;
    workspace.save_config()?;

    eprintln!(
        "{}",
        success_message(format!("Rename aborted; back on '{old_name}'"))
    );
    Ok(())
}

fn delete_remote_branches(workspace: &Workspace, ctx: &ArbContext, old_name: &str) {
    let cache = QueryCache::new();
    for repo in workspace.repos(ctx) {
        let dir = workspace.repo_dir(&repo);
        let Ok(roles) = cache.resolved_remotes(&dir) else {
            continue;
        };
        let out = git(&dir, &["push", &roles.share, "--delete", old_name]);
        if out.success() {
            eprintln!("  {repo}: deleted {}/{old_name}", roles.share);
        } else if !out.stderr.contains("remote ref does not exist") {
            eprintln!(
                "{}",
                warning_message(format!("{repo}: could not delete remote branch"))
            );
        }
    }
}

/// The workspace directory renames only when its name tracked the old
/// branch name, or the user asked explicitly.
fn rename_workspace_dir_target(
    workspace: &Workspace,
    old_name: &str,
    new_name: &str,
    opts: &RenameOptions<'_>,
) -> Option<String> {
    if let Some(explicit) = opts.workspace_name {
        return Some(explicit.to_string());
    }
    (workspace.name == old_name).then(|| new_name.to_string())
}

fn rename_workspace_dir(ctx: &ArbContext, workspace: &Workspace, new_name: &str) -> Result<()> {
    let new_dir = ctx.workspace_dir(new_name);
    if new_dir.exists() {
        return Err(ArbError::user(format!(
            "cannot rename workspace directory: '{new_name}' exists"
        ))
        .into());
    }
    std::fs::rename(&workspace.dir, &new_dir)?;

    // The worktree metadata in each canonical repo still points at the
    // old path; repair it.
    for repo in ctx.workspace_repos(new_name) {
        let canonical = ctx.canonical_repo_dir(&repo);
        let moved = new_dir.join(&repo);
        let moved_str = moved.to_string_lossy().to_string();
        let _ = git(&canonical, &["worktree", "repair", &moved_str]);
    }

    eprintln!("Workspace directory renamed to '{new_name}'.");
    Ok(())
}

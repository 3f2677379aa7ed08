//! `arb attach` / `arb detach`: grow or shrink a workspace.

use anyhow::Result;
use color_print::cformat;

use arborist::cache::QueryCache;
use arborist::context::ArbContext;
use arborist::error::ArbError;
use arborist::git::git;
use arborist::plan::confirm_or_abort;
use arborist::status::{GatherParams, gather_status, would_lose_work};
use arborist::styling::{eprintln, success_message, warning_message};
use arborist::workspace::Workspace;

use super::{create, template};
use crate::cli::MutationArgs;

pub fn handle_attach(ctx: &ArbContext, repos: &[String], args: &MutationArgs) -> Result<()> {
    let workspace = Workspace::open(ctx, None)?;
    let branch = workspace.branch().to_string();

    let repos: Vec<String> = if repos.is_empty() {
        // Default: every canonical repo not yet attached.
        let attached = workspace.repos(ctx);
        ctx.canonical_repos()
            .into_iter()
            .filter(|r| !attached.contains(r))
            .collect()
    } else {
        repos.to_vec()
    };
    if repos.is_empty() {
        eprintln!("Nothing to attach.");
        return Ok(());
    }

    for repo in &repos {
        if !ctx.canonical_repo_dir(repo).join(".git").exists() {
            return Err(ArbError::user(format!("no canonical repo named '{repo}'")).into());
        }
        if workspace.repo_dir(repo).exists() {
            return Err(ArbError::user(format!("'{repo}' is already attached")).into());
        }
    }

    if args.dry_run {
        eprintln!("Would attach: {}", repos.join(", "));
        return Ok(());
    }

    let cache = QueryCache::new();
    for repo in &repos {
        create::add_worktree(
            ctx,
            &cache,
            &workspace.dir,
            repo,
            &branch,
            workspace.base(),
        )?;
        eprintln!("{}", cformat!("  <green>+</> {repo}"));
    }

    if let Err(e) = template::apply_all(ctx, &workspace.name) {
        eprintln!("{}", warning_message(format!("template apply failed: {e}")));
    }

    eprintln!(
        "{}",
        success_message(format!("Attached {} repo(s)", repos.len()))
    );
    Ok(())
}

pub fn handle_detach(ctx: &ArbContext, repos: &[String], args: &MutationArgs) -> Result<()> {
    let workspace = Workspace::open(ctx, None)?;
    let branch = workspace.branch().to_string();
    let cache = QueryCache::new();

    if repos.is_empty() {
        return Err(ArbError::user("name the repo(s) to detach").into());
    }
    for repo in repos {
        if !workspace.repo_dir(repo).exists() {
            return Err(ArbError::user(format!("'{repo}' is not attached")).into());
        }
    }

    // The same gate as delete, per repo.
    if !args.force {
        let mut at_risk = Vec::new();
        for repo in repos {
            let dir = workspace.repo_dir(repo);
            let remotes = cache.resolved_remotes(&dir).ok();
            let status = gather_status(&GatherParams {
                name: repo,
                worktree_dir: &dir,
                config_base: workspace.base(),
                remotes: remotes.as_ref(),
                cache: &cache,
            });
            if would_lose_work(&status, &branch) {
                at_risk.push(repo.clone());
            }
        }
        if !at_risk.is_empty() {
            return Err(ArbError::operation(format!(
                "Refusing to detach: {} would lose work. Use --force to override.",
                at_risk.join(", ")
            ))
            .into());
        }
    }

    if args.dry_run {
        eprintln!("Would detach: {}", repos.join(", "));
        return Ok(());
    }
    if !args.yes && !args.force {
        confirm_or_abort(&format!("Detach {} repo(s)?", repos.len()))?;
    }

    for repo in repos {
        let canonical = ctx.canonical_repo_dir(repo);
        let worktree = workspace.repo_dir(repo);
        let worktree_str = worktree.to_string_lossy().to_string();

        if canonical.join(".git").exists() {
            let mut cmd_args = vec!["worktree", "remove"];
            if args.force {
                cmd_args.push("--force");
            }
            cmd_args.push(&worktree_str);
            let out = git(&canonical, &cmd_args);
            if !out.success() {
                return Err(ArbError::operation(format!(
                    "failed to detach {repo}:\n{}",
                    out.stderr.trim()
                ))
                .into());
            }
            let _ = git(&canonical, &["worktree", "prune"]);
        } else if worktree.exists() {
            std::fs::remove_dir_all(&worktree)?;
        }
        eprintln!("{}", cformat!("  <red>-</> {repo}"));
    }

    // Templates re-render after the removal so {{ repos }} reflects the
    // post-detach list.
    if let Err(e) = template::apply_all(ctx, &workspace.name) {
        eprintln!("{}", warning_message(format!("template apply failed: {e}")));
    }

    eprintln!(
        "{}",
        success_message(format!("Detached {} repo(s)", repos.len()))
    );
    Ok(())
}

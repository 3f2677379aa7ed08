//! `arb create`: create a workspace and grow one worktree per repo.

use std::path::Path;

use anyhow::Result;
use color_print::cformat;

use arborist::cache::QueryCache;
use arborist::context::ArbContext;
use arborist::error::ArbError;
use arborist::git::{git, queries};
use arborist::styling::{eprintln, success_message, warning_message};
use arborist::workspace::WorkspaceConfig;

use super::template;

pub struct CreateOptions<'a> {
    pub name: &'a str,
    pub repos: &'a [String],
    pub branch: Option<&'a str>,
    pub base: Option<&'a str>,
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains(std::path::MAIN_SEPARATOR)
    {
        return Err(ArbError::user(format!("invalid workspace name '{name}'")).into());
    }
    Ok(())
}

pub fn handle_create(ctx: &ArbContext, opts: &CreateOptions<'_>) -> Result<()> {
    validate_name(opts.name)?;

    let ws_dir = ctx.workspace_dir(opts.name);
    if ws_dir.exists() {
        return Err(ArbError::user(format!("'{}' already exists", opts.name)).into());
    }

    let repos: Vec<String> = if opts.repos.is_empty() {
        ctx.canonical_repos()
    } else {
        opts.repos.to_vec()
    };
    if repos.is_empty() {
        return Err(ArbError::user(
            "no canonical repos; clone one first with arb repo clone",
        )
        .into());
    }
    for repo in &repos {
        if !ctx.canonical_repo_dir(repo).join(".git").exists() {
            return Err(ArbError::user(format!("no canonical repo named '{repo}'")).into());
        }
    }

    let branch = opts.branch.unwrap_or(opts.name);

    std::fs::create_dir_all(&ws_dir)?;
    let config = WorkspaceConfig {
        branch: Some(branch.to_string()),
        base: opts.base.map(String::from),
        branch_rename_from: None,
    };
    config.save(&ws_dir)?;

    let cache = QueryCache::new();
    for repo in &repos {
        add_worktree(ctx, &cache, &ws_dir, repo, branch, opts.base)?;
        eprintln!(
            "{}",
            cformat!("  <green>+</> {repo} <bright-black>on {branch}</>")
        );
    }

    if let Err(e) = template::apply_all(ctx, opts.name) {
        eprintln!("{}", warning_message(format!("template apply failed: {e}")));
    }

    eprintln!(
        "{}",
        success_message(cformat!(
            "Created workspace <bold>{}</> ({} repo(s))",
            opts.name,
            repos.len()
        ))
    );
    Ok(())
}

/// Grow one linked worktree from the canonical repo.
///
/// Reuses an existing local branch; otherwise branches from the base ref
/// (configured base when resolvable, else the base remote's default
/// branch, else HEAD).
pub(crate) fn add_worktree(
    ctx: &ArbContext,
    cache: &QueryCache,
    ws_dir: &Path,
    repo: &str,
    branch: &str,
    base: Option<&str>,
) -> Result<()> {
    let canonical = ctx.canonical_repo_dir(repo);
    let target = ws_dir.join(repo);
    let target_str = target.to_string_lossy().to_string();

    let out = if queries::local_branch_exists(&canonical, branch) {
        git(&canonical, &["worktree", "add", &target_str, branch])
    } else {
        // --no-track: without it git would set the new branch's upstream
        // to the start point, and the share section would then measure
        // against the base ref instead of the share remote's copy.
        let start = start_point(&canonical, cache, base);
        let mut args = vec!["worktree", "add", "--no-track", &target_str, "-b", branch];
        if let Some(start) = &start {
            args.push(start);
        }
        git(&canonical, &args)
    };

    if !out.success() {
        return Err(ArbError::operation(format!(
            "failed to add worktree for {repo}:\n{}",
            out.stderr.trim()
        ))
        .into());
    }
    Ok(())
}

fn start_point(canonical: &Path, cache: &QueryCache, base: Option<&str>) -> Option<String> {
    let roles = cache.resolved_remotes(canonical).ok();

    if let Some(base) = base {
        if let Some(roles) = &roles {
            let candidate = format!("{}/{base}", roles.base);
            if queries::ref_exists(canonical, &candidate) {
                return Some(candidate);
            }
        }
        if queries::local_branch_exists(canonical, base) {
            return Some(base.to_string());
        }
    }

    let roles = roles?;
    let default = cache.default_branch(canonical, &roles.base)?;
    let candidate = format!("{}/{default}", roles.base);
    queries::ref_exists(canonical, &candidate).then_some(candidate)
}

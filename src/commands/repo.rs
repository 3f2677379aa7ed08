//! `arb repo clone` / `arb repo list`: canonical clone management.

use anyhow::Result;
use color_print::cformat;

use arborist::context::ArbContext;
use arborist::error::ArbError;
use arborist::git::git;
use arborist::git::queries;
use arborist::styling::{eprintln, println, success_message};

/// Derive a directory name from a clone URL (`…/api.git` → `api`).
fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then(|| name.to_string())
}

pub fn handle_repo_clone(ctx: &ArbContext, url: &str, name: Option<&str>) -> Result<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => repo_name_from_url(url).ok_or_else(|| {
            ArbError::user(format!("cannot derive a repo name from '{url}'; pass one"))
        })?,
    };

    let target = ctx.canonical_repo_dir(&name);
    if target.exists() {
        return Err(ArbError::user(format!("repo '{name}' already exists")).into());
    }
    std::fs::create_dir_all(ctx.repos_dir())?;

    eprintln!("Cloning {url} into .arb/repos/{name}…");
    let target_str = target.to_string_lossy().to_string();
    let out = git(&ctx.repos_dir(), &["clone", url, &target_str]);
    if !out.success() {
        return Err(ArbError::environment(format!(
            "clone failed:\n{}",
            out.stderr.trim()
        ))
        .into());
    }

    eprintln!("{}", success_message(format!("Cloned {name}")));
    Ok(())
}

pub fn handle_repo_list(ctx: &ArbContext) -> Result<()> {
    let repos = ctx.canonical_repos();
    if repos.is_empty() {
        eprintln!("No canonical repos. Clone one with: arb repo clone <url>");
        return Ok(());
    }
    for name in repos {
        let dir = ctx.canonical_repo_dir(&name);
        let url = queries::remote_url(&dir, "origin")
            .or_else(|| {
                queries::remote_names(&dir)
                    .first()
                    .and_then(|r| queries::remote_url(&dir, r))
            })
            .unwrap_or_else(|| "(no remote)".to_string());
        println!("{}", cformat!("<bold>{name}</>\t{url}"));
    }
    Ok(())
}

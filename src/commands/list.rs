//! `arb list`: workspaces at a glance.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use color_print::cformat;
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::Serialize;

use arborist::context::ArbContext;
use arborist::git::queries;
use arborist::styling::{eprintln, pad_visual, println};
use arborist::workspace::Workspace;

#[derive(Serialize, JsonSchema)]
struct WorkspaceRow {
    workspace: String,
    branch: String,
    base: Option<String>,
    repos: u64,
    last_commit: Option<DateTime<FixedOffset>>,
}

fn gather_rows(ctx: &ArbContext) -> Result<Vec<WorkspaceRow>> {
    let names = ctx.workspaces();
    let mut rows = names
        .par_iter()
        .map(|name| -> Result<WorkspaceRow> {
            let workspace = Workspace::open(ctx, Some(name))?;
            let repos = workspace.repos(ctx);
            let last_commit = repos
                .iter()
                .filter_map(|r| queries::commit_time(&workspace.repo_dir(r), "HEAD"))
                .max();
            Ok(WorkspaceRow {
                workspace: name.clone(),
                branch: workspace.branch().to_string(),
                base: workspace.base().map(String::from),
                repos: repos.len() as u64,
                last_commit,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    rows.sort_by(|a, b| a.workspace.cmp(&b.workspace));
    Ok(rows)
}

pub fn handle_list(ctx: &ArbContext, json: bool) -> Result<()> {
    let rows = gather_rows(ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        eprintln!("No workspaces. Create one with: arb create <name>");
        return Ok(());
    }

    let name_w = rows.iter().map(|r| r.workspace.len()).max().unwrap_or(0);
    let branch_w = rows.iter().map(|r| r.branch.len()).max().unwrap_or(0);
    for row in &rows {
        let name = pad_visual(&row.workspace, name_w);
        let branch = pad_visual(&row.branch, branch_w);
        let base = row
            .base
            .as_deref()
            .map(|b| format!(" (on {b})"))
            .unwrap_or_default();
        let age = row.last_commit.map(relative_age).unwrap_or_default();
        eprintln!(
            "{}",
            cformat!(
                "<bold>{name}</>  {branch}{base}  <bright-black>{} repo(s)  {age}</>",
                row.repos
            )
        );
    }
    Ok(())
}

fn relative_age(ts: DateTime<FixedOffset>) -> String {
    let delta = Utc::now().signed_duration_since(ts.with_timezone(&Utc));
    let minutes = delta.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 60 * 24 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (60 * 24))
    }
}

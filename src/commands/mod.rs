//! Command handlers: thin shells over the core subsystems.

use std::path::PathBuf;

use anyhow::Result;
use color_print::cformat;

use arborist::cache::QueryCache;
use arborist::context::ArbContext;
use arborist::fetch::FetchRequest;
use arborist::plan::{Outcome, PlanRow};
use arborist::status::filter::Filter;
use arborist::styling::pad_visual;
use arborist::summary::{self, RepoReport, WorkspaceSummary};
use arborist::workspace::Workspace;

mod attach;
pub(crate) mod branch;
pub(crate) mod create;
mod delete;
mod init;
mod integrate_cmd;
mod list;
mod misc;
mod repo;
pub(crate) mod status_cmd;
mod sync_cmd;
mod template;

pub use attach::{handle_attach, handle_detach};
pub use branch::{handle_branch, handle_branch_rename};
pub use create::handle_create;
pub use delete::{handle_clean, handle_delete};
pub use init::handle_init;
pub use integrate_cmd::handle_integrate;
pub use list::handle_list;
pub use misc::{handle_exec, handle_logdiff, handle_open, handle_path};
pub use repo::{handle_repo_clone, handle_repo_list};
pub use status_cmd::handle_status;
pub use sync_cmd::{handle_pull, handle_push};
pub use template::handle_template;

/// Everything the mutating planners share: context, workspace, request
/// cache, and the parsed `--where` filter.
pub(crate) struct WorkspaceTarget {
    pub ctx: ArbContext,
    pub workspace: Workspace,
    pub cache: QueryCache,
    pub filter: Option<Filter>,
}

impl WorkspaceTarget {
    pub fn open(
        ctx: ArbContext,
        name: Option<&str>,
        filter_expr: Option<&str>,
    ) -> Result<Self> {
        let workspace = Workspace::open(&ctx, name)?;
        let filter = filter_expr.map(Filter::parse).transpose()?;
        Ok(WorkspaceTarget {
            ctx,
            workspace,
            cache: QueryCache::new(),
            filter,
        })
    }

    /// Gather a fresh summary and drop repos the filter rejects.
    pub fn summarize(&self) -> WorkspaceSummary {
        let mut summary =
            summary::summarize(&self.ctx, &self.workspace, &self.cache, None);
        if let Some(filter) = &self.filter {
            summary.repos.retain(|r| filter.matches(&r.flags));
        }
        summary
    }

    /// Fetch requests covering every selected repo's distinct remotes.
    pub fn fetch_requests(&self) -> Vec<FetchRequest> {
        self.workspace
            .repos(&self.ctx)
            .into_iter()
            .filter_map(|name| {
                let dir = self.workspace.repo_dir(&name);
                let roles = self.cache.resolved_remotes(&dir).ok()?;
                let mut remotes = vec![roles.base.clone()];
                if roles.share != roles.base {
                    remotes.push(roles.share.clone());
                }
                Some(FetchRequest {
                    repo: name,
                    dir,
                    remotes,
                    base_remote: Some(roles.base),
                })
            })
            .collect()
    }

    pub fn expected_branch(&self) -> String {
        self.workspace.branch().to_string()
    }
}

/// Widest repo name, for plan column alignment.
fn name_width(names: impl Iterator<Item = usize>) -> usize {
    names.max().unwrap_or(0)
}

/// Render plan rows as an aligned table under a title line.
///
/// `extra` renders the per-row trailing detail for `will` rows.
pub(crate) fn format_plan<T>(
    title: &str,
    rows: &[PlanRow<T>],
    extra: impl Fn(&PlanRow<T>) -> String,
) -> String {
    let width = name_width(rows.iter().map(|r| r.repo.len()));
    let mut lines = vec![title.to_string()];
    for row in rows {
        let name = pad_visual(&row.repo, width);
        let mut line = match &row.outcome {
            Outcome::Will { verb } => {
                let detail = extra(row);
                if detail.is_empty() {
                    cformat!("  {name}  <green>{verb}</>")
                } else {
                    cformat!("  {name}  <green>{verb}</>  <bright-black>{detail}</>")
                }
            }
            Outcome::UpToDate => cformat!("  {name}  <bright-black>up to date</>"),
            Outcome::Skip { reason } => {
                cformat!("  {name}  <yellow>skip</>  <bright-black>{reason}</>")
            }
        };
        if row.shallow {
            line.push_str(&cformat!(" <yellow>[shallow]</>"));
        }
        if let Some(prediction) = &row.conflict
            && prediction.is_conflict()
        {
            line.push_str(&cformat!(" <yellow>[conflict likely]</>"));
        }
        if row.needs_stash {
            if row.stash_pop_conflicts.is_empty() {
                line.push_str(&cformat!(" <bright-black>[autostash]</>"));
            } else {
                line.push_str(&cformat!(" <yellow>[stash pop conflict likely]</>"));
            }
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Snapshot one report into the common plan-row fields.
pub(crate) fn row_from_report<T>(
    report: &RepoReport,
    dir: PathBuf,
    outcome: Outcome,
    detail: T,
) -> PlanRow<T> {
    let mut row = PlanRow::new(report.status.name.clone(), dir, outcome, detail);
    row.shallow = report.flags.is_shallow;
    row.head_sha = arborist::git::queries::head_sha(&row.repo_dir);
    row
}

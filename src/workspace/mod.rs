//! Workspaces: named directories of parallel worktrees on one feature
//! branch.

use std::path::PathBuf;

use anyhow::Result;

use crate::context::ArbContext;

mod config;

pub use config::WorkspaceConfig;

/// A resolved workspace: its name, directory, and parsed config.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub name: String,
    pub dir: PathBuf,
    pub config: WorkspaceConfig,
}

impl Workspace {
    /// Open a workspace by name (or the current one when `name` is `None`).
    pub fn open(ctx: &ArbContext, name: Option<&str>) -> Result<Self> {
        let name = ctx.resolve_workspace(name)?;
        let dir = ctx.workspace_dir(&name);
        let config = WorkspaceConfig::load(&dir)?;
        Ok(Workspace { name, dir, config })
    }

    /// The feature branch, falling back to the workspace name when the
    /// config is missing the key (a workspace mid-creation or hand-built).
    pub fn branch(&self) -> &str {
        self.config.branch.as_deref().unwrap_or(&self.name)
    }

    /// The configured base branch for stacked workspaces.
    pub fn base(&self) -> Option<&str> {
        self.config.base.as_deref()
    }

    /// Repo worktree names, sorted.
    pub fn repos(&self, ctx: &ArbContext) -> Vec<String> {
        ctx.workspace_repos(&self.name)
    }

    /// Worktree directory for one repo.
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.dir.join(repo)
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.dir)
    }
}

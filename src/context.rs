//! Arb root discovery and the per-invocation context.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::ArbError;

/// Marker directory that identifies the arb root.
pub const ARB_DIR: &str = ".arb";
/// Marker directory that identifies a workspace.
pub const WS_DIR: &str = ".arbws";
/// Canonical clones live here, under the arb root.
pub const REPOS_SUBDIR: &str = "repos";

/// Everything path-shaped a command needs, resolved once per invocation.
///
/// Created in `main` from the working directory (or `-C <dir>`) and
/// threaded through every component. All other state is request-scoped.
#[derive(Debug, Clone)]
pub struct ArbContext {
    root: PathBuf,
    /// Name of the workspace the invocation started inside, if any.
    current_workspace: Option<String>,
}

impl ArbContext {
    /// Walk upward from `start` until a directory containing `.arb/` is
    /// found.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = dunce::canonicalize(start)
            .map_err(|e| ArbError::user(format!("cannot resolve {}: {e}", start.display())))?;

        let mut dir: &Path = &start;
        loop {
            if dir.join(ARB_DIR).is_dir() {
                let root = dir.to_path_buf();
                let current_workspace = workspace_of(&root, &start);
                return Ok(ArbContext {
                    root,
                    current_workspace,
                });
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => {
                    return Err(ArbError::user(
                        "not inside an arb root (no .arb directory found; run `arb init` first)",
                    )
                    .into());
                }
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.root.join(ARB_DIR).join(REPOS_SUBDIR)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(ARB_DIR).join("templates")
    }

    pub fn workspace_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn canonical_repo_dir(&self, name: &str) -> PathBuf {
        self.repos_dir().join(name)
    }

    /// The workspace the command was run from, if any.
    pub fn current_workspace(&self) -> Option<&str> {
        self.current_workspace.as_deref()
    }

    /// Resolve a workspace argument: explicit name, else the workspace the
    /// invocation started in.
    pub fn resolve_workspace(&self, name: Option<&str>) -> Result<String> {
        if let Some(name) = name {
            if !self.workspace_dir(name).join(WS_DIR).is_dir() {
                return Err(ArbError::user(format!("no workspace named '{name}'")).into());
            }
            return Ok(name.to_string());
        }
        self.current_workspace
            .clone()
            .ok_or_else(|| {
                ArbError::user("not inside a workspace (name one explicitly)").into()
            })
    }

    /// Workspace names, sorted.
    pub fn workspaces(&self) -> Vec<String> {
        let mut names = read_marked_dirs(&self.root, |p| p.join(WS_DIR).is_dir());
        names.sort();
        names
    }

    /// Canonical repo names, sorted.
    pub fn canonical_repos(&self) -> Vec<String> {
        let mut names = read_marked_dirs(&self.repos_dir(), |p| p.join(".git").exists());
        names.sort();
        names
    }

    /// Repo worktree names inside a workspace, sorted lexicographically,
    /// excluding the `.arbws` marker.
    pub fn workspace_repos(&self, workspace: &str) -> Vec<String> {
        let ws_dir = self.workspace_dir(workspace);
        let mut names = read_marked_dirs(&ws_dir, |p| p.join(".git").exists());
        names.retain(|n| n != WS_DIR);
        names.sort();
        names
    }
}

fn workspace_of(root: &Path, start: &Path) -> Option<String> {
    let relative = start.strip_prefix(root).ok()?;
    let first = relative.components().next()?;
    let name = first.as_os_str().to_str()?.to_string();
    root.join(&name).join(WS_DIR).is_dir().then_some(name)
}

fn read_marked_dirs(dir: &Path, keep: impl Fn(&Path) -> bool) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter(|e| keep(&e.path()))
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| !n.starts_with('.'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".arb/repos")).unwrap();
        std::fs::create_dir_all(tmp.path().join("fix-login/.arbws")).unwrap();
        std::fs::create_dir_all(tmp.path().join("fix-login/api/.git")).unwrap();
        tmp
    }

    #[test]
    fn discovers_root_from_nested_dir() {
        let tmp = scaffold();
        let nested = tmp.path().join("fix-login/api");
        let ctx = ArbContext::discover(&nested).unwrap();
        assert_eq!(ctx.root(), dunce::canonicalize(tmp.path()).unwrap());
        assert_eq!(ctx.current_workspace(), Some("fix-login"));
    }

    #[test]
    fn no_workspace_at_root() {
        let tmp = scaffold();
        let ctx = ArbContext::discover(tmp.path()).unwrap();
        assert_eq!(ctx.current_workspace(), None);
        assert!(ctx.resolve_workspace(None).is_err());
        assert_eq!(
            ctx.resolve_workspace(Some("fix-login")).unwrap(),
            "fix-login"
        );
        assert!(ctx.resolve_workspace(Some("missing")).is_err());
    }

    #[test]
    fn lists_workspaces_and_repos_sorted() {
        let tmp = scaffold();
        std::fs::create_dir_all(tmp.path().join("add-audit/.arbws")).unwrap();
        std::fs::create_dir_all(tmp.path().join(".arb/repos/api/.git")).unwrap();
        std::fs::create_dir_all(tmp.path().join(".arb/repos/web/.git")).unwrap();
        // A stray non-repo dir under repos/ is ignored.
        std::fs::create_dir_all(tmp.path().join(".arb/repos/notes")).unwrap();
        let ctx = ArbContext::discover(tmp.path()).unwrap();
        assert_eq!(ctx.workspaces(), vec!["add-audit", "fix-login"]);
        assert_eq!(ctx.canonical_repos(), vec!["api", "web"]);
        assert_eq!(ctx.workspace_repos("fix-login"), vec!["api"]);
    }

    #[test]
    fn discovery_fails_outside_any_root() {
        let tmp = tempfile::tempdir().unwrap();
        // Guard against the test host itself living under an arb root.
        if ArbContext::discover(tmp.path()).is_ok() {
            return;
        }
        assert!(ArbContext::discover(tmp.path()).is_err());
    }
}

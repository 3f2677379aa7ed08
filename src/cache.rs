//! Request-scoped query cache.
//!
//! One instance per command invocation. Memoises the in-flight computation
//! (not just the value): concurrent callers for the same key block on a
//! single git call via `OnceCell`, so the parallel status gather never
//! duplicates remote lookups. Nothing here survives the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::git::queries;
use crate::remotes::{RemoteError, RepoRemotes, resolve_remotes};

type Slot<V> = Arc<OnceCell<V>>;

#[derive(Debug, Default)]
pub struct QueryCache {
    remote_names: DashMap<PathBuf, Slot<Vec<String>>>,
    resolved: DashMap<PathBuf, Slot<Result<RepoRemotes, RemoteError>>>,
    default_branch: DashMap<(PathBuf, String), Slot<Option<String>>>,
    remote_url: DashMap<(PathBuf, String), Slot<Option<String>>>,
}

/// Fetch the slot first, then initialise outside the map guard so the
/// shard lock is never held across a git call.
fn coalesce<K, V>(map: &DashMap<K, Slot<V>>, key: K, init: impl FnOnce() -> V) -> V
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    let slot = map.entry(key).or_default().clone();
    slot.get_or_init(init).clone()
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote_names(&self, repo_dir: &Path) -> Vec<String> {
        coalesce(&self.remote_names, repo_dir.to_path_buf(), || {
            queries::remote_names(repo_dir)
        })
    }

    pub fn resolved_remotes(&self, repo_dir: &Path) -> Result<RepoRemotes, RemoteError> {
        coalesce(&self.resolved, repo_dir.to_path_buf(), || {
            resolve_remotes(repo_dir)
        })
    }

    pub fn default_branch(&self, repo_dir: &Path, remote: &str) -> Option<String> {
        coalesce(
            &self.default_branch,
            (repo_dir.to_path_buf(), remote.to_string()),
            || queries::default_branch(repo_dir, remote),
        )
    }

    pub fn remote_url(&self, repo_dir: &Path, remote: &str) -> Option<String> {
        coalesce(
            &self.remote_url,
            (repo_dir.to_path_buf(), remote.to_string()),
            || queries::remote_url(repo_dir, remote),
        )
    }

    /// Drop entries a fetch may have changed (the default-branch symref is
    /// refreshed by `remote set-head --auto`). Remote names and URLs are
    /// stable across fetches and survive.
    pub fn invalidate_after_fetch(&self) {
        self.default_branch.clear();
    }
}

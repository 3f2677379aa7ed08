//! Remote role resolution.
//!
//! Classifies a repo's remotes into two roles: *base* (provides the
//! integration branch, conventionally `upstream` in fork workflows) and
//! *share* (where the feature branch is published, conventionally
//! `origin`). `remote.pushDefault` is the authoritative hint when the
//! convention doesn't decide.

use std::path::Path;

use crate::git::queries;

/// The two remote roles of a repo. In single-remote repos both roles name
/// the same remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRemotes {
    pub base: String,
    pub share: String,
}

impl RepoRemotes {
    /// Whether base and share are distinct remotes (fork workflow).
    pub fn is_fork(&self) -> bool {
        self.base != self.share
    }
}

/// Why roles could not be resolved. `NoRemotes` (a local-only repo) is
/// distinguishable from genuine ambiguity so status can degrade instead of
/// erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    NoRemotes,
    Ambiguous {
        message: String,
        hint: Option<String>,
    },
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::NoRemotes => write!(f, "repo has no remotes"),
            RemoteError::Ambiguous { message, hint } => {
                write!(f, "{message}")?;
                if let Some(hint) = hint {
                    write!(f, " ({hint})")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for RemoteError {}

/// Resolve the remote roles of the repo at `dir`.
pub fn resolve_remotes(dir: &Path) -> Result<RepoRemotes, RemoteError> {
    let names = queries::remote_names(dir);
    let push_default = queries::config_get(dir, "remote.pushDefault");
    classify(&names, push_default.as_deref())
}

/// Pure classification, first match wins:
///
/// 1. exactly one remote → both roles
/// 2. valid `remote.pushDefault` → share; base = the only other remote,
///    else a remote named `upstream`, else ambiguous
/// 3. exactly `{upstream, origin}` → `{base: upstream, share: origin}`
/// 4. two remotes incl. `origin`, no pushDefault → guided error
/// 5. anything else → ambiguous
pub fn classify(names: &[String], push_default: Option<&str>) -> Result<RepoRemotes, RemoteError> {
    if names.is_empty() {
        return Err(RemoteError::NoRemotes);
    }

    if names.len() == 1 {
        return Ok(RepoRemotes {
            base: names[0].clone(),
            share: names[0].clone(),
        });
    }

    let has = |name: &str| names.iter().any(|n| n == name);

    if let Some(push_default) = push_default
        && has(push_default)
    {
        let others: Vec<&String> = names.iter().filter(|n| *n != push_default).collect();
        let base = if others.len() == 1 {
            others[0].clone()
        } else if has("upstream") && push_default != "upstream" {
            "upstream".to_string()
        } else {
            return Err(RemoteError::Ambiguous {
                message: format!(
                    "cannot pick a base remote among {} (share = {push_default})",
                    names.join(", ")
                ),
                hint: None,
            });
        };
        return Ok(RepoRemotes {
            base,
            share: push_default.to_string(),
        });
    }

    if names.len() == 2 && has("upstream") && has("origin") {
        return Ok(RepoRemotes {
            base: "upstream".to_string(),
            share: "origin".to_string(),
        });
    }

    if names.len() == 2 && has("origin") {
        let other = names.iter().find(|n| *n != "origin").expect("two remotes");
        return Err(RemoteError::Ambiguous {
            message: format!("two remotes (origin, {other}) with no push default"),
            hint: Some(format!(
                "set one with: git config remote.pushDefault {other}"
            )),
        });
    }

    Err(RemoteError::Ambiguous {
        message: format!("cannot infer remote roles from {}", names.join(", ")),
        hint: Some("set remote.pushDefault to name the share remote".to_string()),
    })
}

//! The `.arbws/config` file.
//!
//! Line-oriented ASCII, `\n`-terminated lines of exactly `<key> = <value>`.
//! Recognised keys: `branch` (required after creation), `base` (stacked
//! workspaces), `branch_rename_from` (present only mid-rename). Unknown
//! keys are ignored; a missing file means the branch must be inferred.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::context::WS_DIR;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub branch: Option<String>,
    pub base: Option<String>,
    pub branch_rename_from: Option<String>,
}

impl WorkspaceConfig {
    pub fn path(workspace_dir: &Path) -> PathBuf {
        workspace_dir.join(WS_DIR).join("config")
    }

    /// Load from a workspace directory. A missing file yields the default.
    pub fn load(workspace_dir: &Path) -> Result<Self> {
        let path = Self::path(workspace_dir);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).context(format!("failed to read {}", path.display())),
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "branch" => config.branch = Some(value.to_string()),
                "base" => config.base = Some(value.to_string()),
                "branch_rename_from" => config.branch_rename_from = Some(value.to_string()),
                _ => {} // Unknown keys are ignored.
            }
        }
        config
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in [
            ("branch", &self.branch),
            ("base", &self.base),
            ("branch_rename_from", &self.branch_rename_from),
        ] {
            if let Some(value) = value {
                out.push_str(&format!("{key} = {value}\n"));
            }
        }
        out
    }

    /// Write atomically (write-then-rename into `.arbws/`).
    pub fn save(&self, workspace_dir: &Path) -> Result<()> {
        let path = Self::path(workspace_dir);
        let dir = path
            .parent()
            .expect("config path always has a parent");
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to stage config in {}", dir.display()))?;
        tmp.write_all(self.render().as_bytes())?;
        tmp.persist(&path)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
        Ok(())
    }

    /// Whether a branch rename is mid-flight.
    pub fn rename_in_progress(&self) -> bool {
        self.branch_rename_from.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognised_keys() {
        let config = WorkspaceConfig::parse("branch = fix-login\nbase = release-2\n");
        assert_eq!(config.branch.as_deref(), Some("fix-login"));
        assert_eq!(config.base.as_deref(), Some("release-2"));
        assert_eq!(config.branch_rename_from, None);
    }

    #[test]
    fn parse_ignores_unknown_keys_and_junk() {
        let config = WorkspaceConfig::parse("color = green\nbranch = x\nnot a kv line\n");
        assert_eq!(config.branch.as_deref(), Some("x"));
    }

    #[test]
    fn roundtrip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = WorkspaceConfig {
            branch: Some("fix-login".into()),
            base: None,
            branch_rename_from: None,
        };
        config.save(tmp.path()).unwrap();

        let raw = std::fs::read_to_string(WorkspaceConfig::path(tmp.path())).unwrap();
        assert_eq!(raw, "branch = fix-login\n");

        let loaded = WorkspaceConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_default() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = WorkspaceConfig::load(tmp.path()).unwrap();
        assert_eq!(loaded, WorkspaceConfig::default());
    }

    #[test]
    fn rename_state_survives_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = WorkspaceConfig {
            branch: Some("new-name".into()),
            base: Some("release-2".into()),
            branch_rename_from: Some("old-name".into()),
        };
        config.save(tmp.path()).unwrap();
        let loaded = WorkspaceConfig::load(tmp.path()).unwrap();
        assert!(loaded.rename_in_progress());
        assert_eq!(loaded.branch_rename_from.as_deref(), Some("old-name"));

        // Clearing the key removes the line entirely.
        config.branch_rename_from = None;
        config.save(tmp.path()).unwrap();
        let raw = std::fs::read_to_string(WorkspaceConfig::path(tmp.path())).unwrap();
        assert!(!raw.contains("branch_rename_from"));
    }
}

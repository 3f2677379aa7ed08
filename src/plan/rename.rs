//! Branch-rename classification.
//!
//! The rename itself is non-atomic across repos; `.arbws/config`'s
//! `branch_rename_from` key carries the durable migration state between
//! `rename`, `--continue`, and `--abort`. These classifiers are pure so
//! every transition is unit-testable.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameAction {
    /// Repo already carries the new name (a completed or re-run repo).
    AlreadyOnNew,
    WillRename,
    SkipDetached,
    /// On some unrelated branch; renaming would clobber user intent.
    SkipOtherBranch(String),
}

/// Classify one repo for a rename (or `--continue`) from `old` to `new`.
pub fn classify_rename(current_branch: Option<&str>, old: &str, new: &str) -> RenameAction {
    match current_branch {
        None => RenameAction::SkipDetached,
        Some(branch) if branch == new => RenameAction::AlreadyOnNew,
        Some(branch) if branch == old => RenameAction::WillRename,
        Some(branch) => RenameAction::SkipOtherBranch(branch.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortAction {
    /// On the new name: rename back.
    RollBack,
    /// Already back on the old name (rename never reached this repo, or a
    /// previous abort did).
    AlreadyReverted,
    /// Neither name; leave it alone and tell the user.
    SkipUnknown(Option<String>),
}

/// Classify one repo for `rename --abort` rolling back `new` to `old`.
pub fn classify_abort(current_branch: Option<&str>, old: &str, new: &str) -> AbortAction {
    match current_branch {
        Some(branch) if branch == new => AbortAction::RollBack,
        Some(branch) if branch == old => AbortAction::AlreadyReverted,
        other => AbortAction::SkipUnknown(other.map(String::from)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_transitions() {
        assert_eq!(
            classify_rename(Some("old"), "old", "new"),
            RenameAction::WillRename
        );
        assert_eq!(
            classify_rename(Some("new"), "old", "new"),
            RenameAction::AlreadyOnNew
        );
        assert_eq!(
            classify_rename(None, "old", "new"),
            RenameAction::SkipDetached
        );
        assert_eq!(
            classify_rename(Some("main"), "old", "new"),
            RenameAction::SkipOtherBranch("main".into())
        );
    }

    #[test]
    fn abort_transitions() {
        assert_eq!(classify_abort(Some("new"), "old", "new"), AbortAction::RollBack);
        assert_eq!(
            classify_abort(Some("old"), "old", "new"),
            AbortAction::AlreadyReverted
        );
        assert_eq!(
            classify_abort(Some("main"), "old", "new"),
            AbortAction::SkipUnknown(Some("main".into()))
        );
        assert_eq!(
            classify_abort(None, "old", "new"),
            AbortAction::SkipUnknown(None)
        );
    }

    #[test]
    fn continue_is_re_classification() {
        // After a partial rename, repos that made it classify
        // AlreadyOnNew and the stragglers WillRename; --continue retries
        // only the stragglers.
        let repos = [Some("new"), Some("old"), Some("old")];
        let remaining: Vec<_> = repos
            .iter()
            .filter(|b| classify_rename(**b, "old", "new") == RenameAction::WillRename)
            .collect();
        assert_eq!(remaining.len(), 2);
    }
}

//! Merge and squash-merge detection via patch-ids.
//!
//! Phase 1 (cheap): ancestry. Phase 2 (expensive, caller-gated): compare
//! the cumulative patch-id of the branch against per-commit patch-ids of
//! recent target commits. A squash merge lands the whole branch as one
//! commit whose patch-id equals the branch's cumulative patch-id, so a hit
//! identifies both the fact and the squash commit itself.

use std::collections::HashMap;
use std::path::Path;

use crate::git::{parse, queries};

use super::MergeKind;

/// How many recent target commits to scan for a squash match. Very
/// long-lived branches may be squashed further back than this and go
/// undetected.
const DEFAULT_PATCHID_WINDOW: usize = 200;

/// How many local cut points to try when looking for a partial squash
/// (commits made after the merge).
const MAX_CUT_POINTS: usize = 50;

pub fn patchid_window() -> usize {
    std::env::var("ARB_PATCHID_WINDOW")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PATCHID_WINDOW)
}

/// Result of a positive merge detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDetection {
    pub kind: MergeKind,
    /// The commit on the target that carries the squashed branch.
    pub merge_commit: Option<String>,
    /// Local commits made after the matched cut point (work since the
    /// merge). `None` when the entire branch was merged.
    pub new_commits_after_merge: Option<u64>,
    /// PR number sniffed from the squash commit's subject.
    pub detected_pr: Option<u64>,
}

/// Phase 1: `HEAD` already reachable from the target.
pub fn detect_merge(dir: &Path, head: &str, target_ref: &str) -> Option<MergeDetection> {
    if !queries::is_ancestor(dir, head, target_ref) {
        return None;
    }
    Some(MergeDetection {
        kind: MergeKind::Merge,
        merge_commit: None,
        new_commits_after_merge: None,
        detected_pr: None,
    })
}

/// Phase 2: cumulative-patch-id squash scan.
///
/// Walks cut points from `head` backwards so a branch with commits on top
/// of a squashed prefix still matches, reporting how many commits are new.
/// O(window + cut points) git invocations; callers gate this behind the
/// share-gone / share-up-to-date checks.
pub fn detect_squash(dir: &Path, head: &str, target_ref: &str) -> Option<MergeDetection> {
    let merge_base = queries::merge_base(dir, target_ref, head)?;

    let target_ids = target_patch_ids(dir, &merge_base, target_ref, patchid_window());
    if target_ids.is_empty() {
        return None;
    }

    // Newest first; index i means "i commits were made after this cut".
    let local_commits = queries::rev_list(dir, &format!("{merge_base}..{head}"));
    if local_commits.is_empty() {
        return None;
    }

    for (newer, cut) in local_commits.iter().take(MAX_CUT_POINTS).enumerate() {
        let Some(cumulative) = queries::range_patch_id(dir, &merge_base, cut) else {
            continue;
        };
        if let Some(squash_commit) = target_ids.get(&cumulative) {
            let detected_pr = queries::commit_subject(dir, squash_commit)
                .as_deref()
                .and_then(parse::parse_pr_number);
            return Some(MergeDetection {
                kind: MergeKind::Squash,
                merge_commit: Some(squash_commit.clone()),
                new_commits_after_merge: (newer > 0).then_some(newer as u64),
                detected_pr,
            });
        }
    }
    None
}

fn target_patch_ids(
    dir: &Path,
    merge_base: &str,
    target_ref: &str,
    window: usize,
) -> HashMap<String, String> {
    let commits = queries::rev_list(dir, &format!("{merge_base}..{target_ref}"));
    let mut ids = HashMap::new();
    for sha in commits.iter().take(window) {
        if let Some(id) = queries::commit_patch_id(dir, sha) {
            // Keep the oldest commit for duplicate patch-ids (reverts of
            // reverts); newest-first iteration means later inserts win.
            ids.insert(id, sha.clone());
        }
    }
    ids
}

/// How many commit pairs across the two ranges carry the same patch-id.
///
/// Used by the share section to distinguish "you rebased locally" from a
/// genuine divergence: local commits in `<share>..HEAD` matched against
/// remote commits in `HEAD..<share>`.
pub fn rebased_count(dir: &Path, local_range: &str, remote_range: &str) -> u64 {
    let local: Vec<String> = queries::rev_list(dir, local_range)
        .iter()
        .filter_map(|sha| queries::commit_patch_id(dir, sha))
        .collect();
    if local.is_empty() {
        return 0;
    }
    let remote: std::collections::HashSet<String> = queries::rev_list(dir, remote_range)
        .iter()
        .filter_map(|sha| queries::commit_patch_id(dir, sha))
        .collect();
    local.iter().filter(|id| remote.contains(*id)).count() as u64
}

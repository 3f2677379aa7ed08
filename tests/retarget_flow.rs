//! Stacked workspaces: squash-merged base detection and `rebase
//! --retarget`.

mod common;

use common::{Fixture, arb, assert_exit, assert_ok, git, stderr_of, write_and_commit};

/// A workspace `feat-a` stacked on server branch `feat-base`, with one
/// local commit. Returns the worktree path.
fn stacked_fixture(fixture: &Fixture) -> std::path::PathBuf {
    git(&fixture.seed, &["switch", "-c", "feat-base"]);
    write_and_commit(&fixture.seed, "base.txt", "base work\n", "base work");
    git(&fixture.seed, &["push", "-u", "origin", "feat-base"]);
    git(&fixture.canonical, &["fetch", "origin"]);

    let out = arb(
        &fixture.root,
        &["create", "feat-a", "api", "--base", "feat-base"],
    );
    assert_ok(&out);

    let wt = fixture.root.join("feat-a/api");
    write_and_commit(&wt, "a.txt", "stacked\n", "stacked work");
    wt
}

fn squash_base_into_main(fixture: &Fixture) {
    git(&fixture.seed, &["switch", "main"]);
    git(&fixture.seed, &["merge", "--squash", "feat-base"]);
    git(&fixture.seed, &["commit", "-m", "Land feat-base (#9)"]);
    git(&fixture.seed, &["push", "origin", "main"]);
}

#[test]
fn create_uses_configured_base_as_start_point() {
    let fixture = Fixture::with_repo("api");
    let wt = stacked_fixture(&fixture);

    // The worktree branched from origin/feat-base, not main.
    assert!(wt.join("base.txt").exists());
    let config = std::fs::read_to_string(fixture.root.join("feat-a/.arbws/config")).unwrap();
    assert_eq!(config, "branch = feat-a\nbase = feat-base\n");
}

#[test]
fn rebase_blocks_on_merged_base_without_retarget() {
    let fixture = Fixture::with_repo("api");
    stacked_fixture(&fixture);
    squash_base_into_main(&fixture);

    let ws = fixture.root.join("feat-a");
    let out = arb(&ws, &["rebase", "-y"]);
    assert_ok(&out); // nothing executable: the repo skipped
    assert!(stderr_of(&out).contains("--retarget"));
}

#[test]
fn retarget_replays_onto_default_and_clears_base() {
    let fixture = Fixture::with_repo("api");
    let wt = stacked_fixture(&fixture);
    squash_base_into_main(&fixture);

    let ws = fixture.root.join("feat-a");
    let out = arb(&ws, &["rebase", "--retarget", "-y"]);
    assert_ok(&out);

    // Replayed onto origin/main: the squash landed base.txt, our commit
    // sits on top.
    assert!(wt.join("a.txt").exists());
    assert!(wt.join("base.txt").exists());
    let origin_main = git(&wt, &["rev-parse", "origin/main"]);
    let parent = git(&wt, &["rev-parse", "HEAD~1"]);
    assert_eq!(parent, origin_main);
    assert_eq!(git(&wt, &["branch", "--show-current"]), "feat-a");

    // Retargeting to the default branch clears the base key.
    let config = std::fs::read_to_string(ws.join(".arbws/config")).unwrap();
    assert_eq!(config, "branch = feat-a\n");
    assert!(stderr_of(&out).contains("base cleared"));
}

#[test]
fn retarget_to_named_branch_updates_base() {
    let fixture = Fixture::with_repo("api");
    let wt = stacked_fixture(&fixture);

    // A second stacking candidate that contains feat-base.
    git(&fixture.seed, &["switch", "-c", "feat-base-2", "feat-base"]);
    write_and_commit(&fixture.seed, "base2.txt", "more base\n", "more base");
    git(&fixture.seed, &["push", "-u", "origin", "feat-base-2"]);

    let ws = fixture.root.join("feat-a");
    let out = arb(&ws, &["rebase", "--retarget", "feat-base-2", "-y"]);
    assert_ok(&out);

    assert!(wt.join("base2.txt").exists());
    let config = std::fs::read_to_string(ws.join(".arbws/config")).unwrap();
    assert_eq!(config, "branch = feat-a\nbase = feat-base-2\n");
}

#[test]
fn retarget_to_missing_branch_aborts_everything() {
    let fixture = Fixture::with_repo("api");
    stacked_fixture(&fixture);

    let ws = fixture.root.join("feat-a");
    let out = arb(&ws, &["rebase", "--retarget", "no-such-branch", "-y"]);
    assert_exit(&out, 1);
    assert!(stderr_of(&out).contains("retarget blocked"));
}

#[test]
fn dirty_repo_blocks_retarget_for_the_whole_workspace() {
    let fixture = Fixture::with_repo("api");
    let wt = stacked_fixture(&fixture);
    squash_base_into_main(&fixture);
    std::fs::write(wt.join("a.txt"), "uncommitted edit\n").unwrap();

    let ws = fixture.root.join("feat-a");
    let out = arb(&ws, &["rebase", "--retarget", "-y"]);
    assert_exit(&out, 1);
    let stderr = stderr_of(&out);
    assert!(stderr.contains("retarget blocked"));
    assert!(stderr.contains("--autostash"));

    // Nothing moved.
    assert_eq!(
        std::fs::read_to_string(wt.join("a.txt")).unwrap(),
        "uncommitted edit\n"
    );
}

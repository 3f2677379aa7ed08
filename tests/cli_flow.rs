//! End-to-end flows through the arb binary.

mod common;

use common::{
    Fixture, arb, assert_exit, assert_ok, git, stderr_of, stdout_of, write_and_commit,
};

#[test]
fn init_creates_root_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let out = arb(tmp.path(), &["init"]);
    assert_ok(&out);
    assert!(tmp.path().join(".arb/repos").is_dir());
    assert_eq!(
        std::fs::read_to_string(tmp.path().join(".arb/.gitignore")).unwrap(),
        "repos/\n"
    );

    // Re-init refuses.
    let out = arb(tmp.path(), &["init"]);
    assert_exit(&out, 1);
    assert!(stderr_of(&out).contains("already"));
}

#[test]
fn create_and_populate() {
    let fixture = Fixture::with_repo("api");

    let out = arb(
        &fixture.root,
        &["create", "fix-login", "api", "--branch", "fix-login"],
    );
    assert_ok(&out);

    // Config contains exactly the branch line.
    let config =
        std::fs::read_to_string(fixture.root.join("fix-login/.arbws/config")).unwrap();
    assert_eq!(config, "branch = fix-login\n");

    // A linked worktree on the feature branch.
    let wt = fixture.root.join("fix-login/api");
    assert!(wt.join(".git").is_file(), ".git should be a worktree link");
    assert_eq!(git(&wt, &["branch", "--show-current"]), "fix-login");
}

#[test]
fn path_prints_on_stdout_only() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));

    let out = arb(&fixture.root, &["path", "feat"]);
    assert_ok(&out);
    let expected = fixture.root.join("feat");
    assert_eq!(stdout_of(&out).trim(), expected.to_string_lossy());
}

#[test]
fn status_json_and_schema() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");

    let out = arb(&ws, &["status", "--json"]);
    assert_ok(&out);
    let value: serde_json::Value = serde_json::from_str(&stdout_of(&out)).unwrap();
    assert_eq!(value["workspace"], "feat");
    assert_eq!(value["branch"], "feat");
    assert_eq!(value["total"], 1);
    assert_eq!(value["repos"][0]["name"], "api");
    assert_eq!(value["repos"][0]["flags"]["isLocal"], false);

    let out = arb(&ws, &["status", "--schema"]);
    assert_ok(&out);
    let schema: serde_json::Value = serde_json::from_str(&stdout_of(&out)).unwrap();
    assert!(schema["properties"]["repos"].is_object());
}

#[test]
fn status_where_filter_rejects_unknown_terms() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");

    let out = arb(&ws, &["status", "--where", "bogus"]);
    assert_exit(&out, 1);
    let stderr = stderr_of(&out);
    assert!(stderr.contains("bogus"));
    assert!(stderr.contains("valid terms"));
}

#[test]
fn push_new_branch_then_idempotent() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");
    let wt = ws.join("api");

    // Nothing committed yet: nothing to push.
    let out = arb(&ws, &["push", "-y"]);
    assert_ok(&out);
    assert!(stderr_of(&out).contains("Nothing to push"));

    write_and_commit(&wt, "feature.txt", "work", "add feature");

    let out = arb(&ws, &["push", "-y"]);
    assert_ok(&out);
    assert!(stderr_of(&out).contains("push (new branch)"));
    assert_eq!(
        git(&fixture.canonical, &["rev-parse", "origin/feat"]),
        git(&wt, &["rev-parse", "HEAD"]),
    );

    // Second run: everything previously pushed reports up to date.
    let out = arb(&ws, &["push", "-y"]);
    assert_ok(&out);
    assert!(stderr_of(&out).contains("All repos up to date"));
}

#[test]
fn rebase_is_noop_when_up_to_date() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");

    let out = arb(&ws, &["rebase", "-y"]);
    assert_ok(&out);
    assert!(stderr_of(&out).contains("All repos up to date"));
}

#[test]
fn rebase_applies_new_base_commits() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");
    let wt = ws.join("api");

    write_and_commit(&wt, "feature.txt", "work", "add feature");
    fixture.advance_origin_main("server.txt", "server work");

    let out = arb(&ws, &["rebase", "-y"]);
    assert_ok(&out);
    // Rebased on top of the fetched main.
    assert!(wt.join("server.txt").exists());
    assert_eq!(git(&wt, &["branch", "--show-current"]), "feat");
}

#[test]
fn pull_skips_never_pushed_branches() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");

    let out = arb(&ws, &["pull", "-y"]);
    assert_ok(&out);
    assert!(stderr_of(&out).contains("never pushed"));
}

#[test]
fn mutation_refuses_to_prompt_without_tty() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");
    let wt = ws.join("api");
    write_and_commit(&wt, "feature.txt", "work", "add feature");

    // No -y and stdin is not a terminal: refuse rather than hang.
    let out = arb(&ws, &["push"]);
    assert_exit(&out, 1);
    assert!(stderr_of(&out).contains("--yes"));
}

#[test]
fn dry_run_executes_nothing() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");
    let wt = ws.join("api");
    write_and_commit(&wt, "feature.txt", "work", "add feature");

    let out = arb(&ws, &["push", "-n"]);
    assert_ok(&out);
    assert!(stderr_of(&out).contains("Dry run"));
    // The remote branch was never created.
    assert!(
        !git(&fixture.canonical, &["branch", "-r"]).contains("origin/feat"),
        "dry run must not push"
    );
}

#[test]
fn delete_refuses_unpushed_work_then_force_overrides() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let wt = fixture.root.join("feat/api");
    write_and_commit(&wt, "feature.txt", "work", "add feature");

    let out = arb(&fixture.root, &["delete", "feat"]);
    assert_exit(&out, 1);
    let stderr = stderr_of(&out);
    assert!(stderr.contains("Refusing to delete"));
    assert!(stderr.contains("--force"));
    assert!(wt.exists(), "refusal must not touch the worktree");

    let out = arb(&fixture.root, &["delete", "--force", "feat"]);
    assert_ok(&out);
    assert!(!fixture.root.join("feat").exists());
    // The canonical repo survives and is prunable/clean.
    assert!(fixture.canonical.join(".git").is_dir());
}

#[test]
fn delete_clean_workspace_with_yes() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));

    let out = arb(&fixture.root, &["delete", "-y", "feat"]);
    assert_ok(&out);
    assert!(!fixture.root.join("feat").exists());
}

#[test]
fn empty_workspace_mutations_report_no_repos() {
    let fixture = Fixture::with_repo("api");
    // A workspace with no repos at all.
    let ws = fixture.root.join("empty");
    std::fs::create_dir_all(ws.join(".arbws")).unwrap();
    std::fs::write(ws.join(".arbws/config"), "branch = empty\n").unwrap();

    for args in [["push", "-y"], ["pull", "-y"], ["rebase", "-y"]] {
        let out = arb(&ws, &args);
        assert_ok(&out);
        assert!(
            stderr_of(&out).contains("No repos"),
            "expected no-repos notice for {args:?}"
        );
    }

    // Informational commands succeed too.
    assert_ok(&arb(&ws, &["status"]));
    assert_ok(&arb(&ws, &["branch"]));
    assert_ok(&arb(&fixture.root, &["list"]));
}

#[test]
fn attach_and_detach_roundtrip() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");

    // A second canonical repo to attach.
    let fixture2_origin = fixture.tmp.path().join("web.git");
    std::fs::create_dir_all(&fixture2_origin).unwrap();
    git(&fixture2_origin, &["init", "--bare", "-b", "main", "."]);
    let seed2 = fixture.tmp.path().join("seed-web");
    std::fs::create_dir_all(&seed2).unwrap();
    git(&seed2, &["init", "-b", "main", "."]);
    git(
        &seed2,
        &["remote", "add", "origin", fixture2_origin.to_str().unwrap()],
    );
    write_and_commit(&seed2, "README.md", "# web\n", "initial commit");
    git(&seed2, &["push", "-u", "origin", "main"]);
    let out = arb(
        &fixture.root,
        &["repo", "clone", fixture2_origin.to_str().unwrap(), "web"],
    );
    assert_ok(&out);

    let out = arb(&ws, &["attach", "web"]);
    assert_ok(&out);
    assert!(ws.join("web/.git").is_file());
    assert_eq!(git(&ws.join("web"), &["branch", "--show-current"]), "feat");

    let out = arb(&ws, &["detach", "-y", "web"]);
    assert_ok(&out);
    assert!(!ws.join("web").exists());
}

#[test]
fn exec_runs_in_every_repo() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));
    let ws = fixture.root.join("feat");

    let out = arb(&ws, &["exec", "git", "rev-parse", "--abbrev-ref", "HEAD"]);
    assert_ok(&out);
    assert!(stdout_of(&out).contains("feat"));

    let out = arb(&ws, &["exec", "false"]);
    assert_exit(&out, 1);
}

#[test]
fn template_apply_renders_context() {
    let fixture = Fixture::with_repo("api");
    assert_ok(&arb(&fixture.root, &["create", "feat", "api"]));

    let src = fixture.tmp.path().join("NOTES.md");
    std::fs::write(&src, "branch={{ branch }} repos={{ repos | join(',') }}\n").unwrap();
    assert_ok(&arb(&fixture.root, &["template", "add", src.to_str().unwrap()]));
    assert_ok(&arb(&fixture.root, &["template", "apply", "-y", "feat"]));

    let rendered = std::fs::read_to_string(fixture.root.join("feat/NOTES.md")).unwrap();
    assert_eq!(rendered, "branch=feat repos=api\n");
}

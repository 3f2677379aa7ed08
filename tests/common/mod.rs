//! Shared fixture helpers: throwaway arb roots backed by real git repos.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run git in `dir`, panicking on failure. Identity is pinned so commits
/// work on hosts with no global git config.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Arb Test",
            "-c",
            "user.email=arb@example.test",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("failed to spawn git");
    assert!(
        out.status.success(),
        "git {args:?} in {} failed:\n{}",
        dir.display(),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

pub fn write_and_commit(dir: &Path, file: &str, content: &str, message: &str) -> String {
    std::fs::write(dir.join(file), content).unwrap();
    git(dir, &["add", file]);
    git(dir, &["commit", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// An arb root with one upstream ("server") repo, a seed clone for
/// manipulating the server side, and a canonical clone under .arb/repos/.
pub struct Fixture {
    pub tmp: TempDir,
    pub root: PathBuf,
    /// Bare "server" repo (the canonical clone's origin).
    pub origin: PathBuf,
    /// Working clone of origin, for staging server-side history.
    pub seed: PathBuf,
    /// The canonical clone at .arb/repos/<name>.
    pub canonical: PathBuf,
}

impl Fixture {
    /// Root + one canonical repo named `name` with a single `main` commit.
    pub fn with_repo(name: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir_all(root.join(".arb/repos")).unwrap();
        std::fs::write(root.join(".arb/.gitignore"), "repos/\n").unwrap();

        let origin = tmp.path().join(format!("{name}.git"));
        std::fs::create_dir_all(&origin).unwrap();
        git(&origin, &["init", "--bare", "-b", "main", "."]);

        let seed = tmp.path().join(format!("seed-{name}"));
        std::fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init", "-b", "main", "."]);
        git(&seed, &["remote", "add", "origin", origin.to_str().unwrap()]);
        write_and_commit(&seed, "README.md", "# seed\n", "initial commit");
        git(&seed, &["push", "-u", "origin", "main"]);

        let canonical = root.join(".arb/repos").join(name);
        git(
            &root,
            &[
                "clone",
                origin.to_str().unwrap(),
                canonical.to_str().unwrap(),
            ],
        );

        Fixture {
            tmp,
            root,
            origin,
            seed,
            canonical,
        }
    }

    /// Hand-build a workspace with a linked worktree of the canonical
    /// repo, bypassing the CLI (for lib-level tests).
    pub fn add_workspace(&self, workspace: &str, repo: &str, branch: &str) -> PathBuf {
        let ws_dir = self.root.join(workspace);
        std::fs::create_dir_all(ws_dir.join(".arbws")).unwrap();
        std::fs::write(
            ws_dir.join(".arbws/config"),
            format!("branch = {branch}\n"),
        )
        .unwrap();
        let target = ws_dir.join(repo);
        git(
            &self.canonical,
            &[
                "worktree",
                "add",
                "--no-track",
                target.to_str().unwrap(),
                "-b",
                branch,
                "origin/main",
            ],
        );
        target
    }

    /// Stage a commit on the server's `main` (via the seed clone).
    pub fn advance_origin_main(&self, file: &str, message: &str) {
        git(&self.seed, &["switch", "main"]);
        write_and_commit(&self.seed, file, message, message);
        git(&self.seed, &["push", "origin", "main"]);
    }
}

/// Run the arb binary, returning the raw output.
pub fn arb(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_arb"))
        .current_dir(dir)
        .args(args)
        .env("ARB_FETCH_TIMEOUT", "120")
        .env_remove("ARB_DEBUG")
        .output()
        .expect("failed to spawn arb")
}

pub fn stderr_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

pub fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

pub fn assert_ok(out: &Output) {
    assert!(
        out.status.success(),
        "arb failed (exit {:?})\nstdout:\n{}\nstderr:\n{}",
        out.status.code(),
        stdout_of(out),
        stderr_of(out)
    );
}

pub fn assert_exit(out: &Output, code: i32) {
    assert_eq!(
        out.status.code(),
        Some(code),
        "unexpected exit\nstdout:\n{}\nstderr:\n{}",
        stdout_of(out),
        stderr_of(out)
    );
}

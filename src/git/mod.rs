//! Git invocation layer.
//!
//! A single choke point for spawning git: [`git`] (and its stdin-feeding
//! variant [`git_with_stdin`]). Both capture stdout and stderr, never
//! inherit, and never fail on non-zero exit: the caller inspects
//! [`GitOutput::exit`]. Higher-level read helpers live in [`queries`];
//! output parsing lives in [`parse`].

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub mod parse;
pub mod queries;

/// Captured result of one git invocation.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub exit: i32,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit == 0
    }

    /// Trimmed stdout, the common case for single-value plumbing queries.
    pub fn out(&self) -> &str {
        self.stdout.trim()
    }

    fn spawn_failure(err: &std::io::Error) -> Self {
        GitOutput {
            exit: 127,
            stdout: String::new(),
            stderr: format!("failed to spawn git: {err}"),
        }
    }
}

/// Number of git invocations so far in this process.
static INVOCATIONS: AtomicU64 = AtomicU64::new(0);

/// How many git commands this invocation has spawned. Reported in debug
/// output so slow commands can be traced to call volume.
pub fn invocation_count() -> u64 {
    INVOCATIONS.load(Ordering::Relaxed)
}

fn trace(dir: &Path, args: &[&str], t0: Instant, exit: i32) {
    let n = INVOCATIONS.fetch_add(1, Ordering::Relaxed) + 1;
    let context = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(".");
    log::debug!(
        "$ git {} [{}] #{n} dur={:.1}ms exit={exit}",
        args.join(" "),
        context,
        t0.elapsed().as_secs_f64() * 1000.0,
    );
}

/// Run `git -C <dir> <args…>` and capture the result.
///
/// `dir` must be an existing directory (callers verify); `args` are argv
/// elements, never concatenated into a shell. Non-zero exit is not an
/// error. A spawn failure (git missing from PATH) folds into exit 127 with
/// the OS error in stderr, so even that degrades into inspectable data.
pub fn git(dir: &Path, args: &[&str]) -> GitOutput {
    let t0 = Instant::now();
    let result = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .stdin(Stdio::null())
        .output();

    let out = match result {
        Ok(output) => GitOutput {
            exit: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(e) => GitOutput::spawn_failure(&e),
    };
    trace(dir, args, t0, out.exit);
    out
}

/// Run a git command feeding `input` on stdin.
///
/// Used for `git patch-id --stable`, which reads a diff from stdin.
pub fn git_with_stdin(dir: &Path, args: &[&str], input: &str) -> GitOutput {
    let t0 = Instant::now();
    let spawned = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let out = match spawned {
        Ok(mut child) => {
            if let Some(mut stdin) = child.stdin.take() {
                // A closed pipe (child exited early) is not fatal; the
                // exit code tells the story.
                let _ = stdin.write_all(input.as_bytes());
            }
            match child.wait_with_output() {
                Ok(output) => GitOutput {
                    exit: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                },
                Err(e) => GitOutput::spawn_failure(&e),
            }
        }
        Err(e) => GitOutput::spawn_failure(&e),
    };
    trace(dir, args, t0, out.exit);
    out
}

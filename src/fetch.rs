//! Parallel fetch with a shared deadline.
//!
//! One `git fetch --prune <remote>` per distinct remote per repo, every
//! (repo, remote) pair running concurrently. A single deadline covers the
//! whole batch; children still running when it elapses are killed and the
//! repo reports exit 124. No retries; network failures surface to the
//! caller.

use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::git;

/// Seconds allowed for the whole fetch batch unless overridden.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub fn fetch_timeout() -> Duration {
    let secs = std::env::var("ARB_FETCH_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// One repo's fetch work: every distinct remote it needs refreshed.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub repo: String,
    pub dir: PathBuf,
    pub remotes: Vec<String>,
    /// When known, `git remote set-head --auto` refreshes the default
    /// branch symref after a successful fetch.
    pub base_remote: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub repo: String,
    /// 0 on success, 124 on timeout, otherwise the first failing fetch's
    /// exit code (in remote order).
    pub exit: i32,
    /// Concatenated stderr of the repo's fetch calls (ref-update lines).
    pub output: String,
}

impl FetchResult {
    pub fn failed(&self) -> bool {
        self.exit != 0
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Suppress all progress output (the plan pipeline renders its own).
    pub silent: bool,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            silent: false,
            timeout: fetch_timeout(),
        }
    }
}

/// Outcome of a single `git fetch <remote>` child.
enum RemoteOutcome {
    Done { exit: i32, stderr: String },
    TimedOut,
    SpawnFailed(String),
}

/// Fetch every request concurrently. Results come back in request order.
pub fn fetch_all(requests: &[FetchRequest], opts: &FetchOptions) -> Vec<FetchResult> {
    if requests.is_empty() {
        return Vec::new();
    }

    let deadline = Instant::now() + opts.timeout;
    let cancelled = AtomicBool::new(false);
    let total = requests.len();
    // Events carry the repo index so progress can tick when a repo's
    // *last* remote finishes.
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<usize>();

    // Per repo, one outcome slot per remote, kept in remote order.
    let mut outcomes: Vec<Vec<Option<RemoteOutcome>>> = requests
        .iter()
        .map(|r| {
            let mut slots = Vec::new();
            slots.resize_with(r.remotes.len(), || None);
            slots
        })
        .collect();

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for (repo_idx, request) in requests.iter().enumerate() {
            for (remote_idx, remote) in request.remotes.iter().enumerate() {
                let done_tx = done_tx.clone();
                let cancelled = &cancelled;
                handles.push(scope.spawn(move || {
                    let outcome = fetch_remote(&request.dir, remote, deadline, cancelled);
                    let _ = done_tx.send(repo_idx);
                    (repo_idx, remote_idx, outcome)
                }));
            }
        }
        drop(done_tx);

        // Progress on the spawning thread while workers run.
        let tty = std::io::stderr().is_terminal();
        let mut remaining: Vec<usize> = requests.iter().map(|r| r.remotes.len()).collect();
        let mut done = remaining.iter().filter(|&&n| n == 0).count();
        for repo_idx in done_rx.iter() {
            remaining[repo_idx] -= 1;
            if remaining[repo_idx] > 0 {
                continue;
            }
            done += 1;
            if opts.silent {
                continue;
            }
            if tty {
                let _ = write!(std::io::stderr(), "\r\x1b[KFetching… {done}/{total}");
                let _ = std::io::stderr().flush();
            } else {
                let _ = writeln!(std::io::stderr(), "Fetching {done}/{total}");
            }
        }
        if !opts.silent && tty {
            let _ = write!(std::io::stderr(), "\r\x1b[K");
            let _ = std::io::stderr().flush();
        }

        for handle in handles {
            if let Ok((repo_idx, remote_idx, outcome)) = handle.join() {
                outcomes[repo_idx][remote_idx] = Some(outcome);
            }
        }
    });

    requests
        .iter()
        .zip(outcomes)
        .map(|(request, slots)| aggregate(request, slots))
        .collect()
}

/// Fold one repo's per-remote outcomes into its result. The first failure
/// in remote order decides the exit code; stderr is concatenated across
/// all fetches so ref-update lines survive.
fn aggregate(request: &FetchRequest, slots: Vec<Option<RemoteOutcome>>) -> FetchResult {
    let mut output = String::new();
    let mut exit = 0;

    for slot in slots {
        match slot {
            Some(RemoteOutcome::Done {
                exit: remote_exit,
                stderr,
            }) => {
                output.push_str(&stderr);
                if remote_exit != 0 && exit == 0 {
                    exit = remote_exit;
                }
            }
            Some(RemoteOutcome::TimedOut) => {
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push('\n');
                }
                output.push_str("fetch timed out");
                if exit == 0 {
                    exit = 124;
                }
            }
            Some(RemoteOutcome::SpawnFailed(message)) => {
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push('\n');
                }
                output.push_str(&message);
                if exit == 0 {
                    exit = 127;
                }
            }
            // A panicked worker left its slot empty.
            None => {
                if exit == 0 {
                    exit = -1;
                }
            }
        }
    }

    // Refresh the default-branch symref only once every remote was seen.
    if exit == 0
        && let Some(base) = &request.base_remote
    {
        let _ = git::git(&request.dir, &["remote", "set-head", base, "--auto"]);
    }

    FetchResult {
        repo: request.repo.clone(),
        exit,
        output,
    }
}

fn fetch_remote(
    dir: &std::path::Path,
    remote: &str,
    deadline: Instant,
    cancelled: &AtomicBool,
) -> RemoteOutcome {
    if cancelled.load(Ordering::Relaxed) {
        return RemoteOutcome::TimedOut;
    }
    let remaining = match deadline.checked_duration_since(Instant::now()) {
        Some(d) if !d.is_zero() => d,
        _ => {
            cancelled.store(true, Ordering::Relaxed);
            return RemoteOutcome::TimedOut;
        }
    };

    let spawned = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["fetch", "--prune", remote])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => return RemoteOutcome::SpawnFailed(format!("failed to spawn git fetch: {e}")),
    };

    // Drain stderr on a separate thread so a chatty fetch can't deadlock
    // against a full pipe while we wait on the deadline.
    let mut stderr_pipe = child.stderr.take().expect("stderr was piped");
    let reader = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr_pipe.read_to_string(&mut buf);
        buf
    });

    match child.wait_timeout(remaining) {
        Ok(Some(status)) => {
            let stderr = reader.join().unwrap_or_default();
            RemoteOutcome::Done {
                exit: status.code().unwrap_or(-1),
                stderr,
            }
        }
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = reader.join();
            cancelled.store(true, Ordering::Relaxed);
            RemoteOutcome::TimedOut
        }
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = reader.join();
            RemoteOutcome::SpawnFailed(format!("failed to wait for git fetch: {e}"))
        }
    }
}

/// Count `…ref -> ref` update lines in fetch stderr, for the TTY summary.
pub fn count_ref_updates(output: &str) -> usize {
    output.lines().filter(|l| l.contains(" -> ")).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        assert!(
            std::process::Command::new("git")
                .args(["init", "--quiet"])
                .current_dir(tmp.path())
                .status()
                .unwrap()
                .success()
        );
        tmp
    }

    #[test]
    fn empty_batch_is_noop() {
        let results = fetch_all(&[], &FetchOptions::default());
        assert!(results.is_empty());
    }

    #[test]
    fn failed_fetch_surfaces_exit_and_stderr() {
        let tmp = init_repo();
        let requests = vec![FetchRequest {
            repo: "broken".into(),
            dir: tmp.path().to_path_buf(),
            remotes: vec!["nonexistent".into()],
            base_remote: None,
        }];
        let results = fetch_all(
            &requests,
            &FetchOptions {
                silent: true,
                timeout: Duration::from_secs(30),
            },
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].failed());
        assert!(!results[0].output.is_empty());
    }

    #[test]
    fn both_remotes_of_a_repo_are_attempted() {
        // The fork-workflow case: base and share fetches run concurrently,
        // and neither is dropped when the other fails.
        let tmp = init_repo();
        let requests = vec![FetchRequest {
            repo: "fork".into(),
            dir: tmp.path().to_path_buf(),
            remotes: vec!["missing-base".into(), "missing-share".into()],
            base_remote: None,
        }];
        let results = fetch_all(
            &requests,
            &FetchOptions {
                silent: true,
                timeout: Duration::from_secs(30),
            },
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].failed());
        assert!(results[0].output.contains("missing-base"));
        assert!(results[0].output.contains("missing-share"));
    }

    #[test]
    fn ref_update_counting() {
        let output = "From example.test/api\n   abc..def  main -> origin/main\n * [new branch] feat -> origin/feat\n";
        assert_eq!(count_ref_updates(output), 2);
    }
}

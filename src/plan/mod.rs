//! The plan → confirm → execute pipeline shared by every mutating command.
//!
//! A command supplies a [`MutationPlanner`]; the engine owns the shape of
//! the interaction: render a stale plan immediately while a silent fetch
//! runs, re-render once fresh, confirm, execute sequentially with per-repo
//! progress, then report conflicts and summarise.

use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Result;

use crate::error::ArbError;
use crate::fetch::{FetchOptions, FetchRequest, FetchResult, fetch_all};
use crate::styling::{eprint, eprintln, format_indented, progress_message, warning_message};

pub mod conflict;
pub mod integrate;
pub mod rename;
pub mod sync;

/// What the plan decided for one repo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Execute; `verb` is the rendered action ("push", "force-push",
    /// "rebase", "pull (rebase)").
    Will { verb: String },
    UpToDate,
    Skip { reason: String },
}

impl Outcome {
    pub fn will(verb: impl Into<String>) -> Self {
        Outcome::Will { verb: verb.into() }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Outcome::Skip {
            reason: reason.into(),
        }
    }

    pub fn is_will(&self) -> bool {
        matches!(self, Outcome::Will { .. })
    }
}

/// One repo's plan entry. `detail` carries command-specific fields.
#[derive(Debug, Clone)]
pub struct PlanRow<T> {
    pub repo: String,
    pub repo_dir: PathBuf,
    pub outcome: Outcome,
    pub head_sha: Option<String>,
    pub shallow: bool,
    pub conflict: Option<conflict::Prediction>,
    pub needs_stash: bool,
    pub stash_pop_conflicts: Vec<String>,
    pub detail: T,
}

impl<T> PlanRow<T> {
    pub fn new(repo: impl Into<String>, repo_dir: PathBuf, outcome: Outcome, detail: T) -> Self {
        PlanRow {
            repo: repo.into(),
            repo_dir,
            outcome,
            head_sha: None,
            shallow: false,
            conflict: None,
            needs_stash: false,
            stash_pop_conflicts: Vec::new(),
            detail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Succeeded,
    Conflicted,
    Failed,
}

/// Result of executing one row.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub status: ExecStatus,
    /// One-line result ("pushed 3 commits", "rebase conflict").
    pub message: String,
    /// Raw git output quoted under the conflict report.
    pub detail: Option<String>,
}

impl ExecOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        ExecOutcome {
            status: ExecStatus::Succeeded,
            message: message.into(),
            detail: None,
        }
    }

    pub fn conflicted(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ExecOutcome {
            status: ExecStatus::Conflicted,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn failed(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ExecOutcome {
            status: ExecStatus::Failed,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Flags shared by all mutating commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutationOpts {
    pub yes: bool,
    /// Implies `yes`.
    pub force: bool,
    pub dry_run: bool,
    pub fetch: bool,
}

impl MutationOpts {
    pub fn assume_yes(&self) -> bool {
        self.yes || self.force || self.dry_run
    }
}

/// A mutating command's contribution to the pipeline.
pub trait MutationPlanner {
    type Detail;

    /// The verb for prompts and summaries ("push", "rebase").
    fn verb(&self) -> &str;

    /// Repos to fetch before (re)assessing. Empty disables the fetch
    /// phase regardless of `--fetch`.
    fn fetch_requests(&self) -> Vec<FetchRequest>;

    /// Gather fresh state and classify every selected repo.
    /// `fetch_failed` names repos whose fetch failed.
    fn assess(&self, fetch_failed: &[String]) -> Result<Vec<PlanRow<Self::Detail>>>;

    /// Enrich rows after classification (conflict prediction, stash
    /// planning). Only called on the final rows.
    fn post_assess(&self, _rows: &mut [PlanRow<Self::Detail>]) {}

    /// Invalidate request-scoped caches the fetch may have staled.
    fn after_fetch(&self) {}

    /// Render the plan (multi-line, no trailing newline).
    fn format_plan(&self, rows: &[PlanRow<Self::Detail>]) -> String;

    /// Execute one `will` row. Infallible at the Result level: failures
    /// are data in the outcome.
    fn execute(&self, row: &PlanRow<Self::Detail>) -> ExecOutcome;
}

/// Run the full pipeline. Returns `Err(ArbError::Operation)` when any row
/// conflicts or fails, `Err(ArbError::Aborted)` on a declined prompt.
pub fn run_mutation<P: MutationPlanner>(planner: &P, opts: &MutationOpts) -> Result<()> {
    let rows = plan_phase(planner, opts)?;

    if rows.is_empty() {
        eprintln!("No repos in workspace.");
        return Ok(());
    }

    let will_count = rows.iter().filter(|r| r.outcome.is_will()).count();
    if will_count == 0 {
        if rows.iter().all(|r| r.outcome == Outcome::UpToDate) {
            eprintln!("All repos up to date.");
        } else {
            eprintln!("Nothing to {}.", planner.verb());
        }
        return Ok(());
    }

    if opts.dry_run {
        eprintln!("Dry run; nothing executed.");
        return Ok(());
    }

    if !opts.assume_yes() {
        confirm(planner.verb(), will_count)?;
    }

    execute_phase(planner, &rows)
}

fn plan_phase<P: MutationPlanner>(
    planner: &P,
    opts: &MutationOpts,
) -> Result<Vec<PlanRow<P::Detail>>> {
    let requests = planner.fetch_requests();
    let tty = std::io::stderr().is_terminal();

    if opts.fetch && !requests.is_empty() && tty {
        return two_phase_plan(planner, requests);
    }

    let fetch_failed = if opts.fetch && !requests.is_empty() {
        // Non-TTY: fetch with visible progress, then assess once.
        let results = fetch_all(&requests, &FetchOptions::default());
        planner.after_fetch();
        report_fetch_failures(&results);
        failed_names(&results)
    } else {
        Vec::new()
    };

    let mut rows = planner.assess(&fetch_failed)?;
    planner.post_assess(&mut rows);
    eprintln!("{}", planner.format_plan(&rows));
    Ok(rows)
}

/// TTY path: render a stale plan immediately, fetch silently in the
/// background, then erase and re-render fresh.
fn two_phase_plan<P: MutationPlanner>(
    planner: &P,
    requests: Vec<FetchRequest>,
) -> Result<Vec<PlanRow<P::Detail>>> {
    let results = std::thread::scope(|scope| -> Result<Vec<FetchResult>> {
        let fetcher = scope.spawn(move || {
            fetch_all(
                &requests,
                &FetchOptions {
                    silent: true,
                    ..FetchOptions::default()
                },
            )
        });

        let stale_rows = planner.assess(&[])?;
        let stale = planner.format_plan(&stale_rows);
        let fetching = progress_message("Fetching…");
        eprintln!("{stale}\n{fetching}");
        let stale_lines = stale.lines().count() + 1;

        let results = fetcher.join().expect("fetch thread panicked");

        // Erase the stale plan before re-rendering.
        eprint!("\x1b[{stale_lines}A\x1b[0J");
        Ok(results)
    })?;

    planner.after_fetch();
    let failed = failed_names(&results);
    let mut rows = planner.assess(&failed)?;
    planner.post_assess(&mut rows);
    eprintln!("{}", planner.format_plan(&rows));
    report_fetch_failures(&results);
    Ok(rows)
}

fn failed_names(results: &[FetchResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.failed())
        .map(|r| r.repo.clone())
        .collect()
}

fn report_fetch_failures(results: &[FetchResult]) {
    for result in results.iter().filter(|r| r.failed()) {
        eprintln!(
            "{}",
            warning_message(format!("fetch failed for {}", result.repo))
        );
        if !result.output.is_empty() {
            eprintln!("{}", format_indented(&result.output));
        }
    }
}

fn confirm(verb: &str, count: usize) -> Result<()> {
    let noun = if count == 1 { "repo" } else { "repos" };
    confirm_or_abort(&format!("{verb} {count} {noun}?"))
}

/// Ask a `[y/N]` question on stderr. Anything but an explicit `y` aborts
/// with exit 130; a missing terminal refuses instead of hanging.
pub fn confirm_or_abort(question: &str) -> Result<()> {
    if !std::io::stdin().is_terminal() {
        return Err(ArbError::user(format!(
            "refusing to prompt without a terminal (use --yes): {question}"
        ))
        .into());
    }

    eprint!("{question} [y/N] ");
    let _ = std::io::stderr().flush();

    let mut response = String::new();
    std::io::stdin().read_line(&mut response)?;
    if response.trim().eq_ignore_ascii_case("y") {
        Ok(())
    } else {
        Err(ArbError::Aborted.into())
    }
}

fn execute_phase<P: MutationPlanner>(planner: &P, rows: &[PlanRow<P::Detail>]) -> Result<()> {
    let mut succeeded = 0usize;
    let mut conflicted: Vec<(&PlanRow<P::Detail>, ExecOutcome)> = Vec::new();
    let mut failed = 0usize;
    let up_to_date = rows
        .iter()
        .filter(|r| r.outcome == Outcome::UpToDate)
        .count();
    let skipped = rows
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Skip { .. }))
        .count();

    // Mutations run strictly sequentially across repos; only reads are
    // parallel.
    for row in rows.iter().filter(|r| r.outcome.is_will()) {
        let Outcome::Will { verb } = &row.outcome else {
            unreachable!()
        };
        inline_start(&row.repo, verb);
        let outcome = planner.execute(row);
        inline_result(&outcome);
        match outcome.status {
            ExecStatus::Succeeded => succeeded += 1,
            ExecStatus::Conflicted => conflicted.push((row, outcome)),
            ExecStatus::Failed => {
                failed += 1;
                if let Some(detail) = &outcome.detail {
                    eprintln!("{}", format_indented(detail));
                }
            }
        }
    }

    // Consolidated conflict report after the loop, so interleaved git
    // output doesn't bury the list.
    if !conflicted.is_empty() {
        eprintln!();
        eprintln!(
            "{}",
            warning_message(format!("{} repo(s) hit conflicts:", conflicted.len()))
        );
        for (row, outcome) in &conflicted {
            eprintln!("  {}: {}", row.repo, outcome.message);
            if let Some(detail) = &outcome.detail {
                eprintln!("{}", format_indented(detail));
            }
        }
    }

    let mut parts = vec![format!("{succeeded} succeeded")];
    if !conflicted.is_empty() {
        parts.push(format!("{} conflicted", conflicted.len()));
    }
    if failed > 0 {
        parts.push(format!("{failed} failed"));
    }
    if up_to_date > 0 {
        parts.push(format!("{up_to_date} up to date"));
    }
    if skipped > 0 {
        parts.push(format!("{skipped} skipped"));
    }
    eprintln!("{}", parts.join(", "));

    if !conflicted.is_empty() || failed > 0 {
        return Err(ArbError::operation(format!(
            "{} did not complete cleanly",
            planner.verb()
        ))
        .into());
    }
    Ok(())
}

fn inline_start(repo: &str, verb: &str) {
    eprint!("{repo}: {verb}… ");
    let _ = std::io::stderr().flush();
}

fn inline_result(outcome: &ExecOutcome) {
    eprintln!("{}", outcome.message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_predicates() {
        assert!(Outcome::will("push").is_will());
        assert!(!Outcome::UpToDate.is_will());
        assert!(!Outcome::skip("dirty").is_will());
    }

    #[test]
    fn force_implies_yes() {
        let opts = MutationOpts {
            force: true,
            ..Default::default()
        };
        assert!(opts.assume_yes());
    }
}

//! Small commands: `path`, `cd`, `open`, `exec`, `log`, `diff`.

use std::process::Command;

use anyhow::Result;
use color_print::cformat;

use arborist::context::ArbContext;
use arborist::error::ArbError;
use arborist::styling::{eprintln, hint_message, println};
use arborist::workspace::Workspace;

/// `arb path` prints the workspace directory on stdout, nothing else;
/// scripts wrap it (`cd "$(arb path foo)"`).
pub fn handle_path(ctx: &ArbContext, name: Option<&str>, cd_hint: bool) -> Result<()> {
    let workspace = Workspace::open(ctx, name)?;
    println!("{}", workspace.dir.display());
    if cd_hint {
        eprintln!(
            "{}",
            hint_message("the arb binary cannot change your shell's directory; use: cd \"$(arb path)\"")
        );
    }
    Ok(())
}

pub fn handle_open(ctx: &ArbContext, name: Option<&str>) -> Result<()> {
    let workspace = Workspace::open(ctx, name)?;
    let editor = std::env::var("EDITOR")
        .map_err(|_| ArbError::environment("$EDITOR is not set"))?;

    let status = Command::new(&editor).arg(&workspace.dir).status()?;
    if !status.success() {
        return Err(ArbError::operation(format!("{editor} exited non-zero")).into());
    }
    Ok(())
}

/// `arb exec`: run a command in every repo, strictly sequentially,
/// streaming output. Exit 1 if any repo fails.
pub fn handle_exec(ctx: &ArbContext, command: &[String]) -> Result<()> {
    let workspace = Workspace::open(ctx, None)?;
    let repos = workspace.repos(ctx);
    if repos.is_empty() {
        eprintln!("No repos in workspace.");
        return Ok(());
    }

    let display = command
        .iter()
        .map(|a| shell_escape::escape(a.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    let mut failures = Vec::new();
    for repo in &repos {
        eprintln!("{}", cformat!("<bold>{repo}</> $ {display}"));
        let status = Command::new(&command[0])
            .args(&command[1..])
            .current_dir(workspace.repo_dir(repo))
            .status();
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => failures.push(format!(
                "{repo} (exit {})",
                status.code().unwrap_or(-1)
            )),
            Err(e) => failures.push(format!("{repo} ({e})")),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ArbError::operation(format!("command failed in {}", failures.join(", "))).into())
    }
}

/// `arb log` / `arb diff`: raw git passthrough per repo. Repo headings go
/// to stderr so stdout stays pipeable.
pub fn handle_logdiff(ctx: &ArbContext, subcommand: &str, args: &[String]) -> Result<()> {
    let workspace = Workspace::open(ctx, None)?;
    let repos = workspace.repos(ctx);
    if repos.is_empty() {
        eprintln!("No repos in workspace.");
        return Ok(());
    }

    for repo in &repos {
        eprintln!("{}", cformat!("<bold>── {repo} ──</>"));
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(workspace.repo_dir(repo))
            .arg(subcommand)
            .args(args);
        // Inherit stdio: the user gets git's own pager-free output.
        let _ = cmd.status();
    }
    Ok(())
}

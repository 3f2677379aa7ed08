//! `arb status`: the per-repo workspace table, `--json`, `--schema`.

use anyhow::Result;
use color_print::cformat;

use arborist::context::ArbContext;
use arborist::fetch::{FetchOptions, count_ref_updates, fetch_all};
use arborist::status::{HeadMode, MergeKind, RefMode};
use arborist::styling::{eprintln, pad_visual, println};
use arborist::summary::{RepoReport, WorkspaceSummary};

use super::WorkspaceTarget;

pub struct StatusOptions<'a> {
    pub json: bool,
    pub schema: bool,
    pub fetch: bool,
    pub verbose: bool,
    pub filter: Option<&'a str>,
}

pub fn handle_status(ctx: ArbContext, opts: &StatusOptions<'_>) -> Result<()> {
    if opts.schema {
        let schema = schemars::schema_for!(WorkspaceSummary);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let target = WorkspaceTarget::open(ctx, None, opts.filter)?;

    if opts.fetch {
        let requests = target.fetch_requests();
        if !requests.is_empty() {
            let results = fetch_all(&requests, &FetchOptions::default());
            target.cache.invalidate_after_fetch();
            for failed in results.iter().filter(|r| r.failed()) {
                eprintln!(
                    "{}",
                    cformat!("<yellow>warning:</> fetch failed for {}", failed.repo)
                );
            }
            let updated: usize = results
                .iter()
                .filter(|r| !r.failed())
                .map(|r| count_ref_updates(&r.output))
                .sum();
            if updated > 0 {
                eprintln!(
                    "{}",
                    cformat!("<bright-black>Fetched; {updated} ref(s) updated</>")
                );
            }
        }
    }

    let summary = target.summarize();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    render_table(&summary, opts.verbose);
    Ok(())
}

fn render_table(summary: &WorkspaceSummary, verbose: bool) {
    let base_label = summary
        .base
        .as_deref()
        .map(|b| format!(" on {b}"))
        .unwrap_or_default();
    eprintln!(
        "{}",
        cformat!(
            "Workspace <bold>{}</> — branch <bold>{}</>{base_label}",
            summary.workspace,
            summary.branch
        )
    );

    if summary.repos.is_empty() {
        eprintln!("  (no repos)");
        return;
    }

    let width = summary
        .repos
        .iter()
        .map(|r| r.status.name.len())
        .max()
        .unwrap_or(0);

    for report in &summary.repos {
        eprintln!("{}", render_row(report, &summary.branch, width));
        if verbose {
            render_files(report);
        }
    }

    let issues = if summary.with_issues == 0 {
        cformat!("<green>all clean</>")
    } else {
        cformat!("<yellow>{} with issues</>", summary.with_issues)
    };
    eprintln!(
        "{}",
        cformat!("<bright-black>{} repo(s),</> {issues}", summary.total)
    );
}

fn render_row(report: &RepoReport, expected_branch: &str, width: usize) -> String {
    let status = &report.status;
    let flags = &report.flags;
    let name = pad_visual(&status.name, width);

    let head = match &status.identity.head {
        HeadMode::Detached => cformat!("<red>detached</>"),
        HeadMode::Attached { branch } if branch != expected_branch => {
            cformat!("<yellow>{branch}</>")
        }
        HeadMode::Attached { branch } => branch.clone(),
    };

    let mut cells = vec![format!("  {name}  {head}")];

    // Local working tree
    let local = &status.local;
    if local.is_dirty() {
        let mut parts = Vec::new();
        if local.staged > 0 {
            parts.push(format!("{}s", local.staged));
        }
        if local.modified > 0 {
            parts.push(format!("{}m", local.modified));
        }
        if local.untracked > 0 {
            parts.push(format!("{}?", local.untracked));
        }
        if local.conflicts > 0 {
            parts.push(format!("{}!", local.conflicts));
        }
        cells.push(cformat!("<yellow>dirty({})</>", parts.join(" ")));
    }

    // Base divergence
    if let Some(base) = &status.base {
        let mut s = String::new();
        if base.ahead > 0 || base.behind > 0 {
            s = cformat!("<green>↑{}</> <red>↓{}</> {}", base.ahead, base.behind, base.ref_name);
        }
        match base.merged_into_base {
            Some(MergeKind::Merge) => s.push_str(&cformat!(" <cyan>[merged]</>")),
            Some(MergeKind::Squash) => {
                let pr = base
                    .detected_pr
                    .map(|n| format!(" #{n}"))
                    .unwrap_or_default();
                s.push_str(&cformat!(" <cyan>[squash-merged{pr}]</>"));
            }
            None => {}
        }
        if base.base_merged_into_default.is_some() {
            s.push_str(&cformat!(" <magenta>[base-merged]</>"));
        }
        if !s.is_empty() {
            cells.push(s.trim_start().to_string());
        }
    }

    // Share divergence
    if let Some(share) = &status.share {
        match share.ref_mode {
            RefMode::NoRef => cells.push(cformat!("<bright-black>unpublished</>")),
            RefMode::Gone => cells.push(cformat!("<red>gone({})</>", share.remote)),
            RefMode::Configured | RefMode::Implicit => {
                let push = share.to_push.unwrap_or(0);
                let pull = share.to_pull.unwrap_or(0);
                if push > 0 || pull > 0 {
                    let mut s =
                        cformat!("<green>⇡{push}</> <red>⇣{pull}</> {}", share.remote);
                    if share.rebased > 0 {
                        s.push_str(&cformat!(" <cyan>({} rebased)</>", share.rebased));
                    }
                    cells.push(s);
                }
            }
        }
    } else {
        cells.push(cformat!("<bright-black>local</>"));
    }

    if let Some(op) = status.operation {
        cells.push(cformat!("<red>{op} in progress</>"));
    }
    if flags.is_shallow {
        cells.push(cformat!("<yellow>shallow</>"));
    }

    if cells.len() == 1 && !report.flags.needs_attention() {
        cells.push(cformat!("<green>✓</>"));
    }

    cells.join("  ")
}

fn render_files(report: &RepoReport) {
    let files = &report.status.local.files;
    for (label, list) in [
        ("staged", &files.staged),
        ("modified", &files.modified),
        ("untracked", &files.untracked),
        ("conflict", &files.conflicts),
    ] {
        for file in list {
            eprintln!("{}", cformat!("      <bright-black>{label}</> {file}"));
        }
    }
}

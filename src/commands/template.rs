//! `arb template`: shared files rendered into every workspace.
//!
//! Templates live under `.arb/templates/`, keyed by their destination
//! path relative to the workspace root, and render with minijinja against
//! `{workspace, branch, base, repos}`. `create`, `attach`, and `detach`
//! re-apply them so templated file lists stay current.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use color_print::cformat;

use arborist::context::ArbContext;
use arborist::error::ArbError;
use arborist::plan::confirm_or_abort;
use arborist::styling::{eprintln, success_message};
use arborist::workspace::Workspace;

use crate::cli::{MutationArgs, TemplateCommand};

pub fn handle_template(ctx: &ArbContext, command: &TemplateCommand) -> Result<()> {
    match command {
        TemplateCommand::Add { file, to } => add(ctx, file, to.as_deref()),
        TemplateCommand::Remove { name } => remove(ctx, name),
        TemplateCommand::List => list(ctx),
        TemplateCommand::Diff { name } => diff(ctx, name.as_deref()),
        TemplateCommand::Apply { workspace, mutation } => {
            apply(ctx, workspace.as_deref(), mutation)
        }
    }
}

fn template_names(ctx: &ArbContext) -> Vec<String> {
    let mut names = Vec::new();
    collect(&ctx.templates_dir(), Path::new(""), &mut names);
    names.sort();
    names
}

fn collect(root: &Path, rel: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(root.join(rel)) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let child = rel.join(entry.file_name());
        if entry.path().is_dir() {
            collect(root, &child, out);
        } else if let Some(s) = child.to_str() {
            out.push(s.to_string());
        }
    }
}

fn add(ctx: &ArbContext, file: &Path, to: Option<&str>) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let dest = match to {
        Some(to) => to.to_string(),
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ArbError::user("cannot derive a template name; pass --to"))?
            .to_string(),
    };
    if dest.starts_with('/') || dest.split('/').any(|c| c == "..") {
        return Err(ArbError::user(format!("invalid template destination '{dest}'")).into());
    }

    let target = ctx.templates_dir().join(&dest);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, content)?;
    eprintln!("{}", success_message(format!("Added template {dest}")));
    Ok(())
}

fn remove(ctx: &ArbContext, name: &str) -> Result<()> {
    let target = ctx.templates_dir().join(name);
    if !target.is_file() {
        return Err(ArbError::user(format!("no template named '{name}'")).into());
    }
    std::fs::remove_file(target)?;
    eprintln!("{}", success_message(format!("Removed template {name}")));
    Ok(())
}

fn list(ctx: &ArbContext) -> Result<()> {
    let names = template_names(ctx);
    if names.is_empty() {
        eprintln!("No templates. Add one with: arb template add <file>");
        return Ok(());
    }
    for name in names {
        eprintln!("{name}");
    }
    Ok(())
}

fn render(ctx: &ArbContext, workspace: &Workspace, name: &str) -> Result<String> {
    let source = std::fs::read_to_string(ctx.templates_dir().join(name))
        .with_context(|| format!("failed to read template {name}"))?;

    let env = minijinja::Environment::new();
    let rendered = env
        .render_str(
            &source,
            minijinja::context! {
                workspace => workspace.name,
                branch => workspace.branch(),
                base => workspace.base(),
                repos => workspace.repos(ctx),
            },
        )
        .map_err(|e| ArbError::user(format!("template {name} failed to render: {e}")))?;
    Ok(rendered)
}

fn diff(ctx: &ArbContext, name: Option<&str>) -> Result<()> {
    let workspace = Workspace::open(ctx, None)?;
    let names = match name {
        Some(name) => vec![name.to_string()],
        None => template_names(ctx),
    };

    for name in &names {
        let rendered = render(ctx, &workspace, name)?;
        let target = workspace.dir.join(name);
        match std::fs::read_to_string(&target) {
            Ok(current) if current == rendered => {
                eprintln!("{}", cformat!("{name}: <bright-black>unchanged</>"));
            }
            Ok(current) => {
                eprintln!("{}", cformat!("{name}: <yellow>would change</>"));
                print_line_diff(&current, &rendered);
            }
            Err(_) => {
                eprintln!("{}", cformat!("{name}: <green>would create</>"));
            }
        }
    }
    Ok(())
}

/// A positional line diff, enough to show what apply rewrites.
fn print_line_diff(old: &str, new: &str) {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let max = old_lines.len().max(new_lines.len());
    for i in 0..max {
        match (old_lines.get(i), new_lines.get(i)) {
            (Some(o), Some(n)) if o == n => {}
            (old_line, new_line) => {
                if let Some(o) = old_line {
                    eprintln!("{}", cformat!("  <red>- {o}</>"));
                }
                if let Some(n) = new_line {
                    eprintln!("{}", cformat!("  <green>+ {n}</>"));
                }
            }
        }
    }
}

fn apply(ctx: &ArbContext, workspace: Option<&str>, args: &MutationArgs) -> Result<()> {
    let workspace = Workspace::open(ctx, workspace)?;
    let names = template_names(ctx);
    if names.is_empty() {
        eprintln!("No templates to apply.");
        return Ok(());
    }
    if args.dry_run {
        eprintln!("Would apply {} template(s) to {}.", names.len(), workspace.name);
        return Ok(());
    }
    if !args.yes && !args.force {
        confirm_or_abort(&format!(
            "Apply {} template(s) to {}?",
            names.len(),
            workspace.name
        ))?;
    }
    let count = apply_to(ctx, &workspace)?;
    eprintln!(
        "{}",
        success_message(format!("Applied {count} template(s) to {}", workspace.name))
    );
    Ok(())
}

/// Render every template into the workspace. Used by create/attach/detach
/// where the workspace is already trusted, so no prompt.
pub(crate) fn apply_all(ctx: &ArbContext, workspace_name: &str) -> Result<usize> {
    let workspace = Workspace::open(ctx, Some(workspace_name))?;
    apply_to(ctx, &workspace)
}

fn apply_to(ctx: &ArbContext, workspace: &Workspace) -> Result<usize> {
    let names = template_names(ctx);
    for name in &names {
        let rendered = render(ctx, workspace, name)?;
        let target = workspace.dir.join(name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, rendered)?;
    }
    Ok(names.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_renders_workspace_context() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".arb/templates")).unwrap();
        std::fs::create_dir_all(tmp.path().join("fix-login/.arbws")).unwrap();
        std::fs::create_dir_all(tmp.path().join("fix-login/api/.git")).unwrap();
        std::fs::write(
            tmp.path().join("fix-login/.arbws/config"),
            "branch = fix-login\n",
        )
        .unwrap();
        std::fs::write(
            tmp.path().join(".arb/templates/NOTES.md"),
            "# {{ workspace }} on {{ branch }}\n{% for r in repos %}- {{ r }}\n{% endfor %}",
        )
        .unwrap();

        let ctx = ArbContext::discover(tmp.path()).unwrap();
        let applied = apply_all(&ctx, "fix-login").unwrap();
        assert_eq!(applied, 1);

        let rendered =
            std::fs::read_to_string(tmp.path().join("fix-login/NOTES.md")).unwrap();
        assert!(rendered.contains("# fix-login on fix-login"));
        assert!(rendered.contains("- api"));
    }

    #[test]
    fn destination_validation_rejects_escapes() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".arb/repos")).unwrap();
        let ctx = ArbContext::discover(tmp.path()).unwrap();
        let src = tmp.path().join("f");
        std::fs::write(&src, "x").unwrap();
        assert!(add(&ctx, &src, Some("../escape")).is_err());
        assert!(add(&ctx, &src, Some("/abs")).is_err());
        assert!(add(&ctx, &src, Some("ok/nested.txt")).is_ok());
    }
}

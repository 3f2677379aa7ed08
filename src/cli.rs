//! Command-line surface.

use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Args, Parser, Subcommand};

/// Custom styles for help output.
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

#[derive(Parser)]
#[command(name = "arb")]
#[command(about = "Coordinate git worktrees across repositories on a shared feature branch")]
#[command(version)]
#[command(disable_version_flag = true)]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Run as if started in this directory
    #[arg(short = 'C', value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Enable debug output (git invocations, timings)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by mutating commands.
#[derive(Args, Debug, Clone, Default)]
pub struct MutationArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Override safety refusals (implies --yes)
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Show the plan without executing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Fetch remotes before planning
    #[arg(long, overrides_with = "no_fetch")]
    pub fetch: bool,

    /// Skip the pre-plan fetch
    #[arg(short = 'N', long = "no-fetch", overrides_with = "fetch")]
    pub no_fetch: bool,

    /// Stash dirty changes around the operation
    #[arg(long)]
    pub autostash: bool,

    /// Only repos matching a filter expression (e.g. "dirty+unpushed,gone")
    #[arg(short = 'w', long = "where", value_name = "FILTER")]
    pub filter: Option<String>,

    /// Shorthand for --where dirty
    #[arg(short = 'd', long)]
    pub dirty: bool,
}

impl MutationArgs {
    /// The effective fetch decision given a per-command default.
    pub fn fetch_or(&self, default: bool) -> bool {
        if self.fetch {
            true
        } else if self.no_fetch {
            false
        } else {
            default
        }
    }

    /// The effective `--where` expression, folding in `-d`.
    ///
    /// `-d` must constrain every disjunct, so it distributes over the
    /// commas: `a,b` + `-d` becomes `a+dirty,b+dirty`.
    pub fn filter_expr(&self) -> Option<String> {
        match (&self.filter, self.dirty) {
            (Some(f), true) => Some(
                f.split(',')
                    .map(|d| format!("{d}+dirty"))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            (Some(f), false) => Some(f.clone()),
            (None, true) => Some("dirty".to_string()),
            (None, false) => None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an arb root in the current directory
    Init,

    /// Manage canonical clones under .arb/repos/
    #[command(subcommand)]
    Repo(RepoCommand),

    /// Create a workspace with worktrees on a feature branch
    Create {
        /// Workspace name
        name: String,
        /// Repos to attach (default: all canonical repos)
        repos: Vec<String>,
        /// Feature branch name (default: the workspace name)
        #[arg(short, long)]
        branch: Option<String>,
        /// Base branch for stacked workspaces
        #[arg(long)]
        base: Option<String>,
    },

    /// Delete a workspace (refuses when work would be lost)
    Delete {
        name: Option<String>,
        #[command(flatten)]
        mutation: MutationArgs,
    },

    /// Delete every fully-merged, safe workspace
    Clean {
        #[command(flatten)]
        mutation: MutationArgs,
    },

    /// List workspaces
    List {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },

    /// Print a workspace path
    Path { name: Option<String> },

    /// Print a workspace path (for shell-wrapper cd integration)
    Cd { name: Option<String> },

    /// Add repos to the current workspace
    Attach {
        repos: Vec<String>,
        #[command(flatten)]
        mutation: MutationArgs,
    },

    /// Remove repos from the current workspace
    Detach {
        repos: Vec<String>,
        #[command(flatten)]
        mutation: MutationArgs,
    },

    /// Show per-repo status for the workspace
    Status {
        /// JSON summary on stdout
        #[arg(long)]
        json: bool,
        /// Print the JSON schema and exit
        #[arg(long)]
        schema: bool,
        /// Fetch remotes before gathering
        #[arg(long)]
        fetch: bool,
        /// Show per-file detail
        #[arg(short, long)]
        verbose: bool,
        /// Only repos matching a filter expression
        #[arg(short = 'w', long = "where", value_name = "FILTER")]
        filter: Option<String>,
    },

    /// Show the workspace branch, or manage it
    Branch {
        #[command(subcommand)]
        action: Option<BranchCommand>,
    },

    /// Run git log in every repo (raw output on stdout)
    Log {
        /// Arguments passed through to git log
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run git diff in every repo (raw output on stdout)
    Diff {
        /// Arguments passed through to git diff
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Pull the feature branch from each repo's share remote
    Pull {
        /// Integrate with rebase
        #[arg(long, overrides_with = "merge")]
        rebase: bool,
        /// Integrate with merge
        #[arg(long, overrides_with = "rebase")]
        merge: bool,
        #[command(flatten)]
        mutation: MutationArgs,
    },

    /// Push the feature branch to each repo's share remote
    Push {
        #[command(flatten)]
        mutation: MutationArgs,
    },

    /// Rebase each repo onto its base branch
    Rebase {
        /// Rebase onto a new base after the old one merged
        /// (no value: the repo's default branch)
        #[arg(long, value_name = "BRANCH")]
        retarget: Option<Option<String>>,
        #[command(flatten)]
        mutation: MutationArgs,
    },

    /// Merge each repo's base branch into the feature branch
    Merge {
        #[command(flatten)]
        mutation: MutationArgs,
    },

    /// Run a command in every repo
    Exec {
        /// Command and arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Open a workspace in $EDITOR
    Open { name: Option<String> },

    /// Manage workspace file templates
    #[command(subcommand)]
    Template(TemplateCommand),
}

#[derive(Subcommand)]
pub enum RepoCommand {
    /// Clone a canonical repo into .arb/repos/
    Clone {
        url: String,
        /// Directory name (default: derived from the URL)
        name: Option<String>,
    },
    /// List canonical repos
    List,
}

#[derive(Subcommand)]
pub enum BranchCommand {
    /// Rename the feature branch across every repo
    Rename {
        /// The new branch name
        new_name: Option<String>,
        /// Resume a partially-applied rename
        #[arg(long = "continue", conflicts_with = "abort")]
        cont: bool,
        /// Roll back a partially-applied rename
        #[arg(long)]
        abort: bool,
        /// Delete the old branch on the share remote afterwards
        #[arg(long)]
        delete_remote: bool,
        /// Also rename the workspace directory
        #[arg(long, value_name = "NAME")]
        workspace_name: Option<String>,
        #[command(flatten)]
        mutation: MutationArgs,
    },
}

#[derive(Subcommand)]
pub enum TemplateCommand {
    /// Register a template file
    Add {
        /// Source file to copy into .arb/templates/
        file: PathBuf,
        /// Destination path inside each workspace (default: the file name)
        #[arg(long, value_name = "PATH")]
        to: Option<String>,
    },
    /// Remove a template
    Remove { name: String },
    /// List templates
    List,
    /// Show what apply would change
    Diff { name: Option<String> },
    /// Render templates into a workspace
    Apply {
        workspace: Option<String>,
        #[command(flatten)]
        mutation: MutationArgs,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fetch_flag_resolution() {
        let args = MutationArgs::default();
        assert!(args.fetch_or(true));
        assert!(!args.fetch_or(false));

        let args = MutationArgs {
            no_fetch: true,
            ..Default::default()
        };
        assert!(!args.fetch_or(true));

        let args = MutationArgs {
            fetch: true,
            ..Default::default()
        };
        assert!(args.fetch_or(false));
    }

    #[test]
    fn dirty_shorthand_folds_into_filter() {
        let args = MutationArgs {
            dirty: true,
            ..Default::default()
        };
        assert_eq!(args.filter_expr().as_deref(), Some("dirty"));

        let args = MutationArgs {
            dirty: true,
            filter: Some("unpushed".into()),
            ..Default::default()
        };
        assert_eq!(args.filter_expr().as_deref(), Some("unpushed+dirty"));
    }

    #[test]
    fn create_takes_no_mutation_flags() {
        // create is not a plan-pipeline command: it either runs or errors,
        // so the shared mutation flags must not parse on it.
        for flag in ["--dry-run", "-y", "--force", "--fetch", "--autostash"] {
            assert!(
                Cli::try_parse_from(["arb", "create", "foo", flag]).is_err(),
                "create accepted {flag}"
            );
        }
        assert!(Cli::try_parse_from(["arb", "create", "foo", "api"]).is_ok());
    }

    #[test]
    fn retarget_accepts_bare_and_valued_forms() {
        let cli = Cli::try_parse_from(["arb", "rebase", "--retarget"]).unwrap();
        match cli.command {
            Commands::Rebase { retarget, .. } => assert_eq!(retarget, Some(None)),
            _ => panic!("expected rebase"),
        }
        let cli = Cli::try_parse_from(["arb", "rebase", "--retarget", "release-2"]).unwrap();
        match cli.command {
            Commands::Rebase { retarget, .. } => {
                assert_eq!(retarget, Some(Some("release-2".into())))
            }
            _ => panic!("expected rebase"),
        }
    }
}

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;

use arborist::context::ArbContext;
use arborist::error::{self, ArbError};
use arborist::plan::integrate::IntegrateKind;
use arborist::styling::eprintln;

mod cli;
mod commands;

use cli::{BranchCommand, Cli, Commands, RepoCommand};
use commands::create::CreateOptions;
use commands::status_cmd::StatusOptions;

fn main() {
    let cli = Cli::parse();

    let debug = cli.debug || std::env::var("ARB_DEBUG").is_ok_and(|v| v == "1");
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if debug { "debug" } else { "off" }),
    )
    .format_timestamp(None)
    .init();

    match run(cli) {
        Ok(()) => {}
        Err(err) => {
            match err.downcast_ref::<ArbError>() {
                Some(arb) => eprintln!("{arb}"),
                None => eprintln!("{}", arborist::styling::error_message(format!("{err:#}"))),
            }
            process::exit(error::exit_code(&err));
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let start_dir = cli.directory.unwrap_or_else(|| PathBuf::from("."));

    // `init` creates the root; everything else discovers it.
    if let Commands::Init = cli.command {
        let dir = dunce::canonicalize(&start_dir)?;
        return commands::handle_init(&dir);
    }
    let ctx = ArbContext::discover(&start_dir)?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),

        Commands::Repo(command) => match command {
            RepoCommand::Clone { url, name } => {
                commands::handle_repo_clone(&ctx, &url, name.as_deref())
            }
            RepoCommand::List => commands::handle_repo_list(&ctx),
        },

        Commands::Create {
            name,
            repos,
            branch,
            base,
        } => commands::handle_create(
            &ctx,
            &CreateOptions {
                name: &name,
                repos: &repos,
                branch: branch.as_deref(),
                base: base.as_deref(),
            },
        ),

        Commands::Delete { name, mutation } => {
            commands::handle_delete(ctx, name.as_deref(), &mutation)
        }

        Commands::Clean { mutation } => commands::handle_clean(ctx, &mutation),

        Commands::List { json } => commands::handle_list(&ctx, json),

        Commands::Path { name } => commands::handle_path(&ctx, name.as_deref(), false),
        Commands::Cd { name } => commands::handle_path(&ctx, name.as_deref(), true),
        Commands::Open { name } => commands::handle_open(&ctx, name.as_deref()),

        Commands::Attach { repos, mutation } => {
            commands::handle_attach(&ctx, &repos, &mutation)
        }
        Commands::Detach { repos, mutation } => {
            commands::handle_detach(&ctx, &repos, &mutation)
        }

        Commands::Status {
            json,
            schema,
            fetch,
            verbose,
            filter,
        } => commands::handle_status(
            ctx,
            &StatusOptions {
                json,
                schema,
                fetch,
                verbose,
                filter: filter.as_deref(),
            },
        ),

        Commands::Branch { action } => match action {
            None => commands::handle_branch(&ctx),
            Some(BranchCommand::Rename {
                new_name,
                cont,
                abort,
                delete_remote,
                workspace_name,
                mutation,
            }) => commands::handle_branch_rename(
                &ctx,
                &commands::branch::RenameOptions {
                    new_name: new_name.as_deref(),
                    cont,
                    abort,
                    delete_remote,
                    workspace_name: workspace_name.as_deref(),
                },
                &mutation,
            ),
        },

        Commands::Log { args } => commands::handle_logdiff(&ctx, "log", &args),
        Commands::Diff { args } => commands::handle_logdiff(&ctx, "diff", &args),

        Commands::Pull {
            rebase,
            merge,
            mutation,
        } => commands::handle_pull(ctx, rebase, merge, &mutation),

        Commands::Push { mutation } => commands::handle_push(ctx, &mutation),

        Commands::Rebase { retarget, mutation } => {
            commands::handle_integrate(ctx, IntegrateKind::Rebase, retarget, &mutation)
        }
        Commands::Merge { mutation } => {
            commands::handle_integrate(ctx, IntegrateKind::Merge, None, &mutation)
        }

        Commands::Exec { command } => commands::handle_exec(&ctx, &command),

        Commands::Template(command) => commands::handle_template(&ctx, &command),
    }
}

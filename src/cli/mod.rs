//! Command-line interface for shpm.
//!
//! Every subcommand lives in its own module with a clap `Args` struct and an
//! `execute` method. Commands build an [`engine::Command`](crate::engine::Command),
//! run it through the engine and print the report.
//!
//! # Commands
//!
//! - `init` - create the home directory and sync configured repositories
//! - `list` - list installed packages
//! - `search` - search packages in synced repositories
//! - `install` - install packages
//! - `update` - update installed packages
//! - `remove` - remove packages
//! - `enable` / `disable` - toggle loading in new shells
//! - `repo` - manage repositories (`add`, `list`, `remove`, `sync`)
//! - `env` - print the shell integration script
//!
//! # Exit status
//!
//! `shpm` exits with status 1 when any target of a multi-target command
//! failed, even though the remaining targets were processed.

mod common;
mod env;
mod init;
mod install;
mod list;
mod remove;
mod repo;
mod search;
mod toggle;
mod update;

pub use common::{CommandContext, OutputFormat};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Layout;

/// Shell Package Manager: installs, updates and loads shell packages from Git repositories.
#[derive(Parser, Debug)]
#[command(name = "shpm", about, version, long_about = None)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Show debug logging.
    ///
    /// Equivalent to `RUST_LOG=debug`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Home directory holding config, state and working copies.
    ///
    /// Defaults to `$SHPM_HOME`, then `~/.shpm`.
    #[arg(long, global = true, value_name = "PATH")]
    home: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the home directory and sync configured repositories.
    Init(init::InitCommand),

    /// List installed packages and whether they can be loaded.
    List(list::ListCommand),

    /// Search packages in synced repositories.
    Search(search::SearchCommand),

    /// Install packages given as `name` or `repo/name`.
    Install(install::InstallCommand),

    /// Update installed packages to their repository's latest commit.
    Update(update::UpdateCommand),

    /// Remove installed packages.
    Remove(remove::RemoveCommand),

    /// Load packages in new shells again.
    Enable(toggle::EnableCommand),

    /// Keep packages installed but stop loading them.
    Disable(toggle::DisableCommand),

    /// Manage package repositories.
    Repo(repo::RepoCommand),

    /// Print the script to `eval` in the shell startup file.
    Env(env::EnvCommand),
}

impl Cli {
    /// Runs the parsed command.
    ///
    /// Returns `Ok(false)` when the command ran but some targets failed.
    ///
    /// # Errors
    ///
    /// Returns an error when the command could not run at all.
    pub async fn execute(self) -> Result<bool> {
        init_logging(self.verbose, self.quiet);

        let ctx = CommandContext {
            layout: Layout::resolve(self.home.as_deref())?,
            quiet: self.quiet,
        };
        tracing::debug!("Using home {}", ctx.layout.home().display());

        match self.command {
            Commands::Init(cmd) => cmd.execute(&ctx).await,
            Commands::List(cmd) => cmd.execute(&ctx).await,
            Commands::Search(cmd) => cmd.execute(&ctx).await,
            Commands::Install(cmd) => cmd.execute(&ctx).await,
            Commands::Update(cmd) => cmd.execute(&ctx).await,
            Commands::Remove(cmd) => cmd.execute(&ctx).await,
            Commands::Enable(cmd) => cmd.execute(&ctx).await,
            Commands::Disable(cmd) => cmd.execute(&ctx).await,
            Commands::Repo(cmd) => cmd.execute(&ctx).await,
            Commands::Env(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// Installs the stderr log subscriber.
///
/// `--verbose` forces `debug`, `--quiet` forces `error`, otherwise `RUST_LOG`
/// applies with `warn` as the default.
fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

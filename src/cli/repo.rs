//! Manage package repositories.
//!
//! Repositories are named Git remotes stored in the `[repositories]` table of
//! `config.toml`. Each one is cloned to `repos/<name>` on first sync.
//!
//! ```bash
//! shpm repo add core https://github.com/me/shell-packages.git
//! shpm repo sync
//! shpm repo list
//! shpm repo remove core --force
//! ```

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use super::common::{CommandContext, OutputFormat, print_json, short};
use crate::engine::{Command, Report, RepositoryStatus};

/// Manage package repositories.
#[derive(Args, Debug)]
pub struct RepoCommand {
    #[command(subcommand)]
    command: RepoSubcommand,
}

#[derive(Subcommand, Debug)]
enum RepoSubcommand {
    /// Register a repository without cloning it
    Add {
        /// Unique repository name
        name: String,
        /// Git URL or local path
        url: String,
    },

    /// List registered repositories
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Unregister a repository and delete its working copy
    Remove {
        /// Repository name
        name: String,
        /// Orphan enabled packages instead of refusing
        #[arg(short, long)]
        force: bool,
    },

    /// Clone or fast-forward repositories
    Sync {
        /// Repositories to sync; all when omitted
        names: Vec<String>,
    },
}

impl RepoCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        match self.command {
            RepoSubcommand::Add {
                name,
                url,
            } => {
                ctx.run(Command::RepoAdd {
                    name,
                    url,
                })
                .await
            }
            RepoSubcommand::List {
                format,
            } => list(ctx, format).await,
            RepoSubcommand::Remove {
                name,
                force,
            } => {
                ctx.run(Command::RepoRemove {
                    name,
                    force,
                })
                .await
            }
            RepoSubcommand::Sync {
                names,
            } => {
                ctx.run(Command::RepoSync {
                    names,
                })
                .await
            }
        }
    }
}

async fn list(ctx: &CommandContext, format: OutputFormat) -> Result<bool> {
    let mut engine = ctx.engine().await?;
    let report = engine.execute(Command::RepoList).await?;
    let Report::Repositories(repositories) = &report.report else {
        return Ok(true);
    };

    match format {
        OutputFormat::Json => print_json(repositories)?,
        OutputFormat::Text => print_repositories(repositories),
    }
    Ok(true)
}

fn print_repositories(repositories: &[RepositoryStatus]) {
    if repositories.is_empty() {
        println!("No repositories registered. Add one with 'shpm repo add <name> <url>'.");
        return;
    }

    for repository in repositories {
        let state = match &repository.head {
            Some(head) => format!("{} ({} packages)", short(head), repository.packages).green(),
            None if repository.synced => "synced".green(),
            None => "not synced".yellow(),
        };
        println!("{}  {}  {}", repository.name.bold(), repository.url, state);
    }
}

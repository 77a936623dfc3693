//! Shared plumbing for CLI commands: opening the engine and printing reports.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::config::Layout;
use crate::engine::{
    BatchReport, CommandReport, Engine, Report, SyncReport, TargetSuccess, TargetSummary,
};

/// Output format of listing commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

/// Global state every command receives.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Home layout chosen from `--home`, `SHPM_HOME` or `~/.shpm`
    pub layout: Layout,
    /// Suppress non-error output
    pub quiet: bool,
}

impl CommandContext {
    /// Opens the engine for this home.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.toml` or `state.toml` is malformed.
    pub async fn engine(&self) -> Result<Engine> {
        Engine::open(self.layout.clone()).await
    }

    /// Runs one command and prints its report.
    ///
    /// Returns `false` when any target failed.
    ///
    /// # Errors
    ///
    /// Returns errors raised outside of any target.
    pub async fn run(&self, command: crate::engine::Command) -> Result<bool> {
        let mut engine = self.engine().await?;
        let report = engine.execute(command).await?;
        self.print(&report);
        Ok(!report.has_failures())
    }

    fn print(&self, report: &CommandReport) {
        match &report.report {
            Report::Batch(batch) => print_batch(batch, self.quiet),
            Report::Sync(sync) => print_sync(sync, self.quiet),
            other => {
                tracing::debug!("No default rendering for {:?}", other);
            }
        }
        if report.environment_changed && !self.quiet {
            println!("{}", "Run 'shpm env' or open a new shell to apply the changes.".dimmed());
        }
    }
}

/// Prints one line per target; failures go to stderr.
pub fn print_batch(batch: &BatchReport, quiet: bool) {
    for target in batch.targets() {
        match &target.outcome {
            Ok(success) => {
                if !quiet {
                    println!("{} {}", "✓".green(), describe(success));
                }
                if let TargetSuccess::Removed {
                    warning: Some(warning),
                    ..
                } = success
                {
                    eprintln!("{}: {}", "warning".yellow(), warning);
                }
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), target.token.bold(), e);
            }
        }
    }

    let failures = batch.failures().count();
    if failures > 0 {
        eprintln!(
            "{}",
            format!("{} of {} targets failed", failures, batch.len()).red().bold()
        );
    }
}

fn describe(success: &TargetSuccess) -> String {
    match success {
        TargetSuccess::Installed {
            package,
            commit,
            ..
        } => format!("Installed {} at {}", package.to_string().bold(), short(commit)),
        TargetSuccess::Updated {
            package,
            from,
            to,
            ..
        } => format!("Updated {} {}..{}", package.to_string().bold(), short(from), short(to)),
        TargetSuccess::UpToDate {
            package,
            commit,
        } => format!("{} is up to date at {}", package.to_string().bold(), short(commit)),
        TargetSuccess::Removed {
            package,
            ..
        } => format!("Removed {}", package.to_string().bold()),
        TargetSuccess::Enabled {
            package,
        } => format!("Enabled {}", package.to_string().bold()),
        TargetSuccess::Disabled {
            package,
        } => format!("Disabled {}", package.to_string().bold()),
        TargetSuccess::RepositoryAdded {
            name,
            url,
        } => format!("Added repository {} ({})", name.bold(), url),
        TargetSuccess::RepositoryRemoved {
            name,
            orphaned,
        } => {
            if orphaned.is_empty() {
                format!("Removed repository {}", name.bold())
            } else {
                let names: Vec<String> = orphaned.iter().map(ToString::to_string).collect();
                format!(
                    "Removed repository {}; orphaned: {}",
                    name.bold(),
                    names.join(", ").yellow()
                )
            }
        }
    }
}

/// Prints one line per repository.
pub fn print_sync(sync: &SyncReport, quiet: bool) {
    for (name, result) in sync {
        match result {
            Ok(result) if !quiet => {
                let state = if result.changed { "updated to" } else { "up to date at" };
                println!("{} {} {} {}", "✓".green(), name.bold(), state, short(&result.commit));
            }
            Ok(_) => {}
            Err(e) => eprintln!("{} {}: {}", "✗".red(), name.bold(), e),
        }
    }
}

/// Prints a value as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// JSON view of a batch.
#[must_use]
pub fn batch_summary(batch: &BatchReport) -> Vec<TargetSummary<'_>> {
    batch.targets().iter().map(TargetSummary::from).collect()
}

/// First eight characters of a commit hash.
#[must_use]
pub fn short(commit: &str) -> &str {
    &commit[..commit.len().min(8)]
}

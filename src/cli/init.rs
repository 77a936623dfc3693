//! Set up the shpm home directory.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, print_sync};
use crate::engine::{Command, Report};

/// Create the home layout, write the prelude and sync configured repositories.
///
/// Safe to run repeatedly: existing `config.toml` and `state.toml` are kept,
/// the prelude is rewritten.
#[derive(Args, Debug)]
pub struct InitCommand {}

impl InitCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        let mut engine = ctx.engine().await?;
        let report = engine.execute(Command::Init).await?;

        if let Report::Init(init) = &report.report {
            print_sync(&init.sync, ctx.quiet);
            if !ctx.quiet {
                println!("{} {}", "Initialized".green().bold(), init.home.display());
                println!("Add this line to your shell startup file:");
                println!("    eval \"$(shpm env)\"");
            }
        }
        Ok(!report.has_failures())
    }
}

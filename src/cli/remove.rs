//! Remove installed packages.

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, OutputFormat};
use super::install::run_batch;
use crate::engine::Command;

/// Run `pkg.remove` and delete the package record.
///
/// When the hook fails the record is kept unless `--force` is given.
#[derive(Args, Debug)]
pub struct RemoveCommand {
    /// Packages to remove
    #[arg(required = true, value_name = "PACKAGE")]
    packages: Vec<String>,

    /// Delete the record even if the remove hook fails
    #[arg(short, long)]
    force: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl RemoveCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        let command = Command::Remove {
            tokens: self.packages,
            force: self.force,
        };
        run_batch(ctx, command, self.format).await
    }
}

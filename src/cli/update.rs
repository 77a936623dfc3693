//! Update installed packages.

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, OutputFormat};
use super::install::run_batch;
use crate::engine::Command;

/// Update packages to the latest commit of their repository.
///
/// Without arguments every installed package is updated. Repositories are
/// synced once per run, and `pkg.update` runs only for packages whose
/// repository moved.
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Packages to update; all installed packages when omitted
    #[arg(value_name = "PACKAGE")]
    packages: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl UpdateCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        let command = Command::Update {
            tokens: self.packages,
        };
        run_batch(ctx, command, self.format).await
    }
}

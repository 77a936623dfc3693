//! Enable and disable installed packages.

use anyhow::Result;
use clap::Args;

use super::common::CommandContext;
use crate::engine::Command;

/// Load packages in new shells again.
#[derive(Args, Debug)]
pub struct EnableCommand {
    /// Packages to enable
    #[arg(required = true, value_name = "PACKAGE")]
    packages: Vec<String>,
}

impl EnableCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        ctx.run(Command::Enable {
            tokens: self.packages,
        })
        .await
    }
}

/// Stop loading packages without removing them; no hook runs.
#[derive(Args, Debug)]
pub struct DisableCommand {
    /// Packages to disable
    #[arg(required = true, value_name = "PACKAGE")]
    packages: Vec<String>,
}

impl DisableCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        ctx.run(Command::Disable {
            tokens: self.packages,
        })
        .await
    }
}

//! Print the shell integration script.

use anyhow::Result;
use clap::Args;

use super::common::CommandContext;
use crate::engine::{Command, Report};

/// Print the script that loads enabled packages.
///
/// Add `eval "$(shpm env)"` to `~/.bashrc`. Packages that cannot be loaded are
/// reported on stderr and skipped.
#[derive(Args, Debug)]
pub struct EnvCommand {}

impl EnvCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        let mut engine = ctx.engine().await?;
        let report = engine.execute(Command::Env).await?;
        if let Report::Env(env) = &report.report {
            print!("{}", env.script);
        }
        Ok(true)
    }
}

//! Install packages.

use anyhow::Result;
use clap::Args;

use super::common::{CommandContext, OutputFormat, batch_summary, print_json};
use crate::engine::{Command, Report};
use crate::hooks::OutputMode;

/// Install one or more packages.
///
/// Each target is `name` (searched across synced repositories) or
/// `repo/name`. Targets are processed in order; a failing target does not stop
/// the others.
#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Packages to install
    #[arg(required = true, value_name = "PACKAGE")]
    packages: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl InstallCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        let command = Command::Install {
            tokens: self.packages,
        };
        run_batch(ctx, command, self.format).await
    }
}

/// Runs a batch command, printing text through the context or a JSON summary.
///
/// In JSON mode stdout carries only the summary; hook output is captured and
/// replayed on stderr.
pub(super) async fn run_batch(ctx: &CommandContext, command: Command, format: OutputFormat) -> Result<bool> {
    if format == OutputFormat::Text {
        return ctx.run(command).await;
    }

    let mut engine = ctx.engine().await?.with_output_mode(OutputMode::Capture);
    let report = engine.execute(command).await?;
    if let Report::Batch(batch) = &report.report {
        for hook in batch.targets().iter().filter_map(|t| t.outcome.as_ref().ok()?.hook()) {
            for captured in [&hook.stdout, &hook.stderr].into_iter().flatten() {
                eprint!("{captured}");
            }
        }
        print_json(&batch_summary(batch))?;
    }
    Ok(!report.has_failures())
}

//! List installed packages.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, OutputFormat, print_json, short};
use crate::engine::{Command, ListEntry, Report};

/// List installed packages with their commit and load status.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl ListCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        let mut engine = ctx.engine().await?;
        let report = engine.execute(Command::List).await?;
        let Report::Listing(entries) = &report.report else {
            return Ok(true);
        };

        match self.format {
            OutputFormat::Json => print_json(entries)?,
            OutputFormat::Text => print_entries(entries),
        }
        Ok(true)
    }
}

fn print_entries(entries: &[ListEntry]) {
    if entries.is_empty() {
        println!("No packages installed");
        return;
    }

    for entry in entries {
        let record = &entry.record;
        let mut line = format!("{}  {}", record.id().to_string().bold(), short(&record.commit).dimmed());
        if !record.enabled {
            line.push_str(&format!("  {}", "disabled".yellow()));
        }
        if entry.status.is_dangling() {
            line.push_str(&format!("  {}", entry.status.to_string().red()));
        }
        println!("{line}");
    }
}

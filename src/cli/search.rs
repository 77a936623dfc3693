//! Search packages in synced repositories.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, OutputFormat, print_json};
use crate::engine::{Command, Report};

/// Search packages by name.
///
/// Patterns containing `*`, `?` or `[` are globs; anything else matches as a
/// case-insensitive substring.
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Glob or substring to match package names against
    pattern: String,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl SearchCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<bool> {
        let mut engine = ctx.engine().await?;
        let report = engine
            .execute(Command::Search {
                pattern: self.pattern.clone(),
            })
            .await?;
        let Report::Search(hits) = &report.report else {
            return Ok(true);
        };

        match self.format {
            OutputFormat::Json => print_json(hits)?,
            OutputFormat::Text if hits.is_empty() => {
                println!("No packages match '{}'", self.pattern);
            }
            OutputFormat::Text => {
                for hit in hits {
                    let name = format!("{}/{}", hit.repo, hit.name);
                    if hit.installed {
                        println!("{} {}", name.bold(), "(installed)".green());
                    } else {
                        println!("{name}");
                    }
                }
            }
        }
        Ok(true)
    }
}

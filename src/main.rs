//! shpm entry point.
//!
//! Parses arguments, runs the command and maps the outcome to an exit status:
//! `0` on success, `1` when the command failed or any of its targets failed.

use anyhow::Result;
use clap::Parser;
use shpm::cli;
use shpm::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}

//! Platform-specific utilities and cross-platform compatibility helpers
//!
//! Small wrappers over platform differences: where the home directory lives,
//! how `~` and `$VAR` are expanded in configured paths, and which name the `git`
//! executable has.
//!
//! # Examples
//!
//! ```rust,no_run
//! use shpm::utils::platform::{get_home_dir, resolve_path};
//!
//! # fn example() -> anyhow::Result<()> {
//! let home = get_home_dir()?;
//! println!("Home directory: {}", home.display());
//!
//! let prelude = resolve_path("~/.config/shpm/prelude.sh")?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Returns `true` when compiled for Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Gets the home directory path for the current user.
///
/// # Errors
///
/// Returns an error when the platform reports no home directory (for example
/// when `HOME` is unset in a minimal container).
pub fn get_home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine home directory.\n\n\
            Set the HOME environment variable, or point SHPM_HOME at the directory \
            shpm should use"
        )
    })
}

/// Returns the git executable name for the current platform.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Resolves a configured path with tilde expansion and environment variable substitution.
///
/// `~/` is expanded to the home directory and `$VAR`/`${VAR}` references are
/// substituted. Unknown variables are an error rather than being silently
/// replaced with an empty string.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined or a referenced
/// variable is not set.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(path).with_context(|| format!("Failed to expand path: {path}"))?;

    Ok(PathBuf::from(expanded.as_ref()))
}

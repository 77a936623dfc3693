//! Configuration and on-disk layout for shpm.
//!
//! shpm keeps everything below a single root directory (the *home*):
//!
//! ```text
//! ~/.shpm/
//! ├── config.toml    # settings and the [repositories] table
//! ├── state.toml     # installed package records
//! ├── prelude.sh     # capability prelude sourced by every hook
//! ├── reload         # touched when the shell environment should be re-sourced
//! └── repos/
//!     ├── core/      # git working copy of repository "core"
//!     └── extra/
//! ```
//!
//! The home is chosen, in order, from the `--home` flag, the `SHPM_HOME`
//! environment variable, and finally `~/.shpm`.

mod global;

pub use global::Config;

use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_HOME_DIR_NAME, HOME_ENV_VAR, PRELUDE_FILE_NAME, RELOAD_MARKER_NAME,
    REPOS_DIR_NAME, STATE_FILE_NAME,
};
use crate::utils::platform::{get_home_dir, resolve_path};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Paths of the persisted layout below one home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    home: PathBuf,
}

impl Layout {
    /// Creates a layout rooted at `home` without touching the file system.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
        }
    }

    /// Resolves the home directory from an explicit path, `SHPM_HOME`, or `~/.shpm`.
    ///
    /// # Errors
    ///
    /// Returns an error if the fallback home directory cannot be determined or
    /// the configured path cannot be expanded.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }

        if let Ok(value) = std::env::var(HOME_ENV_VAR) {
            if !value.trim().is_empty() {
                return Ok(Self::new(resolve_path(&value)?));
            }
        }

        Ok(Self::new(get_home_dir()?.join(DEFAULT_HOME_DIR_NAME)))
    }

    /// Root directory.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// `config.toml`
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.home.join(CONFIG_FILE_NAME)
    }

    /// `state.toml`
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.home.join(STATE_FILE_NAME)
    }

    /// Directory containing one working copy per repository.
    #[must_use]
    pub fn repos_dir(&self) -> PathBuf {
        self.home.join(REPOS_DIR_NAME)
    }

    /// Working copy location of a repository.
    #[must_use]
    pub fn repository_dir(&self, name: &str) -> PathBuf {
        self.repos_dir().join(name)
    }

    /// Bundled prelude location.
    #[must_use]
    pub fn prelude_file(&self) -> PathBuf {
        self.home.join(PRELUDE_FILE_NAME)
    }

    /// Reload marker location.
    #[must_use]
    pub fn reload_marker(&self) -> PathBuf {
        self.home.join(RELOAD_MARKER_NAME)
    }
}

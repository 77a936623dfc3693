//! The `config.toml` settings file.
//!
//! # File Format
//!
//! ```toml
//! # Shell used to evaluate package scripts; must be bash or bash-compatible
//! shell = "bash"
//!
//! # Optional replacement for the bundled capability prelude
//! prelude = "~/.config/shpm/prelude.sh"
//!
//! # Optional upper bound for a single git command, in seconds
//! git_timeout_secs = 300
//!
//! [repositories]
//! core = "https://github.com/example/shpm-core.git"
//! work = "git@git.example.com:team/shell-packages.git"
//! ```
//!
//! Every key is optional; a missing file is equivalent to an empty one.
//!
//! `shell` is started as `<shell> --noprofile --norc -c <script>` and must
//! provide `declare -F` and `local`. A path to another bash binary works.
//! Under `dash`, `zsh` or `fish` every `pkg.sh` fails to load and is reported
//! as a hook failure instead of being skipped.

use crate::constants::DEFAULT_SHELL;
use crate::core::ShpmError;
use crate::utils::fs::atomic_write;
use crate::utils::platform::resolve_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn is_default_shell(shell: &str) -> bool {
    shell == DEFAULT_SHELL
}

/// Settings and registered repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Shell program used to evaluate `pkg.sh` scripts; must be bash-compatible.
    #[serde(default = "default_shell", skip_serializing_if = "is_default_shell")]
    pub shell: String,

    /// Custom prelude path; `~` and `$VAR` are expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prelude: Option<String>,

    /// Timeout for individual git commands. Unset means the git transport's own timeouts apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_timeout_secs: Option<u64>,

    /// Registered repositories, name to remote URL.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub repositories: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            prelude: None,
            git_timeout_secs: None,
            repositories: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads the configuration, returning defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ShpmError::ConfigError {
                message: format!("{}: {e}", path.display()),
            })
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Saves the configuration atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Git command timeout, if configured.
    #[must_use]
    pub fn git_timeout(&self) -> Option<Duration> {
        self.git_timeout_secs.map(Duration::from_secs)
    }

    /// Expanded custom prelude path, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured path cannot be expanded.
    pub fn prelude_path(&self) -> Result<Option<PathBuf>> {
        self.prelude.as_deref().map(resolve_path).transpose()
    }
}

//! Lifecycle hook execution.
//!
//! A package may ship a `pkg.sh` script defining up to four shell functions,
//! one per lifecycle stage:
//!
//! ```bash
//! pkg.install() { shpm.link vimrc "$HOME/.vimrc"; }
//! pkg.update()  { pkg.install; }
//! pkg.remove()  { rm -f "$HOME/.vimrc"; }
//! pkg.load()    { export EDITOR=vim; }
//! ```
//!
//! Every stage runs in a fresh `bash --noprofile --norc` process:
//!
//! - the environment is cleared except for a few forwarded variables
//!   (`PATH`, `HOME`, `USER`, `SHELL`, `TERM`, `LANG`, `LC_ALL`)
//! - `SHPM_HOME`, `SHPM_PRELUDE`, `PKG_NAME`, `PKG_REPO`, `PKG_PATH` and
//!   `PKG_HOOK` are exported, plus any caller-supplied variables
//! - the working directory is the package directory
//! - the capability prelude is sourced, then the script, then the stage's
//!   function is called and its exit status becomes the hook's exit code
//!
//! A stage the script does not define is skipped: [`HookExecutor::run_hook`]
//! reports a [`HookOutcome`] with `skipped = true` and exit code 0 without
//! spawning a process for it.
//!
//! Only one hook may run per package at a time. A second concurrent call for
//! the same package fails with [`ShpmError::HookBusy`].

use anyhow::{Context, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use tokio::process::Command;

use crate::constants::{FORWARDED_ENV_VARS, HOME_ENV_VAR, HOOK_FUNCTION_PREFIX, PACKAGE_SCRIPT_NAME};
use crate::core::ShpmError;
use crate::package::{Package, PackageId};
use crate::utils::fs::atomic_write;

/// Capability prelude shipped with shpm and written to `<home>/prelude.sh`.
pub const BUNDLED_PRELUDE: &str = include_str!("prelude.sh");

/// Printed between script output and the function list during discovery.
const DISCOVERY_MARKER: &str = "--shpm-hooks--";

const DISCOVER_SCRIPT: &str = r#"if [ -n "$SHPM_PRELUDE" ] && [ -f "$SHPM_PRELUDE" ]; then . "$SHPM_PRELUDE"; fi
. "$1" >/dev/null || exit $?
echo "$2"
declare -F
"#;

const RUN_SCRIPT: &str = r#"if [ -n "$SHPM_PRELUDE" ] && [ -f "$SHPM_PRELUDE" ]; then . "$SHPM_PRELUDE"; fi
. "$1" || exit $?
"$2"
"#;

/// Lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Hook {
    /// After the first sync of a package
    Install,
    /// After a sync moved the repository past the recorded commit
    Update,
    /// Before the record is deleted
    Remove,
    /// When the shell environment is loaded
    Load,
}

impl Hook {
    /// All stages in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Install, Self::Update, Self::Remove, Self::Load];

    /// Stage name as used in `PKG_HOOK` and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Load => "load",
        }
    }

    /// Shell function implementing the stage, e.g. `pkg.install`.
    #[must_use]
    pub fn function_name(self) -> String {
        format!("{HOOK_FUNCTION_PREFIX}{}", self.as_str())
    }

    fn from_function_name(name: &str) -> Option<Self> {
        name.strip_prefix(HOOK_FUNCTION_PREFIX).and_then(|stage| stage.parse().ok())
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hook {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "install" => Ok(Self::Install),
            "update" => Ok(Self::Update),
            "remove" => Ok(Self::Remove),
            "load" => Ok(Self::Load),
            other => Err(anyhow::anyhow!("Unknown hook '{other}'")),
        }
    }
}

/// The stages a package's script implements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookSet {
    hooks: BTreeSet<Hook>,
}

impl HookSet {
    /// Whether the script defines the stage's function.
    #[must_use]
    pub fn contains(&self, hook: Hook) -> bool {
        self.hooks.contains(&hook)
    }

    /// True for packages without `pkg.sh` or without any stage function.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Defined stages in lifecycle order.
    pub fn iter(&self) -> impl Iterator<Item = Hook> + '_ {
        self.hooks.iter().copied()
    }
}

impl FromIterator<Hook> for HookSet {
    fn from_iter<I: IntoIterator<Item = Hook>>(iter: I) -> Self {
        Self {
            hooks: iter.into_iter().collect(),
        }
    }
}

/// Where hook output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Collect stdout and stderr into the [`HookOutcome`].
    Capture,
    /// Stream to the terminal; stdin stays attached for prompts.
    #[default]
    Inherit,
}

/// Result of running (or skipping) one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOutcome {
    /// Stage that was requested
    pub hook: Hook,
    /// Exit code of the stage function; -1 when killed by a signal
    pub exit_code: i32,
    /// Captured stdout in [`OutputMode::Capture`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Captured stderr in [`OutputMode::Capture`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// The package does not implement this stage
    pub skipped: bool,
}

impl HookOutcome {
    fn skipped(hook: Hook) -> Self {
        Self {
            hook,
            exit_code: 0,
            stdout: None,
            stderr: None,
            skipped: true,
        }
    }

    /// Exit code 0, including skipped stages.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts a non-zero exit into [`ShpmError::HookFailure`].
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::HookFailure`] when the exit code is non-zero.
    pub fn into_result(self, package: &PackageId) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(ShpmError::HookFailure {
            package: package.to_string(),
            hook: self.hook.to_string(),
            exit_code: self.exit_code,
        }
        .into())
    }
}

/// Removes a package from the in-flight registry when the hook finishes.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<PackageId, Hook>,
    id: PackageId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

/// Runs lifecycle scripts in isolated shell processes.
#[derive(Debug, Clone)]
pub struct HookExecutor {
    shell: String,
    home: PathBuf,
    prelude: PathBuf,
    output: OutputMode,
    in_flight: Arc<DashMap<PackageId, Hook>>,
}

impl HookExecutor {
    /// Creates an executor using `shell` with `prelude` sourced before each script.
    pub fn new(shell: impl Into<String>, home: impl Into<PathBuf>, prelude: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            home: home.into(),
            prelude: prelude.into(),
            output: OutputMode::default(),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Sets where hook output goes.
    #[must_use]
    pub const fn with_output_mode(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Prelude sourced before every script.
    #[must_use]
    pub fn prelude(&self) -> &Path {
        &self.prelude
    }

    fn resolve_shell(&self) -> Result<PathBuf> {
        which::which(&self.shell).map_err(|_| {
            ShpmError::ShellNotFound {
                shell: self.shell.clone(),
            }
            .into()
        })
    }

    /// Shell command with a cleared environment and the package variables set.
    fn base_command(&self, shell: &Path, package: &Package, hook: Option<Hook>) -> Command {
        let mut cmd = Command::new(shell);
        cmd.arg("--noprofile").arg("--norc");
        cmd.env_clear();
        for name in FORWARDED_ENV_VARS {
            if let Some(value) = std::env::var_os(name) {
                cmd.env(name, value);
            }
        }
        cmd.env(HOME_ENV_VAR, &self.home)
            .env("SHPM_PRELUDE", &self.prelude)
            .env("PKG_NAME", &package.id.name)
            .env("PKG_REPO", &package.id.repo)
            .env("PKG_PATH", &package.dir)
            .env("PKG_HOOK", hook.map_or("", Hook::as_str))
            .current_dir(&package.dir)
            .kill_on_drop(true);
        cmd
    }

    /// Lists the stages `package` implements.
    ///
    /// Sources the prelude and `pkg.sh` in a throwaway shell and reads back the
    /// defined `pkg.*` functions. A package without `pkg.sh` has none.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::HookFailure`] (hook `pkg.sh`) when sourcing the
    /// script fails or the shell cannot list its functions,
    /// [`ShpmError::ShellNotFound`], or an error if the shell cannot run.
    pub async fn discover(&self, package: &Package) -> Result<HookSet> {
        let script = package.script_path();
        if !script.is_file() {
            tracing::debug!(target: "hooks", "{} has no lifecycle script", package.id);
            return Ok(HookSet::default());
        }

        let shell = self.resolve_shell()?;
        let output = self
            .base_command(&shell, package, None)
            .arg("-c")
            .arg(DISCOVER_SCRIPT)
            .arg("shpm")
            .arg(&script)
            .arg(DISCOVERY_MARKER)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to inspect {}", script.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let listing = match stdout.rsplit_once(DISCOVERY_MARKER) {
            Some((_, functions)) if output.status.success() => functions,
            _ => {
                let exit_code = output.status.code().unwrap_or(-1);
                tracing::warn!(
                    target: "hooks",
                    "Loading {} of {} failed with exit code {}: {}",
                    PACKAGE_SCRIPT_NAME,
                    package.id,
                    exit_code,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                return Err(ShpmError::HookFailure {
                    package: package.id.to_string(),
                    hook: PACKAGE_SCRIPT_NAME.to_string(),
                    exit_code,
                }
                .into());
            }
        };

        // `declare -F` prints one `declare -f <name>` line per function
        let hooks: HookSet = listing
            .lines()
            .filter_map(|line| line.split_whitespace().last())
            .filter_map(Hook::from_function_name)
            .collect();
        tracing::debug!(
            target: "hooks",
            "{} implements: {}",
            package.id,
            hooks.iter().map(Hook::as_str).collect::<Vec<_>>().join(", ")
        );
        Ok(hooks)
    }

    /// Runs one stage of `package` with extra environment variables.
    ///
    /// A non-zero exit is not an error here; it is reported in the outcome and
    /// turned into [`ShpmError::HookFailure`] by [`HookOutcome::into_result`].
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::HookBusy`] when another hook of the package is
    /// running, [`ShpmError::ShellNotFound`], or an error if the process cannot
    /// be spawned.
    pub async fn run_hook(
        &self,
        package: &Package,
        hook: Hook,
        env: &[(String, String)],
    ) -> Result<HookOutcome> {
        let _guard = self.acquire(&package.id, hook)?;

        let hooks = self.discover(package).await?;
        if !hooks.contains(hook) {
            tracing::debug!(target: "hooks", "{} does not implement {}, skipping", package.id, hook);
            return Ok(HookOutcome::skipped(hook));
        }

        let shell = self.resolve_shell()?;
        let mut cmd = self.base_command(&shell, package, Some(hook));
        cmd.arg("-c").arg(RUN_SCRIPT).arg("shpm").arg(package.script_path()).arg(hook.function_name());
        for (key, value) in env {
            cmd.env(key, value);
        }

        match self.output {
            OutputMode::Capture => {
                cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Inherit => {
                cmd.stdin(Stdio::inherit()).stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }

        tracing::info!(target: "hooks", "Running {} hook of {}", hook, package.id);
        let start = std::time::Instant::now();
        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run {} hook of {}", hook, package.id))?;

        let exit_code = output.status.code().unwrap_or(-1);
        tracing::debug!(
            target: "hooks",
            "{} hook of {} exited with {} after {}ms",
            hook,
            package.id,
            exit_code,
            start.elapsed().as_millis()
        );

        let (stdout, stderr) = match self.output {
            OutputMode::Capture => (
                Some(String::from_utf8_lossy(&output.stdout).into_owned()),
                Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            ),
            OutputMode::Inherit => (None, None),
        };

        Ok(HookOutcome {
            hook,
            exit_code,
            stdout,
            stderr,
            skipped: false,
        })
    }

    fn acquire(&self, id: &PackageId, hook: Hook) -> Result<InFlightGuard<'_>> {
        match self.in_flight.entry(id.clone()) {
            Entry::Occupied(running) => {
                tracing::warn!(
                    target: "hooks",
                    "Refusing {} hook of {}: {} hook still running",
                    hook,
                    id,
                    running.get()
                );
                Err(ShpmError::HookBusy {
                    package: id.to_string(),
                }
                .into())
            }
            Entry::Vacant(slot) => {
                slot.insert(hook);
                Ok(InFlightGuard {
                    in_flight: &self.in_flight,
                    id: id.clone(),
                })
            }
        }
    }
}

/// Writes the bundled prelude to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_prelude(path: &Path) -> Result<()> {
    atomic_write(path, BUNDLED_PRELUDE.as_bytes())
        .with_context(|| format!("Failed to write prelude to {}", path.display()))
}

//! Global constants used throughout the shpm codebase.
//!
//! File names of the persisted layout, environment variable names exported to
//! hook scripts, and the naming contract for lifecycle scripts all live here so
//! that the engine, the hook executor and the generated shell integration agree
//! on a single spelling.

/// Environment variable overriding the root configuration directory.
pub const HOME_ENV_VAR: &str = "SHPM_HOME";

/// Directory name used under the user's home directory when `SHPM_HOME` is unset.
pub const DEFAULT_HOME_DIR_NAME: &str = ".shpm";

/// Configuration file (settings and the `[repositories]` table).
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Installed package state file.
pub const STATE_FILE_NAME: &str = "state.toml";

/// Directory holding one git working copy per registered repository.
pub const REPOS_DIR_NAME: &str = "repos";

/// Bundled capability prelude written on `init`.
pub const PRELUDE_FILE_NAME: &str = "prelude.sh";

/// Marker touched after a command changed the shell environment.
pub const RELOAD_MARKER_NAME: &str = "reload";

/// Lifecycle script every package may ship at its root.
pub const PACKAGE_SCRIPT_NAME: &str = "pkg.sh";

/// Prefix of the shell functions that implement lifecycle hooks (`pkg.install`, ...).
pub const HOOK_FUNCTION_PREFIX: &str = "pkg.";

/// Default shell used to evaluate lifecycle scripts.
pub const DEFAULT_SHELL: &str = "bash";

/// Variables forwarded from the parent environment into hook scopes.
///
/// Everything else is cleared so that one package cannot observe state leaked
/// by the caller or by another package.
pub const FORWARDED_ENV_VARS: &[&str] =
    &["PATH", "HOME", "USER", "SHELL", "TERM", "LANG", "LC_ALL"];

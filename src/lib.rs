//! shpm - Shell Package Manager
//!
//! A Git-based package manager for shell environments. Packages are plain
//! directories inside Git repositories; each may carry a `pkg.sh` script that
//! defines lifecycle hooks (`pkg.install`, `pkg.update`, `pkg.remove`,
//! `pkg.load`). shpm clones the repositories, runs the hooks and generates a
//! script that loads enabled packages into every new shell.
//!
//! # Architecture Overview
//!
//! Everything lives below one home directory (`~/.shpm` by default):
//!
//! - `config.toml` holds settings and the registered repositories
//! - `state.toml` records installed packages and the commit they were installed at
//! - `repos/<name>` holds one Git working copy per repository
//! - `prelude.sh` provides helper functions (`shpm.link`, `shpm.has`, ...) to hooks
//!
//! There is no central registry and no lockfile: the repository's checked-out
//! `HEAD` is the installed version.
//!
//! # Core Modules
//!
//! - [`registry`] - named repositories and their working copies
//! - [`resolver`] - `[repo/]name` tokens to packages, search
//! - [`sync`] - clone and fast-forward working copies
//! - [`hooks`] - hook discovery and sandboxed execution
//! - [`state`] - persisted package records
//! - [`engine`] - install, update, remove and friends over all of the above
//!
//! ## Supporting Modules
//!
//! - [`cli`] - command-line interface
//! - [`config`] - home layout and `config.toml`
//! - [`core`] - error types and user-facing error rendering
//! - [`git`] - thin wrapper around the system `git` binary
//! - [`package`] - package identity
//! - [`utils`] - file system and platform helpers
//!
//! # Package Layout
//!
//! ```text
//! shell-packages/          # a repository
//! ├── fzf/
//! │   └── pkg.sh
//! └── aliases/
//!     ├── pkg.sh
//!     └── aliases.sh
//! ```
//!
//! A minimal `pkg.sh`:
//!
//! ```bash
//! pkg.install() {
//!     shpm.has fzf || shpm.warn "fzf binary not found"
//! }
//!
//! pkg.load() {
//!     . "$PKG_PATH/aliases.sh"
//! }
//! ```
//!
//! # Shell Integration
//!
//! ```bash
//! eval "$(shpm env)"
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod engine;
pub mod git;
pub mod hooks;
pub mod package;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod sync;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

//! Test utilities for shpm
//!
//! Helpers shared by unit tests and the integration suite: git repository
//! builders, package repository fixtures, and one-time logging setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use shpm::test_utils::PackageRepoFixture;
//!
//! # fn example() -> anyhow::Result<()> {
//! let temp = tempfile::TempDir::new()?;
//! let repo = PackageRepoFixture::new(temp.path(), "core")?;
//! repo.add_package("vim", Some("pkg.install() { :; }\n"))?;
//! let head = repo.commit("add vim")?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod git_helper;

pub use fixtures::{PackageRepoFixture, failing_script, logging_script};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` when set, otherwise uses `level`; with neither, tests
/// run without a subscriber.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

//! Test fixtures for package repositories
//!
//! [`PackageRepoFixture`] builds an upstream git repository whose top-level
//! directories are packages, optionally with a `pkg.sh` lifecycle script.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::git_helper::TestGit;
use crate::constants::PACKAGE_SCRIPT_NAME;

/// An upstream repository of packages, committed on branch `main`.
pub struct PackageRepoFixture {
    git: TestGit,
}

impl PackageRepoFixture {
    /// Creates an empty repository at `parent/name`.
    pub fn new(parent: &Path, name: &str) -> Result<Self> {
        let path = parent.join(name);
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create fixture dir {}", path.display()))?;

        let git = TestGit::new(&path);
        git.init_with_branch("main")?;
        git.config_user()?;
        fs::write(path.join("README.md"), format!("# {name}\n"))?;

        Ok(Self {
            git,
        })
    }

    /// Adds a package directory; `script` becomes its `pkg.sh` when given.
    pub fn add_package(&self, name: &str, script: Option<&str>) -> Result<&Self> {
        let dir = self.package_dir(name);
        fs::create_dir_all(&dir)?;
        // Packages without a script still need a tracked file to exist in git
        fs::write(dir.join("README.md"), format!("{name}\n"))?;
        if let Some(script) = script {
            fs::write(dir.join(PACKAGE_SCRIPT_NAME), script)?;
        }
        Ok(self)
    }

    /// Writes an arbitrary file relative to the repository root.
    pub fn write_file(&self, relative: &str, content: &str) -> Result<&Self> {
        let path = self.git.repo_path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(self)
    }

    /// Stages everything and commits; returns the new commit hash.
    pub fn commit(&self, message: &str) -> Result<String> {
        self.git.add_all()?;
        self.git.commit(message)?;
        self.git.rev_parse_head()
    }

    /// Directory of a package in the upstream repository.
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.git.repo_path().join(name)
    }

    /// `file://` URL of the repository.
    pub fn url(&self) -> String {
        self.git.file_url()
    }

    /// Current upstream commit.
    pub fn head(&self) -> Result<String> {
        self.git.rev_parse_head()
    }

    /// Underlying git helper.
    pub fn git(&self) -> &TestGit {
        &self.git
    }
}

/// `pkg.sh` whose four hooks append `<hook> <package>` lines to `log_file`.
///
/// Pass a path outside the working copy so the repository stays clean.
pub fn logging_script(log_file: &Path) -> String {
    let log = log_file.display();
    format!(
        r#"pkg.install() {{ echo "install $PKG_NAME" >> "{log}"; }}
pkg.update() {{ echo "update $PKG_NAME" >> "{log}"; }}
pkg.remove() {{ echo "remove $PKG_NAME" >> "{log}"; }}
pkg.load() {{ echo "load $PKG_NAME" >> "{log}"; }}
"#
    )
}

/// `pkg.sh` whose `hook` exits with `code`.
pub fn failing_script(hook: &str, code: i32) -> String {
    format!("pkg.{hook}() {{ echo \"{hook} failing\" >&2; return {code}; }}\n")
}

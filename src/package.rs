//! Package identity and on-disk location.
//!
//! A package is not persisted on its own: it is any non-hidden top-level
//! directory of a synced repository. Its identity is the pair
//! `(repository, name)`, written `repository/name` everywhere users see it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::PACKAGE_SCRIPT_NAME;

/// Identity of a package: `(repository, name)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId {
    /// Repository name
    pub repo: String,
    /// Package name, unique within the repository
    pub name: String,
}

impl PackageId {
    /// Builds an id from its two parts.
    pub fn new(repo: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repo, self.name)
    }
}

/// A package located inside a repository working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Identity
    pub id: PackageId,
    /// Path relative to the repository root
    pub path: PathBuf,
    /// Absolute directory of the package
    pub dir: PathBuf,
}

impl Package {
    /// Package `name` inside the working copy at `repo_root`.
    pub fn new(repo: &str, name: &str, repo_root: &Path) -> Self {
        Self {
            id: PackageId::new(repo, name),
            path: PathBuf::from(name),
            dir: repo_root.join(name),
        }
    }

    /// Location of the lifecycle script, whether or not it exists.
    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.dir.join(PACKAGE_SCRIPT_NAME)
    }
}

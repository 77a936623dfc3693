//! Health of installed records.
//!
//! A record is *dangling* when it can no longer be backed by a package on
//! disk. `list` shows the reason, `env` skips such records with a warning and
//! `update` fails for them.

use serde::Serialize;
use std::fmt;

use crate::registry::RepositoryRegistry;
use crate::state::PackageRecord;

/// Whether a record can be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Repository registered and synced, package present.
    Ok,
    /// Marked orphaned when its repository was removed.
    Orphaned,
    /// Repository no longer registered.
    RepositoryMissing,
    /// Repository registered but has no working copy.
    NotSynced,
    /// Working copy no longer contains the package.
    PackageMissing,
}

impl RecordStatus {
    /// Computes the status of `record` against the registry and the working copies.
    #[must_use]
    pub fn of(record: &PackageRecord, registry: &RepositoryRegistry) -> Self {
        if record.orphaned {
            return Self::Orphaned;
        }
        let Some(repository) = registry.get(&record.repo) else {
            return Self::RepositoryMissing;
        };
        if !repository.is_synced() {
            return Self::NotSynced;
        }
        if !repository.local_path.join(&record.name).is_dir() {
            return Self::PackageMissing;
        }
        Self::Ok
    }

    /// Anything but [`RecordStatus::Ok`].
    #[must_use]
    pub fn is_dangling(self) -> bool {
        self != Self::Ok
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Orphaned => "orphaned",
            Self::RepositoryMissing => "repository missing",
            Self::NotSynced => "repository not synced",
            Self::PackageMissing => "package missing",
        })
    }
}

/// One row of `shpm list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    /// The installed record
    #[serde(flatten)]
    pub record: PackageRecord,
    /// Whether it can be loaded
    pub status: RecordStatus,
}

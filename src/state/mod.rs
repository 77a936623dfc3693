//! Installed package state.
//!
//! The [`StateStore`] is the only writer of [`PackageRecord`]s. Every mutation
//! is persisted immediately with an atomic write, so targets that completed
//! earlier in a batch survive a later crash.
//!
//! # File Format
//!
//! ```toml
//! # Managed by shpm - DO NOT EDIT
//! version = 1
//!
//! [[package]]
//! repo = "core"
//! name = "vim"
//! commit = "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
//! enabled = true
//! installed_at = "2026-10-19T09:30:00Z"
//! ```
//!
//! # Known limitation
//!
//! There is no locking between concurrent shpm processes. Two invocations
//! writing the same home at the same time race, and the last writer wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::ShpmError;
use crate::package::PackageId;
use crate::utils::fs::atomic_write;

const STATE_VERSION: u32 = 1;

const fn default_true() -> bool {
    true
}

const fn is_false(value: &bool) -> bool {
    !*value
}

/// Persisted state of one installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Repository the package was installed from
    pub repo: String,
    /// Package name
    pub name: String,
    /// Commit of the repository at install or last update
    pub commit: String,
    /// Disabled packages stay installed but are not loaded into the shell
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Set when the backing repository was removed while the package was installed
    #[serde(default, skip_serializing_if = "is_false")]
    pub orphaned: bool,
    /// Install time
    pub installed_at: DateTime<Utc>,
    /// Time of the last successful update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PackageRecord {
    /// A freshly installed, enabled record stamped with the current time.
    pub fn new(repo: impl Into<String>, name: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            name: name.into(),
            commit: commit.into(),
            enabled: true,
            orphaned: false,
            installed_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Identity of the package this record tracks.
    #[must_use]
    pub fn id(&self) -> PackageId {
        PackageId::new(&self.repo, &self.name)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    version: u32,
    #[serde(default, rename = "package")]
    packages: Vec<PackageRecord>,
}

/// Durable store of [`PackageRecord`]s keyed by `(repo, name)`.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    records: BTreeMap<PackageId, PackageRecord>,
}

impl StateStore {
    /// Loads the store from `path`; a missing or empty file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::StateParseError`] when the file is not valid state TOML,
    /// or an I/O error when it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            records: BTreeMap::new(),
        };

        if !path.exists() {
            return Ok(store);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read state file: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(store);
        }

        let file: StateFile = toml::from_str(&content).map_err(|e| ShpmError::StateParseError {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if file.version > STATE_VERSION {
            tracing::warn!(
                target: "state",
                "State file {} has version {} (this shpm understands {})",
                path.display(),
                file.version,
                STATE_VERSION
            );
        }

        for record in file.packages {
            store.records.insert(record.id(), record);
        }
        tracing::debug!(target: "state", "Loaded {} package records", store.records.len());
        Ok(store)
    }

    /// Writes the whole store atomically.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub fn save(&self) -> Result<()> {
        let file = StateFile {
            version: STATE_VERSION,
            packages: self.records.values().cloned().collect(),
        };

        let mut content = String::from("# Managed by shpm - DO NOT EDIT\n");
        content.push_str(&toml::to_string_pretty(&file).context("Failed to serialize state")?);

        atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Cannot write state file: {}", self.path.display()))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record for `repo/name`, if installed.
    #[must_use]
    pub fn get(&self, repo: &str, name: &str) -> Option<&PackageRecord> {
        self.records.get(&PackageId::new(repo, name))
    }

    /// Inserts or replaces a record and persists the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written; the in-memory state is
    /// rolled back in that case.
    pub fn put(&mut self, record: PackageRecord) -> Result<()> {
        let id = record.id();
        let previous = self.records.insert(id.clone(), record);

        if let Err(e) = self.save() {
            match previous {
                Some(previous) => self.records.insert(id, previous),
                None => self.records.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Removes the record for `repo/name` and persists the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written; the record is restored
    /// in memory in that case.
    pub fn delete(&mut self, repo: &str, name: &str) -> Result<Option<PackageRecord>> {
        let id = PackageId::new(repo, name);
        let Some(removed) = self.records.remove(&id) else {
            return Ok(None);
        };

        if let Err(e) = self.save() {
            self.records.insert(id, removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    /// All records ordered by `(repo, name)`.
    #[must_use]
    pub fn list(&self) -> Vec<&PackageRecord> {
        self.records.values().collect()
    }

    /// Enabled, non-orphaned records ordered by `(repo, name)`.
    #[must_use]
    pub fn list_enabled(&self) -> Vec<&PackageRecord> {
        self.records.values().filter(|r| r.enabled && !r.orphaned).collect()
    }

    /// Records installed from `repo`.
    #[must_use]
    pub fn records_for_repo(&self, repo: &str) -> Vec<&PackageRecord> {
        self.records.values().filter(|r| r.repo == repo).collect()
    }

    /// Marks every record of `repo` as orphaned and returns the affected records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn mark_orphaned(&mut self, repo: &str) -> Result<Vec<PackageRecord>> {
        let mut affected = Vec::new();
        for record in self.records.values_mut().filter(|r| r.repo == repo) {
            record.orphaned = true;
            affected.push(record.clone());
        }

        if !affected.is_empty() {
            self.save()?;
        }
        Ok(affected)
    }

    /// Enables or disables an installed package.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::NotInstalled`] when there is no record, or an error
    /// if the store cannot be written.
    pub fn set_enabled(&mut self, repo: &str, name: &str, enabled: bool) -> Result<PackageRecord> {
        let id = PackageId::new(repo, name);
        let mut record = self.records.get(&id).cloned().ok_or_else(|| ShpmError::NotInstalled {
            package: id.to_string(),
        })?;

        record.enabled = enabled;
        self.put(record.clone())?;
        Ok(record)
    }
}

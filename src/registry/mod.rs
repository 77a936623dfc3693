//! Registered source repositories.
//!
//! A [`Repository`] pairs a unique name with a git remote URL and the location
//! of its working copy (`<home>/repos/<name>`). The registry itself is the
//! `[repositories]` table of `config.toml`; every mutation rewrites that file.
//!
//! # Removal
//!
//! Removing a repository deletes its working copy. Installed packages that
//! still reference it are never deleted here: without `--force` the removal is
//! refused with [`ShpmError::RepositoryInUse`] while any of them is enabled,
//! and with `--force` every referencing record is marked orphaned and handed
//! back to the caller for reporting. Shell state that was already sourced from
//! those packages is left alone.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{Config, Layout};
use crate::core::ShpmError;
use crate::git::is_valid_git_repo;
use crate::state::{PackageRecord, StateStore};
use crate::utils::fs::remove_dir_all;

/// A named git repository containing packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// Unique identifier, also the directory name of the working copy
    pub name: String,
    /// Remote URL (HTTPS, SSH, `file://` or a local path git understands)
    pub url: String,
    /// Working copy location
    pub local_path: PathBuf,
}

impl Repository {
    /// Creates a repository whose working copy lives below `repos_dir`.
    pub fn new(name: impl Into<String>, url: impl Into<String>, repos_dir: &Path) -> Self {
        let name = name.into();
        let local_path = repos_dir.join(&name);
        Self {
            name,
            url: url.into(),
            local_path,
        }
    }

    /// Whether the working copy exists and is a git repository.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.local_path.is_dir() && is_valid_git_repo(&self.local_path)
    }
}

/// Outcome of [`RepositoryRegistry::remove`].
#[derive(Debug, Clone)]
pub struct RepositoryRemoval {
    /// The repository that was unregistered
    pub repository: Repository,
    /// Records that now point at a missing repository
    pub orphaned: Vec<PackageRecord>,
}

/// Rejects names that cannot serve as a directory name and token prefix.
///
/// # Errors
///
/// Returns [`ShpmError::InvalidRepositoryName`] for empty names, names
/// containing `/`, `\` or whitespace, and names starting with `.`.
pub fn validate_repository_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name must not be empty")
    } else if name.contains('/') || name.contains('\\') {
        Some("name must not contain path separators")
    } else if name.chars().any(char::is_whitespace) {
        Some("name must not contain whitespace")
    } else if name.starts_with('.') {
        Some("name must not start with '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ShpmError::InvalidRepositoryName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Name-indexed set of registered repositories.
#[derive(Debug, Clone)]
pub struct RepositoryRegistry {
    layout: Layout,
    repositories: BTreeMap<String, Repository>,
}

impl RepositoryRegistry {
    /// Builds the registry from the `[repositories]` table of `config`.
    #[must_use]
    pub fn from_config(layout: &Layout, config: &Config) -> Self {
        let repos_dir = layout.repos_dir();
        let repositories = config
            .repositories
            .iter()
            .map(|(name, url)| (name.clone(), Repository::new(name, url, &repos_dir)))
            .collect();

        Self {
            layout: layout.clone(),
            repositories,
        }
    }

    /// Loads `config.toml` from the layout and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or parsed.
    pub async fn load(layout: &Layout) -> Result<Self> {
        let config = Config::load(&layout.config_file()).await?;
        Ok(Self::from_config(layout, &config))
    }

    /// All repositories sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<&Repository> {
        self.repositories.values().collect()
    }

    /// Repositories with a working copy, sorted by name.
    #[must_use]
    pub fn synced(&self) -> Vec<&Repository> {
        self.repositories.values().filter(|r| r.is_synced()).collect()
    }

    /// Repository by name, if registered.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.get(name)
    }

    /// Repository by name.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::RepositoryNotFound`] if no such repository is registered.
    pub fn resolve(&self, name: &str) -> Result<&Repository> {
        self.repositories.get(name).ok_or_else(|| {
            ShpmError::RepositoryNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Registers a repository and persists the registry.
    ///
    /// The working copy is not created here; the next sync clones it.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::InvalidRepositoryName`], [`ShpmError::DuplicateRepository`],
    /// or an error if `config.toml` cannot be written.
    pub async fn add(&mut self, name: &str, url: &str) -> Result<Repository> {
        validate_repository_name(name)?;

        if self.repositories.contains_key(name) {
            return Err(ShpmError::DuplicateRepository {
                name: name.to_string(),
            }
            .into());
        }
        if url.trim().is_empty() {
            return Err(ShpmError::ConfigError {
                message: format!("Repository '{name}' needs a non-empty URL"),
            }
            .into());
        }

        let repository = Repository::new(name, url.trim(), &self.layout.repos_dir());
        self.repositories.insert(name.to_string(), repository.clone());

        if let Err(e) = self.persist().await {
            self.repositories.remove(name);
            return Err(e);
        }

        tracing::info!(target: "registry", "Registered repository '{}' ({})", name, repository.url);
        Ok(repository)
    }

    /// Unregisters a repository and deletes its working copy.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::RepositoryNotFound`], [`ShpmError::RepositoryInUse`]
    /// when enabled packages reference the repository and `force` is false, or an
    /// error if the state, config or working copy cannot be updated.
    pub async fn remove(
        &mut self,
        name: &str,
        force: bool,
        store: &mut StateStore,
    ) -> Result<RepositoryRemoval> {
        let repository = self.resolve(name)?.clone();

        let in_use: Vec<String> = store
            .records_for_repo(name)
            .into_iter()
            .filter(|r| r.enabled && !r.orphaned)
            .map(|r| r.id().to_string())
            .collect();

        if !in_use.is_empty() && !force {
            return Err(ShpmError::RepositoryInUse {
                name: name.to_string(),
                packages: in_use,
            }
            .into());
        }

        let orphaned = store
            .mark_orphaned(name)
            .with_context(|| format!("Failed to orphan packages of repository '{name}'"))?;
        for record in &orphaned {
            tracing::warn!(target: "registry", "Package '{}' is now orphaned", record.id());
        }

        self.repositories.remove(name);
        if let Err(e) = self.persist().await {
            self.repositories.insert(name.to_string(), repository);
            return Err(e);
        }

        remove_dir_all(&repository.local_path).with_context(|| {
            format!("Repository '{name}' was unregistered but its working copy could not be deleted")
        })?;

        tracing::info!(target: "registry", "Removed repository '{}'", name);
        Ok(RepositoryRemoval {
            repository,
            orphaned,
        })
    }

    /// Rewrites the `[repositories]` table, keeping every other setting.
    async fn persist(&self) -> Result<()> {
        let path = self.layout.config_file();
        let mut config = Config::load(&path).await?;
        config.repositories =
            self.repositories.values().map(|r| (r.name.clone(), r.url.clone())).collect();
        config.save(&path)
    }
}

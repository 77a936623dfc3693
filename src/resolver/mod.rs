//! Package name resolution.
//!
//! Users name packages with tokens of the form `[repository/]name`. The
//! [`PackageResolver`] turns a token into a concrete repository and package:
//!
//! - `repo/name` requires `repo` to be registered. If the repository has a
//!   working copy the package must exist in it; otherwise the pair is returned
//!   unverified and the caller checks existence after syncing.
//! - `name` searches every synced repository. Exactly one match resolves,
//!   none is [`ShpmError::PackageNotFound`] and several are
//!   [`ShpmError::AmbiguousPackage`] listing every `repo/name` candidate.
//!   There is no default repository.
//!
//! Resolution reads the registry and the working copies only; it never syncs
//! and never touches installed state.

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use std::fmt;

use crate::core::ShpmError;
use crate::package::Package;
use crate::registry::{Repository, RepositoryRegistry};
use crate::state::{PackageRecord, StateStore};
use crate::utils::fs::list_subdirectories;

/// A parsed `[repository/]name` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageToken {
    /// Repository qualifier, if given
    pub repo: Option<String>,
    /// Package name
    pub name: String,
}

impl PackageToken {
    /// Parses a command-line token.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::InvalidToken`] when a part is empty, the token
    /// contains more than one `/`, or the name is hidden (starts with `.`).
    pub fn parse(token: &str) -> Result<Self> {
        let invalid = || ShpmError::InvalidToken {
            token: token.to_string(),
        };

        let parts: Vec<&str> = token.split('/').collect();
        let parsed = match parts.as_slice() {
            [name] if !name.is_empty() => Self {
                repo: None,
                name: (*name).to_string(),
            },
            [repo, name] if !repo.is_empty() && !name.is_empty() => Self {
                repo: Some((*repo).to_string()),
                name: (*name).to_string(),
            },
            _ => return Err(invalid().into()),
        };

        // Hidden directories such as `.git` are never packages
        if parsed.name.starts_with('.') || parsed.name.chars().any(char::is_whitespace) {
            return Err(invalid().into());
        }
        Ok(parsed)
    }
}

impl fmt::Display for PackageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repo {
            Some(repo) => write!(f, "{repo}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Result of resolving a token against the registry.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    /// Repository containing the package
    pub repository: Repository,
    /// The package itself
    pub package: Package,
    /// False when the repository had no working copy and existence is unchecked
    pub verified: bool,
}

/// One hit of [`PackageResolver::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Repository name
    pub repo: String,
    /// Package name
    pub name: String,
    /// Whether an installed record exists
    pub installed: bool,
}

/// Packages available in a repository's working copy, sorted by name.
///
/// A repository without a working copy has no packages.
///
/// # Errors
///
/// Returns an error if the working copy cannot be listed.
pub fn list_packages(repository: &Repository) -> Result<Vec<Package>> {
    if !repository.is_synced() {
        return Ok(Vec::new());
    }

    let entries = list_subdirectories(&repository.local_path).with_context(|| {
        format!("Failed to list packages of repository '{}'", repository.name)
    })?;

    Ok(entries
        .into_iter()
        .map(|(name, _)| Package::new(&repository.name, &name, &repository.local_path))
        .collect())
}

/// Whether `name` is one of the packages [`list_packages`] reports.
///
/// # Errors
///
/// Returns an error if the working copy cannot be listed.
pub fn package_exists(repository: &Repository, name: &str) -> Result<bool> {
    Ok(list_packages(repository)?.iter().any(|p| p.id.name == name))
}

/// Resolves tokens against a [`RepositoryRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct PackageResolver<'a> {
    registry: &'a RepositoryRegistry,
}

impl<'a> PackageResolver<'a> {
    /// Creates a resolver over `registry`.
    #[must_use]
    pub const fn new(registry: &'a RepositoryRegistry) -> Self {
        Self {
            registry,
        }
    }

    /// Resolves a token to an available package.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::InvalidToken`], [`ShpmError::RepositoryNotFound`],
    /// [`ShpmError::PackageNotFound`] or [`ShpmError::AmbiguousPackage`].
    pub fn resolve(&self, token: &str) -> Result<ResolvedPackage> {
        let parsed = PackageToken::parse(token)?;

        if let Some(repo_name) = &parsed.repo {
            let repository = self.registry.resolve(repo_name)?;

            if !repository.is_synced() {
                tracing::debug!(
                    target: "resolver",
                    "Repository '{}' not synced yet, deferring check for '{}'",
                    repo_name,
                    parsed.name
                );
                return Ok(ResolvedPackage {
                    package: Package::new(repo_name, &parsed.name, &repository.local_path),
                    repository: repository.clone(),
                    verified: false,
                });
            }

            if !package_exists(repository, &parsed.name)? {
                return Err(ShpmError::PackageNotFound {
                    name: token.to_string(),
                }
                .into());
            }

            return Ok(ResolvedPackage {
                package: Package::new(repo_name, &parsed.name, &repository.local_path),
                repository: repository.clone(),
                verified: true,
            });
        }

        let mut candidates = Vec::new();
        for repository in self.registry.synced() {
            if package_exists(repository, &parsed.name)? {
                candidates.push(repository);
            }
        }

        match candidates.as_slice() {
            [] => Err(ShpmError::PackageNotFound {
                name: parsed.name,
            }
            .into()),
            [repository] => {
                tracing::debug!(
                    target: "resolver",
                    "Resolved '{}' to {}/{}",
                    token,
                    repository.name,
                    parsed.name
                );
                Ok(ResolvedPackage {
                    package: Package::new(&repository.name, &parsed.name, &repository.local_path),
                    repository: (*repository).clone(),
                    verified: true,
                })
            }
            many => Err(ShpmError::AmbiguousPackage {
                candidates: many.iter().map(|r| format!("{}/{}", r.name, parsed.name)).collect(),
                name: parsed.name,
            }
            .into()),
        }
    }

    /// Resolves a token to an installed record.
    ///
    /// Works for packages whose repository is no longer registered, so
    /// orphaned packages stay addressable.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::InvalidToken`], [`ShpmError::NotInstalled`] or
    /// [`ShpmError::AmbiguousPackage`].
    pub fn resolve_installed(&self, token: &str, store: &StateStore) -> Result<PackageRecord> {
        let parsed = PackageToken::parse(token)?;

        if let Some(repo_name) = &parsed.repo {
            return store.get(repo_name, &parsed.name).cloned().ok_or_else(|| {
                ShpmError::NotInstalled {
                    package: token.to_string(),
                }
                .into()
            });
        }

        let matches: Vec<&PackageRecord> =
            store.list().into_iter().filter(|r| r.name == parsed.name).collect();

        match matches.as_slice() {
            [] => Err(ShpmError::NotInstalled {
                package: token.to_string(),
            }
            .into()),
            [record] => Ok((*record).clone()),
            many => Err(ShpmError::AmbiguousPackage {
                candidates: many.iter().map(|r| r.id().to_string()).collect(),
                name: parsed.name,
            }
            .into()),
        }
    }

    /// Lists packages of synced repositories whose name matches `pattern`.
    ///
    /// Patterns containing `*`, `?` or `[` are globs; anything else matches as a
    /// case-insensitive substring. An empty pattern lists everything.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed glob or an unreadable working copy.
    pub fn search(&self, pattern: &str, store: &StateStore) -> Result<Vec<SearchHit>> {
        let matcher = NameMatcher::new(pattern)?;
        let mut hits = Vec::new();

        for repository in self.registry.synced() {
            for package in list_packages(repository)? {
                if matcher.matches(&package.id.name) {
                    hits.push(SearchHit {
                        installed: store.get(&package.id.repo, &package.id.name).is_some(),
                        repo: package.id.repo,
                        name: package.id.name,
                    });
                }
            }
        }

        Ok(hits)
    }
}

enum NameMatcher {
    Glob(Pattern),
    Substring(String),
}

impl NameMatcher {
    fn new(pattern: &str) -> Result<Self> {
        if pattern.contains(['*', '?', '[']) {
            let glob = Pattern::new(pattern)
                .with_context(|| format!("Invalid search pattern '{pattern}'"))?;
            Ok(Self::Glob(glob))
        } else {
            Ok(Self::Substring(pattern.to_lowercase()))
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Glob(glob) => glob.matches_with(
                name,
                MatchOptions {
                    case_sensitive: false,
                    ..MatchOptions::new()
                },
            ),
            Self::Substring(needle) => name.to_lowercase().contains(needle),
        }
    }
}

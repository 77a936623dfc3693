//! Repository working copy synchronization.
//!
//! [`SyncEngine::sync_repository`] brings a repository's working copy up to
//! date with its remote without ever discarding local state:
//!
//! | Working copy                         | Action                        | `changed` |
//! |--------------------------------------|-------------------------------|-----------|
//! | missing                              | clone                         | `true`    |
//! | present, not a git repository        | [`ShpmError::SyncError`]      |           |
//! | uncommitted modifications            | [`ShpmError::SyncConflict`]   |           |
//! | `HEAD` equals upstream               | nothing                       | `false`   |
//! | `HEAD` behind upstream               | `merge --ff-only`             | `true`    |
//! | `HEAD` ahead of upstream             | nothing (local commits kept)  | `false`   |
//! | diverged, or no upstream branch      | [`ShpmError::SyncConflict`]   |           |
//!
//! Running a sync twice without upstream changes reports `changed = false` the
//! second time and leaves the working copy untouched.
//!
//! [`SyncSession`] memoizes results so that a batch touching several packages
//! of one repository syncs it only once; a failure is remembered too.

use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::core::ShpmError;
use crate::git::{GitRepo, is_valid_git_repo};
use crate::registry::Repository;
use crate::utils::fs::ensure_dir;

/// Result of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// `HEAD` of the working copy after the sync
    pub commit: String,
    /// Whether the working copy was created or moved
    pub changed: bool,
}

/// Clones and fast-forwards repository working copies.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    timeout: Option<Duration>,
}

impl SyncEngine {
    /// Creates an engine; `timeout` bounds each git command when set.
    #[must_use]
    pub const fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
        }
    }

    /// Brings one repository up to date.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::SyncError`] when the working copy cannot be cloned or
    /// fetched or is not a git repository, [`ShpmError::SyncConflict`] when it
    /// cannot be fast-forwarded safely, and [`ShpmError::GitNotFound`] when git is
    /// missing.
    pub async fn sync_repository(&self, repository: &Repository) -> Result<SyncResult> {
        let name = repository.name.as_str();
        let path = &repository.local_path;

        if !path.exists() {
            tracing::info!(target: "sync", "Cloning '{}' from {}", name, repository.url);
            if let Some(parent) = path.parent() {
                ensure_dir(parent)?;
            }
            let repo = GitRepo::clone(&repository.url, path, name, self.timeout).await?;
            let commit = repo.head().await.map_err(|e| as_sync_error(name, e))?;
            return Ok(SyncResult {
                commit,
                changed: true,
            });
        }

        if !path.is_dir() || !is_valid_git_repo(path) {
            return Err(ShpmError::SyncError {
                repository: name.to_string(),
                reason: format!("{} exists but is not a git working copy", path.display()),
            }
            .into());
        }

        let repo = GitRepo::new(path).with_context(name).with_timeout(self.timeout);

        if repo.has_local_changes().await? {
            return Err(ShpmError::SyncConflict {
                repository: name.to_string(),
                reason: "working copy has uncommitted changes".to_string(),
            }
            .into());
        }

        if let Ok(origin) = repo.remote_url().await {
            if origin != repository.url {
                tracing::warn!(
                    target: "sync",
                    "Repository '{}' is registered as {} but its working copy tracks {}",
                    name,
                    repository.url,
                    origin
                );
            }
        }

        repo.fetch().await.map_err(|e| as_sync_error(name, e))?;

        let head = repo.head().await?;
        let Some(upstream) = repo.upstream().await? else {
            return Err(ShpmError::SyncConflict {
                repository: name.to_string(),
                reason: "the checked out branch does not track an upstream branch".to_string(),
            }
            .into());
        };
        let remote = repo.rev_parse(&upstream).await?;

        if head == remote {
            tracing::debug!(target: "sync", "'{}' is up to date at {}", name, short(&head));
            return Ok(SyncResult {
                commit: head,
                changed: false,
            });
        }

        if repo.is_ancestor(&head, &remote).await? {
            tracing::info!(
                target: "sync",
                "Fast-forwarding '{}' {}..{}",
                name,
                short(&head),
                short(&remote)
            );
            repo.fast_forward(&upstream).await.map_err(|e| as_sync_error(name, e))?;
            let commit = repo.head().await?;
            return Ok(SyncResult {
                commit,
                changed: true,
            });
        }

        if repo.is_ancestor(&remote, &head).await? {
            tracing::warn!(
                target: "sync",
                "'{}' has local commits not in {}, leaving it as is",
                name,
                upstream
            );
            return Ok(SyncResult {
                commit: head,
                changed: false,
            });
        }

        Err(ShpmError::SyncConflict {
            repository: name.to_string(),
            reason: format!("local branch and {upstream} have diverged"),
        }
        .into())
    }

    /// Syncs every repository in order; one failure never stops the others.
    pub async fn sync_all<'a, I>(&self, repositories: I) -> BTreeMap<String, Result<SyncResult, ShpmError>>
    where
        I: IntoIterator<Item = &'a Repository>,
    {
        let mut results = BTreeMap::new();
        for repository in repositories {
            let result = self
                .sync_repository(repository)
                .await
                .map_err(|e| ShpmError::from_anyhow(&e));
            if let Err(e) = &result {
                tracing::warn!(target: "sync", "Sync of '{}' failed: {}", repository.name, e);
            }
            results.insert(repository.name.clone(), result);
        }
        results
    }
}

/// Per-batch memo of sync results keyed by repository name.
#[derive(Debug)]
pub struct SyncSession<'a> {
    engine: &'a SyncEngine,
    results: HashMap<String, Result<SyncResult, ShpmError>>,
}

impl<'a> SyncSession<'a> {
    /// Starts an empty session.
    #[must_use]
    pub fn new(engine: &'a SyncEngine) -> Self {
        Self {
            engine,
            results: HashMap::new(),
        }
    }

    /// Syncs `repository` unless it was already attempted in this session.
    ///
    /// # Errors
    ///
    /// Returns the (possibly memoized) sync failure.
    pub async fn sync(&mut self, repository: &Repository) -> Result<SyncResult, ShpmError> {
        if let Some(result) = self.results.get(&repository.name) {
            tracing::debug!(target: "sync", "Reusing sync result for '{}'", repository.name);
            return result.clone();
        }

        let result = self
            .engine
            .sync_repository(repository)
            .await
            .map_err(|e| ShpmError::from_anyhow(&e));
        self.results.insert(repository.name.clone(), result.clone());
        result
    }

    /// Results of the repositories synced so far.
    #[must_use]
    pub fn results(&self) -> &HashMap<String, Result<SyncResult, ShpmError>> {
        &self.results
    }
}

/// Network-facing git failures surface as [`ShpmError::SyncError`].
fn as_sync_error(repository: &str, error: anyhow::Error) -> anyhow::Error {
    match ShpmError::from_anyhow(&error) {
        ShpmError::GitCommandError {
            operation,
            stderr,
        } => ShpmError::SyncError {
            repository: repository.to_string(),
            reason: if stderr.is_empty() {
                format!("git {operation} failed")
            } else {
                stderr
            },
        }
        .into(),
        _ => error,
    }
}

fn short(commit: &str) -> &str {
    &commit[..commit.len().min(8)]
}

//! Git operations wrapper for shpm
//!
//! A thin async wrapper around the system `git` command. Like Cargo's
//! `git-fetch-with-cli`, shpm drives the installed git binary instead of an
//! embedded implementation so that SSH agents, credential helpers and the
//! user's git configuration all keep working.
//!
//! [`GitRepo`] exposes exactly the queries the sync engine needs to decide
//! between clone, fast-forward, no-op and conflict:
//!
//! - [`GitRepo::clone`] for the first sync
//! - [`GitRepo::fetch`], [`GitRepo::head`], [`GitRepo::upstream`] and
//!   [`GitRepo::is_ancestor`] to classify the relation between local and remote
//! - [`GitRepo::fast_forward`] to move the working copy forward
//! - [`GitRepo::has_local_changes`] to refuse to touch modified working copies
//!
//! None of these operations ever resets or discards local modifications.

pub mod command_builder;

use crate::core::ShpmError;
use crate::git::command_builder::GitCommand;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A git working copy on disk.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
    context: Option<String>,
    timeout: Option<Duration>,
}

impl GitRepo {
    /// Wraps an existing directory without validating it.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            context: None,
            timeout: None,
        }
    }

    /// Attaches a log context (usually the repository name) to every command.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Applies a timeout to every command run against this repository.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, cmd: GitCommand) -> GitCommand {
        let cmd = cmd.current_dir(&self.path).with_timeout(self.timeout);
        match &self.context {
            Some(ctx) => cmd.with_context(ctx.clone()),
            None => cmd,
        }
    }

    /// Clones `url` into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::SyncError`] if the clone fails.
    pub async fn clone(
        url: &str,
        target: impl AsRef<Path>,
        context: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let target = target.as_ref();

        GitCommand::clone(url, target)
            .with_context(context)
            .with_timeout(timeout)
            .execute_success()
            .await?;

        Ok(Self::new(target).with_context(context).with_timeout(timeout))
    }

    /// Fetches `origin`, updating remote-tracking refs only.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::GitCommandError`] if the fetch fails.
    pub async fn fetch(&self) -> Result<()> {
        self.command(GitCommand::fetch()).execute_success().await
    }

    /// Commit hash of `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns an error if `HEAD` cannot be resolved (e.g. an empty repository).
    pub async fn head(&self) -> Result<String> {
        self.command(GitCommand::current_commit())
            .execute_stdout()
            .await
            .with_context(|| format!("Failed to read HEAD of {}", self.path.display()))
    }

    /// Resolves any revision to a commit hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision does not exist.
    pub async fn rev_parse(&self, rev: &str) -> Result<String> {
        self.command(GitCommand::rev_parse(rev)).execute_stdout().await
    }

    /// Name of the upstream branch the current branch tracks, if any.
    ///
    /// # Errors
    ///
    /// Returns an error only if git itself cannot run.
    pub async fn upstream(&self) -> Result<Option<String>> {
        match self.command(GitCommand::upstream()).execute_stdout().await {
            Ok(name) if !name.is_empty() => Ok(Some(name)),
            Ok(_) => Ok(None),
            Err(e) => match e.downcast_ref::<ShpmError>() {
                // Detached HEAD or no tracking branch configured
                Some(ShpmError::GitCommandError {
                    ..
                }) => Ok(None),
                _ => Err(e),
            },
        }
    }

    /// Whether `ancestor` is reachable from `descendant`.
    ///
    /// # Errors
    ///
    /// Returns an error only if git itself cannot run.
    pub async fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        self.command(GitCommand::is_ancestor(ancestor, descendant)).execute_check().await
    }

    /// Fast-forwards the current branch to `target`, then updates submodules.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::GitCommandError`] if the merge is not a fast-forward.
    pub async fn fast_forward(&self, target: &str) -> Result<()> {
        self.command(GitCommand::merge_ff_only(target)).execute_success().await?;
        self.command(GitCommand::submodule_update()).execute_success().await
    }

    /// Whether tracked files have uncommitted changes.
    ///
    /// Untracked files, such as build output left by hooks, do not count.
    ///
    /// # Errors
    ///
    /// Returns an error if `git status` fails.
    pub async fn has_local_changes(&self) -> Result<bool> {
        let status = self.command(GitCommand::status_porcelain()).execute_stdout().await?;
        Ok(!status.is_empty())
    }

    /// URL of the `origin` remote.
    ///
    /// # Errors
    ///
    /// Returns an error if no `origin` remote is configured.
    pub async fn remote_url(&self) -> Result<String> {
        self.command(GitCommand::remote_url()).execute_stdout().await
    }

    /// Whether the directory looks like a git working copy.
    #[must_use]
    pub fn is_git_repo(&self) -> bool {
        is_valid_git_repo(&self.path)
    }

    /// Path of the working copy.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A working copy has a `.git` directory (or a `.git` file for linked checkouts).
#[must_use]
pub fn is_valid_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

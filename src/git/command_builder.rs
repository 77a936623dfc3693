//! Type-safe Git command builder for consistent command execution
//!
//! This module provides a fluent API for building and executing Git commands,
//! so that every git invocation shares the same logging, error mapping and
//! environment handling.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::ShpmError;
use crate::utils::platform::get_git_command;

/// Builder for constructing and executing Git commands.
///
/// # Examples
///
/// ```rust,no_run
/// use shpm::git::command_builder::GitCommand;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let head = GitCommand::rev_parse("HEAD")
///     .current_dir(Path::new("/path/to/repo"))
///     .execute_stdout()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Default Configuration
///
/// - **Timeout**: none; the git transport's own timeouts apply
/// - **Output capture**: enabled
/// - **Environment**: inherited, plus `GIT_TERMINAL_PROMPT=0` so that missing
///   credentials fail fast instead of waiting for input
pub struct GitCommand {
    /// Command arguments to pass to Git (e.g., ["fetch", "origin"])
    args: Vec<String>,

    /// Working directory, passed to git as `-C <dir>`
    current_dir: Option<PathBuf>,

    /// Environment variables to set for the Git process
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for command completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Optional context string (typically the repository name) for log lines
    context: Option<String>,

    /// For clone commands, store the URL for better error messages
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: None,
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    /// Creates a new Git command builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for Git command execution.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds a single argument to the Git command.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments to the Git command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the Git command execution.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set a custom timeout for the command (None for no timeout)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a context for logging (e.g., repository name)
    ///
    /// Log messages will include the context identifier:
    /// ```text
    /// (core) Executing command: git -C /home/u/.shpm/repos/core fetch origin
    /// ```
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The git subcommand, skipping a leading `-C <dir>`.
    fn operation(full_args: &[String]) -> String {
        let start = if full_args.first().is_some_and(|a| a == "-C") && full_args.len() > 2 {
            2
        } else {
            0
        };
        full_args.get(start).cloned().unwrap_or_else(|| "unknown".to_string())
    }

    fn log_prefix(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    /// Execute the command and return the output
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::GitNotFound`] when git cannot be spawned,
    /// [`ShpmError::GitCommandError`] for a non-zero exit or timeout, and
    /// [`ShpmError::SyncError`] when a clone fails.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let mut cmd = Command::new(git_command);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            // -C keeps git independent of the process's current directory
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        cmd.args(&full_args);

        let prefix = self.log_prefix();
        tracing::debug!(
            target: "git",
            "{}Executing command: {} {}",
            prefix,
            git_command,
            full_args.join(" ")
        );

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let output_future = cmd.output();

        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result
            } else {
                tracing::warn!(
                    target: "git",
                    "{}Command timed out after {} seconds: git {}",
                    prefix,
                    duration.as_secs(),
                    full_args.join(" ")
                );
                return Err(ShpmError::GitCommandError {
                    operation: Self::operation(&full_args),
                    stderr: format!(
                        "Git command timed out after {} seconds. Try running the command manually: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    ),
                }
                .into());
            }
        } else {
            output_future.await
        };

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShpmError::GitNotFound.into());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to execute git {}", full_args.join(" ")));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "{}Command failed with exit code: {:?}",
                prefix,
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "{}Error: {}", prefix, stderr.trim());
            }

            let operation = Self::operation(&full_args);
            let error = if operation == "clone" {
                ShpmError::SyncError {
                    repository: self
                        .context
                        .clone()
                        .or_else(|| self.clone_url.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                    reason: format!(
                        "git clone {} failed: {}",
                        self.clone_url.as_deref().unwrap_or("unknown"),
                        stderr.trim()
                    ),
                }
            } else {
                ShpmError::GitCommandError {
                    operation,
                    stderr: if stderr.is_empty() {
                        stdout.trim().to_string()
                    } else {
                        stderr.trim().to_string()
                    },
                }
            };

            return Err(error.into());
        }

        if !stdout.is_empty() {
            tracing::trace!(target: "git", "{}{}", prefix, stdout.trim());
        }
        if !stderr.is_empty() {
            tracing::trace!(target: "git", "{}{}", prefix, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(
                target: "git::perf",
                "{}Git {} took {:.2}s",
                prefix,
                Self::operation(&full_args),
                elapsed.as_secs_f64()
            );
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(
                target: "git::perf",
                "{}Git {} took {}ms",
                prefix,
                Self::operation(&full_args),
                elapsed.as_millis()
            );
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute the command and return trimmed stdout.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command, discarding output.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }

    /// Execute the command and report only whether it exited successfully.
    ///
    /// Used for predicate commands such as `merge-base --is-ancestor` where a
    /// non-zero exit is an answer rather than a failure. Spawn failures are
    /// still reported as errors.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::GitNotFound`] or an I/O error if git cannot run.
    pub async fn execute_check(self) -> Result<bool> {
        match self.execute().await {
            Ok(_) => Ok(true),
            Err(e) => match e.downcast_ref::<ShpmError>() {
                Some(ShpmError::GitCommandError {
                    ..
                }) => Ok(false),
                _ => Err(e),
            },
        }
    }
}

/// Captured output of a successful git command.
pub struct GitCommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error (git writes progress here)
    pub stderr: String,
}

// Convenience builders for common Git operations

impl GitCommand {
    /// `git clone <url> <target>`
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args(["clone", "--recurse-submodules", url]);
        cmd.args.push(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// `git fetch --prune origin`
    pub fn fetch() -> Self {
        Self::new().args(["fetch", "--prune", "origin"])
    }

    /// `git rev-parse <ref>`
    pub fn rev_parse(ref_name: &str) -> Self {
        Self::new().args(["rev-parse", ref_name])
    }

    /// `git rev-parse HEAD`
    pub fn current_commit() -> Self {
        Self::rev_parse("HEAD")
    }

    /// Full name of the upstream of the current branch (e.g. `origin/main`).
    pub fn upstream() -> Self {
        Self::new().args(["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])
    }

    /// `git merge-base --is-ancestor <ancestor> <descendant>`
    pub fn is_ancestor(ancestor: &str, descendant: &str) -> Self {
        Self::new().args(["merge-base", "--is-ancestor", ancestor, descendant])
    }

    /// `git merge --ff-only <ref>`
    pub fn merge_ff_only(ref_name: &str) -> Self {
        Self::new().args(["merge", "--ff-only", ref_name])
    }

    /// `git submodule update --init --recursive`
    pub fn submodule_update() -> Self {
        Self::new().args(["submodule", "update", "--init", "--recursive"])
    }

    /// `git status --porcelain --untracked-files=no`
    pub fn status_porcelain() -> Self {
        Self::new().args(["status", "--porcelain", "--untracked-files=no"])
    }

    /// `git remote get-url origin`
    pub fn remote_url() -> Self {
        Self::new().args(["remote", "get-url", "origin"])
    }
}

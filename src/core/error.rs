//! Error handling for shpm
//!
//! This module provides the strongly-typed error taxonomy of the package
//! lifecycle engine and the user-facing rendering of those errors.
//!
//! # Architecture
//!
//! - [`ShpmError`] - Enumerated error types for every failure a target can hit
//! - [`ErrorContext`] - Wrapper that adds details and an actionable suggestion
//!
//! Internal code returns [`anyhow::Result`] and attaches context with
//! [`anyhow::Context`]. Batch processing downcasts failures back to
//! [`ShpmError`] (see [`ShpmError::from_anyhow`]) so that per-target reports keep
//! a typed error, and `main` renders the final error with [`user_friendly_error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use shpm::core::{ShpmError, user_friendly_error};
//!
//! let error = ShpmError::RepositoryNotFound { name: "core".to_string() };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for shpm operations.
///
/// Variants are grouped by the component that raises them:
///
/// - **Registry**: [`DuplicateRepository`], [`RepositoryInUse`], [`RepositoryNotFound`],
///   [`InvalidRepositoryName`]
/// - **Resolver**: [`InvalidToken`], [`PackageNotFound`], [`AmbiguousPackage`]
/// - **Lifecycle**: [`AlreadyInstalled`], [`NotInstalled`]
/// - **Sync**: [`SyncConflict`], [`SyncError`], [`GitNotFound`], [`GitCommandError`]
/// - **Hooks**: [`HookFailure`], [`HookBusy`], [`ShellNotFound`]
/// - **Persistence**: [`ConfigError`], [`StateParseError`]
///
/// [`DuplicateRepository`]: ShpmError::DuplicateRepository
/// [`RepositoryInUse`]: ShpmError::RepositoryInUse
/// [`RepositoryNotFound`]: ShpmError::RepositoryNotFound
/// [`InvalidRepositoryName`]: ShpmError::InvalidRepositoryName
/// [`InvalidToken`]: ShpmError::InvalidToken
/// [`PackageNotFound`]: ShpmError::PackageNotFound
/// [`AmbiguousPackage`]: ShpmError::AmbiguousPackage
/// [`AlreadyInstalled`]: ShpmError::AlreadyInstalled
/// [`NotInstalled`]: ShpmError::NotInstalled
/// [`SyncConflict`]: ShpmError::SyncConflict
/// [`SyncError`]: ShpmError::SyncError
/// [`GitNotFound`]: ShpmError::GitNotFound
/// [`GitCommandError`]: ShpmError::GitCommandError
/// [`HookFailure`]: ShpmError::HookFailure
/// [`HookBusy`]: ShpmError::HookBusy
/// [`ShellNotFound`]: ShpmError::ShellNotFound
/// [`ConfigError`]: ShpmError::ConfigError
/// [`StateParseError`]: ShpmError::StateParseError
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShpmError {
    /// A repository with this name is already registered.
    #[error("Repository '{name}' is already registered")]
    DuplicateRepository {
        /// Name that was being added
        name: String,
    },

    /// The repository still backs enabled packages and `--force` was not given.
    #[error("Repository '{name}' is in use by: {}", .packages.join(", "))]
    RepositoryInUse {
        /// Repository being removed
        name: String,
        /// Enabled packages (`repo/name`) that reference it
        packages: Vec<String>,
    },

    /// No repository with this name is registered.
    #[error("Repository '{name}' is not registered")]
    RepositoryNotFound {
        /// Name that was looked up
        name: String,
    },

    /// Repository names become directory names and token prefixes.
    #[error("Invalid repository name '{name}': {reason}")]
    InvalidRepositoryName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A package token does not follow `[repo/]name`.
    #[error("Invalid package '{token}': expected [repository/]name")]
    InvalidToken {
        /// Token as given on the command line
        token: String,
    },

    /// No synced repository contains the package.
    #[error("Package '{name}' not found")]
    PackageNotFound {
        /// Token or package name that was looked up
        name: String,
    },

    /// More than one repository contains a package with this name.
    #[error("Package '{name}' is ambiguous, candidates: {}", .candidates.join(", "))]
    AmbiguousPackage {
        /// Unqualified package name
        name: String,
        /// Qualified candidates (`repo/name`)
        candidates: Vec<String>,
    },

    /// The package already has an installed record.
    #[error("Package '{package}' is already installed")]
    AlreadyInstalled {
        /// Qualified package id
        package: String,
    },

    /// The package has no installed record.
    #[error("Package '{package}' is not installed")]
    NotInstalled {
        /// Token or qualified package id
        package: String,
    },

    /// The working copy cannot be fast-forwarded without discarding local state.
    #[error("Repository '{repository}' cannot be fast-forwarded: {reason}")]
    SyncConflict {
        /// Repository name
        repository: String,
        /// What diverged
        reason: String,
    },

    /// Clone or fetch failed (network, authentication, disk).
    #[error("Failed to sync repository '{repository}': {reason}")]
    SyncError {
        /// Repository name
        repository: String,
        /// Underlying failure
        reason: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git command returned a non-zero exit code.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g., "clone", "fetch", "merge")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// A lifecycle hook exited non-zero.
    #[error("Hook '{hook}' of package '{package}' failed with exit code {exit_code}")]
    HookFailure {
        /// Qualified package id
        package: String,
        /// Hook stage name
        hook: String,
        /// Exit code reported by the shell (-1 when killed by a signal)
        exit_code: i32,
    },

    /// Another hook is already running against this package.
    #[error("A hook is already running for package '{package}'")]
    HookBusy {
        /// Qualified package id
        package: String,
    },

    /// The configured shell could not be located.
    #[error("Shell '{shell}' is not installed or not found in PATH")]
    ShellNotFound {
        /// Configured shell program
        shell: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// The state file could not be parsed.
    #[error("Invalid state file {file}: {reason}")]
    StateParseError {
        /// Path of the state file
        file: String,
        /// Parser message
        reason: String,
    },

    /// Any other failure, carrying the rendered error chain.
    #[error("{message}")]
    Other {
        /// Rendered message
        message: String,
    },
}

impl ShpmError {
    /// Recover a typed error from an [`anyhow::Error`].
    ///
    /// Returns the wrapped [`ShpmError`] when one is found anywhere in the
    /// chain; otherwise renders the whole chain into [`ShpmError::Other`].
    #[must_use]
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(err) = cause.downcast_ref::<ShpmError>() {
                return err.clone();
            }
        }
        Self::Other {
            message: format!("{error:#}"),
        }
    }

    /// Short machine-friendly name of the variant, used in JSON reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateRepository { .. } => "DuplicateRepository",
            Self::RepositoryInUse { .. } => "RepositoryInUse",
            Self::RepositoryNotFound { .. } => "RepositoryNotFound",
            Self::InvalidRepositoryName { .. } => "InvalidRepositoryName",
            Self::InvalidToken { .. } => "InvalidToken",
            Self::PackageNotFound { .. } => "PackageNotFound",
            Self::AmbiguousPackage { .. } => "AmbiguousPackage",
            Self::AlreadyInstalled { .. } => "AlreadyInstalled",
            Self::NotInstalled { .. } => "NotInstalled",
            Self::SyncConflict { .. } => "SyncConflict",
            Self::SyncError { .. } => "SyncError",
            Self::GitNotFound => "GitNotFound",
            Self::GitCommandError { .. } => "GitCommandError",
            Self::HookFailure { .. } => "HookFailure",
            Self::HookBusy { .. } => "HookBusy",
            Self::ShellNotFound { .. } => "ShellNotFound",
            Self::ConfigError { .. } => "ConfigError",
            Self::StateParseError { .. } => "StateParseError",
            Self::Other { .. } => "Other",
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// Rendered by the CLI as a red error line followed by optional yellow details
/// and a green suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ShpmError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: ShpmError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`ShpmError`] anywhere in the chain, [`std::io::Error`] and
/// [`toml::de::Error`]; everything else is rendered with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(shpm_error) = cause.downcast_ref::<ShpmError>() {
            return create_error_context(shpm_error.clone());
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        if io_error.kind() == std::io::ErrorKind::PermissionDenied {
            return ErrorContext::new(ShpmError::Other {
                message: format!("{error:#}"),
            })
            .with_suggestion("Check the ownership and permissions of the shpm home directory")
            .with_details("shpm needs to read and write files below its home directory");
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(ShpmError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax in config.toml. Verify quotes, brackets, and table names");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(ShpmError::Other {
        message,
    })
}

/// Map each [`ShpmError`] variant to an [`ErrorContext`] with tailored suggestions.
fn create_error_context(error: ShpmError) -> ErrorContext {
    match &error {
        ShpmError::GitNotFound => ErrorContext::new(error.clone())
            .with_suggestion("Install git from https://git-scm.com/ or your package manager (e.g., 'brew install git', 'apt install git')")
            .with_details("shpm requires git to be installed and available in your PATH to manage repositories"),

        ShpmError::DuplicateRepository { name } => {
            let suggestion = format!(
                "Choose a different name, or remove the existing one first with 'shpm repo remove {name}'"
            );
            ErrorContext::new(error.clone()).with_suggestion(suggestion)
        }

        ShpmError::RepositoryInUse { name, .. } => {
            let suggestion = format!(
                "Remove the listed packages first, or run 'shpm repo remove --force {name}' to orphan them"
            );
            ErrorContext::new(error.clone())
                .with_suggestion(suggestion)
                .with_details("Forcing the removal keeps the package records but marks them orphaned")
        }

        ShpmError::RepositoryNotFound { .. } => ErrorContext::new(error.clone())
            .with_suggestion("List registered repositories with 'shpm repo list' or add one with 'shpm repo add <name> <url>'"),

        ShpmError::PackageNotFound { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Search available packages with 'shpm search <pattern>'. Run 'shpm repo sync' if the repository changed upstream")
            .with_details("Resolution only looks at the last synced contents of each repository"),

        ShpmError::AmbiguousPackage { candidates, .. } => {
            let details = format!("Candidates: {}", candidates.join(", "));
            ErrorContext::new(error.clone())
                .with_suggestion("Qualify the package with its repository, e.g. 'repo/name'")
                .with_details(details)
        }

        ShpmError::SyncConflict { repository, .. } => {
            let suggestion = format!(
                "Resolve the local changes in the working copy of '{repository}' (commit, stash or reset them) and retry"
            );
            ErrorContext::new(error.clone())
                .with_suggestion(suggestion)
                .with_details("shpm never discards local modifications")
        }

        ShpmError::SyncError { .. } | ShpmError::GitCommandError { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check the repository URL, your network connection and credentials. Run with --verbose to see the git output")
            .with_details("Git operations failed. This is often due to network issues or authentication problems"),

        ShpmError::HookFailure { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Inspect the hook output above. Run with --verbose to see the hook environment")
            .with_details("The package state was left unchanged for the failing stage"),

        ShpmError::ShellNotFound { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Install the shell or set 'shell' in config.toml to an available one"),

        ShpmError::StateParseError { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Fix the syntax of state.toml or restore it from a backup")
            .with_details("state.toml records installed packages and is rewritten after every change"),

        _ => ErrorContext::new(error),
    }
}

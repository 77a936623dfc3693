//! Per-target results of multi-target commands.
//!
//! A batch never aborts: every target gets a [`TargetReport`] whose outcome is
//! either a [`TargetSuccess`] or the typed [`ShpmError`] that stopped it.

use serde::Serialize;

use crate::core::ShpmError;
use crate::hooks::HookOutcome;
use crate::package::PackageId;

/// What happened to a target that succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSuccess {
    /// A record was created.
    Installed {
        /// Installed package
        package: PackageId,
        /// Recorded commit
        commit: String,
        /// Install hook result
        hook: HookOutcome,
    },
    /// The recorded commit moved.
    Updated {
        /// Updated package
        package: PackageId,
        /// Previously recorded commit
        from: String,
        /// New commit
        to: String,
        /// Update hook result
        hook: HookOutcome,
    },
    /// The repository did not move past the recorded commit.
    UpToDate {
        /// Package checked
        package: PackageId,
        /// Recorded commit
        commit: String,
    },
    /// The record was deleted.
    Removed {
        /// Removed package
        package: PackageId,
        /// Remove hook result, absent when the hook failed under `--force`
        hook: Option<HookOutcome>,
        /// Hook failure that `--force` overrode
        warning: Option<String>,
    },
    /// The record was enabled.
    Enabled {
        /// Package
        package: PackageId,
    },
    /// The record was disabled.
    Disabled {
        /// Package
        package: PackageId,
    },
    /// A repository was registered.
    RepositoryAdded {
        /// Repository name
        name: String,
        /// Remote URL
        url: String,
    },
    /// A repository was unregistered.
    RepositoryRemoved {
        /// Repository name
        name: String,
        /// Records now marked orphaned
        orphaned: Vec<PackageId>,
    },
}

impl TargetSuccess {
    /// Hook that ran for this target, if any.
    #[must_use]
    pub const fn hook(&self) -> Option<&HookOutcome> {
        match self {
            Self::Installed {
                hook,
                ..
            }
            | Self::Updated {
                hook,
                ..
            } => Some(hook),
            Self::Removed {
                hook,
                ..
            } => hook.as_ref(),
            _ => None,
        }
    }

    /// Records touched by this target.
    #[must_use]
    pub fn changed_packages(&self) -> Vec<PackageId> {
        match self {
            Self::Installed {
                package,
                ..
            }
            | Self::Updated {
                package,
                ..
            }
            | Self::Removed {
                package,
                ..
            }
            | Self::Enabled {
                package,
            }
            | Self::Disabled {
                package,
            } => vec![package.clone()],
            Self::RepositoryRemoved {
                orphaned,
                ..
            } => orphaned.clone(),
            Self::UpToDate {
                ..
            }
            | Self::RepositoryAdded {
                ..
            } => Vec::new(),
        }
    }

    /// Past-tense verb used in reports.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Installed {
                ..
            } => "installed",
            Self::Updated {
                ..
            } => "updated",
            Self::UpToDate {
                ..
            } => "up to date",
            Self::Removed {
                ..
            } => "removed",
            Self::Enabled {
                ..
            } => "enabled",
            Self::Disabled {
                ..
            } => "disabled",
            Self::RepositoryAdded {
                ..
            } => "added",
            Self::RepositoryRemoved {
                ..
            } => "removed",
        }
    }
}

/// Result of one command-line target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    /// Target exactly as given on the command line
    pub token: String,
    /// Success or the error that stopped this target
    pub outcome: Result<TargetSuccess, ShpmError>,
}

/// Ordered per-target results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    targets: Vec<TargetReport>,
}

impl BatchReport {
    /// Empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the result of the next target.
    pub fn push(&mut self, token: impl Into<String>, outcome: anyhow::Result<TargetSuccess>) {
        let token = token.into();
        let outcome = outcome.map_err(|e| ShpmError::from_anyhow(&e));
        match &outcome {
            Ok(success) => tracing::info!(target: "engine", "{}: {}", token, success.verb()),
            Err(e) => tracing::warn!(target: "engine", "{}: {}", token, e),
        }
        self.targets.push(TargetReport {
            token,
            outcome,
        });
    }

    /// Reports in command-line order.
    #[must_use]
    pub fn targets(&self) -> &[TargetReport] {
        &self.targets
    }

    /// Whether any target failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.targets.iter().any(|t| t.outcome.is_err())
    }

    /// Failed targets.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &ShpmError)> {
        self.targets.iter().filter_map(|t| t.outcome.as_ref().err().map(|e| (t.token.as_str(), e)))
    }

    /// Records touched by successful targets, in order.
    #[must_use]
    pub fn changed_packages(&self) -> Vec<PackageId> {
        self.targets
            .iter()
            .filter_map(|t| t.outcome.as_ref().ok())
            .flat_map(TargetSuccess::changed_packages)
            .collect()
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// True when no target was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Compact JSON-friendly view of a target, used by `--format json`.
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary<'a> {
    /// Target as given
    pub target: &'a str,
    /// `ok` or `error`
    pub status: &'static str,
    /// Past-tense verb on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<&'static str>,
    /// Error kind on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    /// Human-readable message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<'a> From<&'a TargetReport> for TargetSummary<'a> {
    fn from(report: &'a TargetReport) -> Self {
        match &report.outcome {
            Ok(success) => Self {
                target: &report.token,
                status: "ok",
                action: Some(success.verb()),
                error: None,
                message: None,
            },
            Err(e) => Self {
                target: &report.token,
                status: "error",
                action: None,
                error: Some(e.kind()),
                message: Some(e.to_string()),
            },
        }
    }
}

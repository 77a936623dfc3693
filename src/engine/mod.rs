//! The package lifecycle engine.
//!
//! [`Engine::execute`] runs one parsed [`Command`] against the persisted home:
//! the repository registry (`config.toml`), the state store (`state.toml`)
//! and the working copies below `repos/`.
//!
//! # Batches
//!
//! Multi-target commands (`install`, `update`, `remove`, `enable`, `disable`)
//! process their targets one at a time in command-line order. Each target
//! either succeeds or fails on its own; the failure is stored in the
//! [`BatchReport`] and the next target runs. Records of completed targets are
//! already on disk when the next one starts.
//!
//! Within one batch every repository is synced at most once.
//!
//! # Package lifecycle
//!
//! ```text
//! install:  resolve -> sync -> pkg.install -> record created
//! update:   record -> sync -> (HEAD moved?) pkg.update -> record.commit updated
//! remove:   record -> pkg.remove -> record deleted
//! ```
//!
//! A failing hook stops its target and leaves the record as it was (none for
//! install, the old commit for update, still present for remove unless
//! `--force`).
//!
//! After a command changed any record the engine emits
//! [`Event::EnvironmentChanged`] to its [`EventSink`].

mod batch;
pub mod env;
mod events;
mod status;

pub use batch::{BatchReport, TargetReport, TargetSuccess, TargetSummary};
pub use env::EnvScript;
pub use events::{Event, EventSink, MemorySink, ReloadMarkerSink};
pub use status::{ListEntry, RecordStatus};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{Config, Layout};
use crate::core::ShpmError;
use crate::git::GitRepo;
use crate::hooks::{Hook, HookExecutor, OutputMode, write_prelude};
use crate::package::Package;
use crate::registry::RepositoryRegistry;
use crate::resolver::{PackageResolver, SearchHit, list_packages, package_exists};
use crate::state::{PackageRecord, StateStore};
use crate::sync::{SyncEngine, SyncResult, SyncSession};
use crate::utils::fs::ensure_dir;

/// A parsed user request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the home layout and sync configured repositories.
    Init,
    /// List installed records.
    List,
    /// Search available packages.
    Search {
        /// Glob or substring
        pattern: String,
    },
    /// Install packages.
    Install {
        /// `[repo/]name` tokens
        tokens: Vec<String>,
    },
    /// Update packages; every installed package when empty.
    Update {
        /// `[repo/]name` tokens
        tokens: Vec<String>,
    },
    /// Remove packages.
    Remove {
        /// `[repo/]name` tokens
        tokens: Vec<String>,
        /// Delete records even when the remove hook fails
        force: bool,
    },
    /// Load packages again in new shells.
    Enable {
        /// `[repo/]name` tokens
        tokens: Vec<String>,
    },
    /// Keep packages installed but stop loading them.
    Disable {
        /// `[repo/]name` tokens
        tokens: Vec<String>,
    },
    /// Register a repository.
    RepoAdd {
        /// Unique name
        name: String,
        /// Remote URL
        url: String,
    },
    /// List registered repositories.
    RepoList,
    /// Unregister a repository.
    RepoRemove {
        /// Repository name
        name: String,
        /// Orphan enabled packages instead of refusing
        force: bool,
    },
    /// Sync repositories; every registered one when empty.
    RepoSync {
        /// Repository names
        names: Vec<String>,
    },
    /// Print the shell integration script.
    Env,
}

/// A registered repository with its working copy state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryStatus {
    /// Repository name
    pub name: String,
    /// Remote URL
    pub url: String,
    /// Working copy location
    pub local_path: PathBuf,
    /// Whether the working copy exists
    pub synced: bool,
    /// Current `HEAD`, when synced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    /// Number of packages in the working copy
    pub packages: usize,
}

/// Per-repository sync results, keyed by repository name.
pub type SyncReport = BTreeMap<String, Result<SyncResult, ShpmError>>;

/// Result of `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Home directory that was set up
    pub home: PathBuf,
    /// Sync results of the configured repositories
    pub sync: SyncReport,
}

/// Command-specific result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Per-target results
    Batch(BatchReport),
    /// Installed records
    Listing(Vec<ListEntry>),
    /// Search hits
    Search(Vec<SearchHit>),
    /// Registered repositories
    Repositories(Vec<RepositoryStatus>),
    /// Sync results
    Sync(SyncReport),
    /// Shell integration script
    Env(EnvScript),
    /// Home initialization
    Init(InitReport),
}

/// Everything [`Engine::execute`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    /// Command-specific payload
    pub report: Report,
    /// Whether records changed and an event was emitted
    pub environment_changed: bool,
}

impl CommandReport {
    const fn unchanged(report: Report) -> Self {
        Self {
            report,
            environment_changed: false,
        }
    }

    /// Whether any part of the command failed; drives the exit status.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        match &self.report {
            Report::Batch(batch) => batch.has_failures(),
            Report::Sync(sync) => sync.values().any(Result::is_err),
            Report::Init(init) => init.sync.values().any(Result::is_err),
            Report::Listing(_) | Report::Search(_) | Report::Repositories(_) | Report::Env(_) => {
                false
            }
        }
    }
}

/// Executes commands against one shpm home.
#[derive(Debug)]
pub struct Engine {
    layout: Layout,
    config: Config,
    registry: RepositoryRegistry,
    store: StateStore,
    sync: SyncEngine,
    hooks: HookExecutor,
    events: Box<dyn EventSink>,
}

impl Engine {
    /// Opens the home described by `layout`.
    ///
    /// Missing files are treated as empty so that `init` can run on a fresh
    /// home.
    ///
    /// # Errors
    ///
    /// Returns [`ShpmError::ConfigError`] or [`ShpmError::StateParseError`]
    /// when the persisted files are malformed.
    pub async fn open(layout: Layout) -> Result<Self> {
        let config = Config::load(&layout.config_file()).await?;
        let store = StateStore::load(&layout.state_file())?;
        let registry = RepositoryRegistry::from_config(&layout, &config);
        let prelude = config.prelude_path()?.unwrap_or_else(|| layout.prelude_file());

        tracing::debug!(
            target: "engine",
            "Opened {} ({} repositories, {} packages)",
            layout.home().display(),
            registry.list().len(),
            store.list().len()
        );

        Ok(Self {
            sync: SyncEngine::new(config.git_timeout()),
            hooks: HookExecutor::new(&config.shell, layout.home(), prelude),
            events: Box::new(ReloadMarkerSink::new(layout.reload_marker())),
            layout,
            config,
            registry,
            store,
        })
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Box::new(sink);
        self
    }

    /// Sets where hook output goes.
    #[must_use]
    pub fn with_output_mode(mut self, output: OutputMode) -> Self {
        self.hooks = self.hooks.with_output_mode(output);
        self
    }

    /// Home layout.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Installed records.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Registered repositories.
    #[must_use]
    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    /// Runs one command.
    ///
    /// Per-target failures are part of the returned report.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures outside any target, such as an
    /// unwritable home during `init` or an invalid search pattern.
    pub async fn execute(&mut self, command: Command) -> Result<CommandReport> {
        tracing::debug!(target: "engine", "Executing {:?}", command);

        let report = match command {
            Command::Init => return self.init().await,
            Command::List => return Ok(CommandReport::unchanged(Report::Listing(self.list()))),
            Command::Search {
                pattern,
            } => {
                let hits = PackageResolver::new(&self.registry).search(&pattern, &self.store)?;
                return Ok(CommandReport::unchanged(Report::Search(hits)));
            }
            Command::RepoList => {
                return Ok(CommandReport::unchanged(Report::Repositories(
                    self.repositories().await?,
                )));
            }
            Command::RepoSync {
                names,
            } => return Ok(CommandReport::unchanged(Report::Sync(self.repo_sync(&names).await))),
            Command::Env => return Ok(CommandReport::unchanged(Report::Env(self.env()))),
            Command::Install {
                tokens,
            } => self.install(&tokens).await,
            Command::Update {
                tokens,
            } => self.update(&tokens).await,
            Command::Remove {
                tokens,
                force,
            } => self.remove(&tokens, force).await,
            Command::Enable {
                tokens,
            } => self.set_enabled(&tokens, true),
            Command::Disable {
                tokens,
            } => self.set_enabled(&tokens, false),
            Command::RepoAdd {
                name,
                url,
            } => self.repo_add(&name, &url).await,
            Command::RepoRemove {
                name,
                force,
            } => self.repo_remove(&name, force).await,
        };

        let changed = report.changed_packages();
        let environment_changed = !changed.is_empty();
        if environment_changed {
            let event = Event::EnvironmentChanged {
                packages: changed,
            };
            if let Err(e) = self.events.emit(&event) {
                tracing::warn!(target: "engine", "Failed to signal environment change: {:#}", e);
            }
        }

        Ok(CommandReport {
            report: Report::Batch(report),
            environment_changed,
        })
    }

    async fn init(&mut self) -> Result<CommandReport> {
        let home = self.layout.home().to_path_buf();
        ensure_dir(&home)?;
        ensure_dir(&self.layout.repos_dir())?;
        write_prelude(&self.layout.prelude_file())?;

        let config_file = self.layout.config_file();
        if !config_file.exists() {
            self.config.save(&config_file)?;
        }
        if !self.store.path().exists() {
            self.store.save()?;
        }

        let sync = self.sync.sync_all(self.registry.list()).await;
        tracing::info!(target: "engine", "Initialized {}", home.display());

        Ok(CommandReport::unchanged(Report::Init(InitReport {
            home,
            sync,
        })))
    }

    fn list(&self) -> Vec<ListEntry> {
        self.store
            .list()
            .into_iter()
            .map(|record| ListEntry {
                status: RecordStatus::of(record, &self.registry),
                record: record.clone(),
            })
            .collect()
    }

    async fn repositories(&self) -> Result<Vec<RepositoryStatus>> {
        let mut statuses = Vec::new();
        for repository in self.registry.list() {
            let synced = repository.is_synced();
            let head = if synced {
                GitRepo::new(&repository.local_path).head().await.ok()
            } else {
                None
            };
            statuses.push(RepositoryStatus {
                name: repository.name.clone(),
                url: repository.url.clone(),
                local_path: repository.local_path.clone(),
                synced,
                head,
                packages: list_packages(repository)?.len(),
            });
        }
        Ok(statuses)
    }

    async fn repo_sync(&self, names: &[String]) -> SyncReport {
        if names.is_empty() {
            return self.sync.sync_all(self.registry.list()).await;
        }

        let mut results = SyncReport::new();
        for name in names {
            let result = match self.registry.resolve(name) {
                Ok(repository) => self
                    .sync
                    .sync_repository(repository)
                    .await
                    .map_err(|e| ShpmError::from_anyhow(&e)),
                Err(e) => Err(ShpmError::from_anyhow(&e)),
            };
            results.insert(name.clone(), result);
        }
        results
    }

    fn env(&self) -> EnvScript {
        let entries = self.list();
        let script = env::render(&self.layout, self.hooks.prelude(), &entries);
        for warning in &script.warnings {
            tracing::warn!(target: "engine", "{}", warning);
        }
        script
    }

    async fn install(&mut self, tokens: &[String]) -> BatchReport {
        let sync = self.sync.clone();
        let mut session = SyncSession::new(&sync);
        let mut batch = BatchReport::new();

        for token in tokens {
            let outcome = self.install_one(token, &mut session).await;
            batch.push(token.clone(), outcome);
        }
        batch
    }

    async fn install_one(&mut self, token: &str, session: &mut SyncSession<'_>) -> Result<TargetSuccess> {
        let resolved = PackageResolver::new(&self.registry).resolve(token)?;
        let id = resolved.package.id.clone();

        if self.store.get(&id.repo, &id.name).is_some() {
            return Err(ShpmError::AlreadyInstalled {
                package: id.to_string(),
            }
            .into());
        }

        let synced = session.sync(&resolved.repository).await?;
        if !package_exists(&resolved.repository, &id.name)? {
            return Err(ShpmError::PackageNotFound {
                name: token.to_string(),
            }
            .into());
        }

        let hook = self
            .hooks
            .run_hook(&resolved.package, Hook::Install, &hook_env(&synced.commit, None))
            .await?
            .into_result(&id)?;

        self.store
            .put(PackageRecord::new(&id.repo, &id.name, &synced.commit))
            .with_context(|| format!("Failed to record installation of {id}"))?;

        Ok(TargetSuccess::Installed {
            package: id,
            commit: synced.commit,
            hook,
        })
    }

    async fn update(&mut self, tokens: &[String]) -> BatchReport {
        let tokens: Vec<String> = if tokens.is_empty() {
            self.store.list().iter().map(|r| r.id().to_string()).collect()
        } else {
            tokens.to_vec()
        };

        let sync = self.sync.clone();
        let mut session = SyncSession::new(&sync);
        let mut batch = BatchReport::new();

        for token in &tokens {
            let outcome = self.update_one(token, &mut session).await;
            batch.push(token.clone(), outcome);
        }
        batch
    }

    async fn update_one(&mut self, token: &str, session: &mut SyncSession<'_>) -> Result<TargetSuccess> {
        let mut record = PackageResolver::new(&self.registry).resolve_installed(token, &self.store)?;
        let id = record.id();
        let repository = self.registry.resolve(&record.repo)?.clone();

        let synced = session.sync(&repository).await?;
        let package = Package::new(&id.repo, &id.name, &repository.local_path);
        if !package_exists(&repository, &id.name)? {
            return Err(ShpmError::PackageNotFound {
                name: id.to_string(),
            }
            .into());
        }

        if synced.commit == record.commit {
            if record.orphaned {
                // The repository was registered again under the same name
                record.orphaned = false;
                self.store.put(record)?;
            }
            return Ok(TargetSuccess::UpToDate {
                package: id,
                commit: synced.commit,
            });
        }

        let hook = self
            .hooks
            .run_hook(&package, Hook::Update, &hook_env(&synced.commit, Some(record.commit.as_str())))
            .await?
            .into_result(&id)?;

        let from = std::mem::replace(&mut record.commit, synced.commit.clone());
        record.updated_at = Some(Utc::now());
        record.orphaned = false;
        self.store.put(record).with_context(|| format!("Failed to record update of {id}"))?;

        Ok(TargetSuccess::Updated {
            package: id,
            from,
            to: synced.commit,
            hook,
        })
    }

    async fn remove(&mut self, tokens: &[String], force: bool) -> BatchReport {
        let mut batch = BatchReport::new();
        for token in tokens {
            let outcome = self.remove_one(token, force).await;
            batch.push(token.clone(), outcome);
        }
        batch
    }

    async fn remove_one(&mut self, token: &str, force: bool) -> Result<TargetSuccess> {
        let record = PackageResolver::new(&self.registry).resolve_installed(token, &self.store)?;
        let id = record.id();
        let package = Package::new(&id.repo, &id.name, &self.layout.repository_dir(&id.repo));

        let hook_result = match self
            .hooks
            .run_hook(&package, Hook::Remove, &hook_env(&record.commit, None))
            .await
        {
            Ok(outcome) => outcome.into_result(&id),
            Err(e) => Err(e),
        };

        let (hook, warning) = match hook_result {
            Ok(outcome) => (Some(outcome), None),
            Err(e) if force => {
                let warning = ShpmError::from_anyhow(&e).to_string();
                tracing::warn!(target: "engine", "Removing {} despite failure: {}", id, warning);
                (None, Some(warning))
            }
            Err(e) => return Err(e),
        };

        self.store
            .delete(&id.repo, &id.name)
            .with_context(|| format!("Failed to delete the record of {id}"))?;

        Ok(TargetSuccess::Removed {
            package: id,
            hook,
            warning,
        })
    }

    fn set_enabled(&mut self, tokens: &[String], enabled: bool) -> BatchReport {
        let mut batch = BatchReport::new();
        for token in tokens {
            let outcome = PackageResolver::new(&self.registry)
                .resolve_installed(token, &self.store)
                .and_then(|record| self.store.set_enabled(&record.repo, &record.name, enabled))
                .map(|record| {
                    let package = record.id();
                    if enabled {
                        TargetSuccess::Enabled {
                            package,
                        }
                    } else {
                        TargetSuccess::Disabled {
                            package,
                        }
                    }
                });
            batch.push(token.clone(), outcome);
        }
        batch
    }

    async fn repo_add(&mut self, name: &str, url: &str) -> BatchReport {
        let mut batch = BatchReport::new();
        let outcome = self.registry.add(name, url).await.map(|repository| {
            self.config.repositories.insert(repository.name.clone(), repository.url.clone());
            TargetSuccess::RepositoryAdded {
                name: repository.name,
                url: repository.url,
            }
        });
        batch.push(name, outcome);
        batch
    }

    async fn repo_remove(&mut self, name: &str, force: bool) -> BatchReport {
        let mut batch = BatchReport::new();
        let outcome = self.registry.remove(name, force, &mut self.store).await.map(|removal| {
            self.config.repositories.remove(name);
            TargetSuccess::RepositoryRemoved {
                name: removal.repository.name,
                orphaned: removal.orphaned.iter().map(PackageRecord::id).collect(),
            }
        });
        batch.push(name, outcome);
        batch
    }
}

/// Variables passed to hooks on top of the standard package variables.
fn hook_env(commit: &str, previous: Option<&str>) -> Vec<(String, String)> {
    let mut env = vec![("PKG_COMMIT".to_string(), commit.to_string())];
    if let Some(previous) = previous {
        env.push(("PKG_PREVIOUS_COMMIT".to_string(), previous.to_string()));
    }
    env
}

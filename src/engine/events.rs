//! Notifications emitted after the shell environment changed.
//!
//! The engine does not know how the user's shell integration works. After a
//! command created, updated, deleted, enabled or disabled a record it emits an
//! [`Event`] to its [`EventSink`]; the default [`ReloadMarkerSink`] touches
//! `<home>/reload`, which the `shpm` wrapper function printed by `shpm env`
//! checks after every invocation.

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::package::PackageId;
use crate::utils::fs::atomic_write;

/// Something the shell integration may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Records changed; the environment should be re-sourced.
    EnvironmentChanged {
        /// Packages whose records changed, in processing order
        packages: Vec<PackageId>,
    },
}

/// Receiver of engine events.
pub trait EventSink: fmt::Debug + Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns an error when the event cannot be delivered. The engine logs it
    /// and carries on.
    fn emit(&self, event: &Event) -> Result<()>;
}

/// Touches a marker file listing the changed packages.
#[derive(Debug, Clone)]
pub struct ReloadMarkerSink {
    marker: PathBuf,
}

impl ReloadMarkerSink {
    /// Sink writing to `marker`.
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl EventSink for ReloadMarkerSink {
    fn emit(&self, event: &Event) -> Result<()> {
        let Event::EnvironmentChanged {
            packages,
        } = event;

        let mut content = String::new();
        for package in packages {
            content.push_str(&package.to_string());
            content.push('\n');
        }

        atomic_write(&self.marker, content.as_bytes())
            .with_context(|| format!("Failed to write reload marker {}", self.marker.display()))?;
        tracing::debug!(target: "engine", "Reload marker written for {} packages", packages.len());
        Ok(())
    }
}

/// Keeps events in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("event buffer poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

//! Shared helpers for the integration suite.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use shpm::config::Layout;
use shpm::engine::{
    BatchReport, Command as EngineCommand, CommandReport, Engine, MemorySink, Report, TargetReport,
};
use shpm::hooks::OutputMode;
use shpm::test_utils::{PackageRepoFixture, init_test_logging};

/// A throwaway shpm home next to a directory of upstream repositories.
pub struct TestHome {
    _temp: TempDir,
    root: PathBuf,
    layout: Layout,
}

impl TestHome {
    pub fn new() -> Result<Self> {
        init_test_logging(None);
        let temp = TempDir::new()?;
        let root = temp.path().to_path_buf();
        fs::create_dir_all(root.join("upstream"))?;
        let layout = Layout::new(root.join("home"));
        Ok(Self {
            _temp: temp,
            root,
            layout,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn home(&self) -> &Path {
        self.layout.home()
    }

    /// Creates an upstream repository named `name`.
    pub fn upstream(&self, name: &str) -> Result<PackageRepoFixture> {
        PackageRepoFixture::new(&self.root.join("upstream"), name)
    }

    /// File the logging hook scripts append to.
    pub fn hook_log(&self) -> PathBuf {
        self.root.join("hooks.log")
    }

    /// Lines written by logging hooks so far.
    pub fn hook_calls(&self) -> Vec<String> {
        fs::read_to_string(self.hook_log())
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Opens an engine with captured hook output and an in-memory event sink.
    pub async fn engine(&self) -> Result<(Engine, MemorySink)> {
        let sink = MemorySink::new();
        let engine = Engine::open(self.layout.clone())
            .await?
            .with_output_mode(OutputMode::Capture)
            .with_event_sink(sink.clone());
        Ok((engine, sink))
    }

    /// Runs one command in a freshly opened engine.
    pub async fn run(&self, command: EngineCommand) -> Result<CommandReport> {
        let (mut engine, _) = self.engine().await?;
        engine.execute(command).await
    }

    /// Registers `fixture` under `name`.
    pub async fn add_repo(&self, name: &str, fixture: &PackageRepoFixture) -> Result<()> {
        let report = self
            .run(EngineCommand::RepoAdd {
                name: name.to_string(),
                url: fixture.url(),
            })
            .await?;
        assert!(!report.has_failures(), "repo add failed: {report:?}");
        Ok(())
    }

    /// The `shpm` binary pointed at this home.
    pub fn shpm(&self) -> Command {
        let mut cmd = Command::cargo_bin("shpm").expect("shpm binary");
        cmd.arg("--home").arg(self.home()).env("NO_COLOR", "1").env_remove("RUST_LOG");
        cmd
    }
}

/// Shorthand for a list of command-line tokens.
pub fn tokens(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// The batch of a multi-target command.
pub fn batch(report: &CommandReport) -> &BatchReport {
    match &report.report {
        Report::Batch(batch) => batch,
        other => panic!("expected a batch report, got {other:?}"),
    }
}

/// The only target of a batch.
pub fn single(report: &CommandReport) -> &TargetReport {
    let batch = batch(report);
    assert_eq!(batch.len(), 1, "expected one target: {batch:?}");
    &batch.targets()[0]
}

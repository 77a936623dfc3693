//! Registering, syncing and removing repositories.

use anyhow::Result;
use std::fs;

use shpm::config::Config;
use shpm::core::ShpmError;
use shpm::engine::{Command, RecordStatus, Report, TargetSuccess};
use shpm::package::PackageId;

use crate::common::{TestHome, single, tokens};

fn sync_all() -> Command {
    Command::RepoSync {
        names: vec![],
    }
}

#[tokio::test]
async fn test_add_persists_and_rejects_duplicates() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.commit("init")?;

    home.add_repo("core", &upstream).await?;
    let config = Config::load(&home.layout().config_file()).await?;
    assert_eq!(config.repositories.get("core"), Some(&upstream.url()));
    // Registering never clones
    assert!(!home.layout().repository_dir("core").exists());

    let report = home
        .run(Command::RepoAdd {
            name: "core".to_string(),
            url: "file:///elsewhere".to_string(),
        })
        .await?;
    assert!(matches!(single(&report).outcome, Err(ShpmError::DuplicateRepository { .. })));

    let report = home
        .run(Command::RepoAdd {
            name: "bad/name".to_string(),
            url: upstream.url(),
        })
        .await?;
    assert!(matches!(single(&report).outcome, Err(ShpmError::InvalidRepositoryName { .. })));
    Ok(())
}

#[tokio::test]
async fn test_sync_is_idempotent() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    let head = upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;

    let first = match home.run(sync_all()).await?.report {
        Report::Sync(sync) => sync,
        other => panic!("unexpected report: {other:?}"),
    };
    let first = first["core"].as_ref().expect("first sync");
    assert!(first.changed);
    assert_eq!(first.commit, head);

    let second = match home.run(sync_all()).await?.report {
        Report::Sync(sync) => sync,
        other => panic!("unexpected report: {other:?}"),
    };
    let second = second["core"].as_ref().expect("second sync");
    assert!(!second.changed);
    assert_eq!(second.commit, head);
    Ok(())
}

#[tokio::test]
async fn test_sync_fast_forwards_and_reports_per_repository() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(sync_all()).await?;

    upstream.add_package("git", None)?;
    let head = upstream.commit("add git")?;

    let report = home
        .run(Command::RepoSync {
            names: tokens(&["core", "ghost"]),
        })
        .await?;
    assert!(report.has_failures());
    let Report::Sync(sync) = &report.report else {
        panic!("unexpected report: {:?}", report.report);
    };
    let core = sync["core"].as_ref().expect("core sync");
    assert!(core.changed);
    assert_eq!(core.commit, head);
    assert!(matches!(sync["ghost"], Err(ShpmError::RepositoryNotFound { .. })));
    assert!(home.layout().repository_dir("core").join("git").is_dir());
    Ok(())
}

#[tokio::test]
async fn test_dirty_working_copy_is_a_conflict() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(sync_all()).await?;

    fs::write(home.layout().repository_dir("core").join("vim/README.md"), "local edit\n")?;
    upstream.add_package("git", None)?;
    upstream.commit("add git")?;

    let report = home.run(sync_all()).await?;
    let Report::Sync(sync) = &report.report else {
        panic!("unexpected report: {:?}", report.report);
    };
    assert!(matches!(sync["core"], Err(ShpmError::SyncConflict { .. })));
    // The local edit survives
    let content = fs::read_to_string(home.layout().repository_dir("core").join("vim/README.md"))?;
    assert_eq!(content, "local edit\n");
    Ok(())
}

#[tokio::test]
async fn test_remove_in_use_repository() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim"]),
    })
    .await?;

    let report = home
        .run(Command::RepoRemove {
            name: "core".to_string(),
            force: false,
        })
        .await?;
    match &single(&report).outcome {
        Err(ShpmError::RepositoryInUse {
            name,
            packages,
        }) => {
            assert_eq!(name, "core");
            assert_eq!(packages, &vec!["core/vim".to_string()]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(home.layout().repository_dir("core").exists());

    let (mut engine, sink) = home.engine().await?;
    let report = engine
        .execute(Command::RepoRemove {
            name: "core".to_string(),
            force: true,
        })
        .await?;
    match &single(&report).outcome {
        Ok(TargetSuccess::RepositoryRemoved {
            orphaned,
            ..
        }) => assert_eq!(orphaned, &vec![PackageId::new("core", "vim")]),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(sink.events().len(), 1);
    assert!(!home.layout().repository_dir("core").exists());
    assert!(engine.registry().get("core").is_none());

    let record = engine.store().get("core", "vim").expect("record kept");
    assert!(record.orphaned);

    let report = engine.execute(Command::List).await?;
    let Report::Listing(entries) = &report.report else {
        panic!("unexpected report: {:?}", report.report);
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, RecordStatus::Orphaned);
    Ok(())
}

#[tokio::test]
async fn test_remove_unused_repository() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(sync_all()).await?;

    let report = home
        .run(Command::RepoRemove {
            name: "core".to_string(),
            force: false,
        })
        .await?;
    assert!(matches!(single(&report).outcome, Ok(TargetSuccess::RepositoryRemoved { .. })));
    assert!(!report.environment_changed);

    let config = Config::load(&home.layout().config_file()).await?;
    assert!(config.repositories.is_empty());

    let report = home
        .run(Command::RepoRemove {
            name: "core".to_string(),
            force: false,
        })
        .await?;
    assert!(matches!(single(&report).outcome, Err(ShpmError::RepositoryNotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_repository_listing() -> Result<()> {
    let home = TestHome::new()?;
    let core = home.upstream("core")?;
    core.add_package("vim", None)?.add_package("git", None)?;
    let head = core.commit("init")?;
    let extra = home.upstream("extra")?;
    extra.commit("init")?;
    home.add_repo("core", &core).await?;
    home.add_repo("extra", &extra).await?;
    home.run(Command::RepoSync {
        names: tokens(&["core"]),
    })
    .await?;

    let report = home.run(Command::RepoList).await?;
    let Report::Repositories(repositories) = &report.report else {
        panic!("unexpected report: {:?}", report.report);
    };
    assert_eq!(repositories.len(), 2);
    assert_eq!(repositories[0].name, "core");
    assert!(repositories[0].synced);
    assert_eq!(repositories[0].head.as_deref(), Some(head.as_str()));
    assert_eq!(repositories[0].packages, 2);
    assert_eq!(repositories[1].name, "extra");
    assert!(!repositories[1].synced);
    assert_eq!(repositories[1].packages, 0);
    Ok(())
}

#[tokio::test]
async fn test_search_marks_installed_packages() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?.add_package("neovim", None)?.add_package("git", None)?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim"]),
    })
    .await?;

    let report = home
        .run(Command::Search {
            pattern: "VIM".to_string(),
        })
        .await?;
    let Report::Search(hits) = &report.report else {
        panic!("unexpected report: {:?}", report.report);
    };
    let found: Vec<(&str, bool)> = hits.iter().map(|h| (h.name.as_str(), h.installed)).collect();
    assert_eq!(found, vec![("neovim", false), ("vim", true)]);

    let report = home
        .run(Command::Search {
            pattern: "g*".to_string(),
        })
        .await?;
    let Report::Search(hits) = &report.report else {
        panic!("unexpected report: {:?}", report.report);
    };
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "git");
    Ok(())
}

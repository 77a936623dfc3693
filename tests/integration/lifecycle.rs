//! Install, update, remove, enable and disable through the engine.

use anyhow::Result;

use shpm::core::ShpmError;
use shpm::engine::{Command, Event, TargetSuccess};
use shpm::package::PackageId;
use shpm::test_utils::{failing_script, logging_script};

use crate::common::{TestHome, batch, single, tokens};

#[tokio::test]
async fn test_install_on_fresh_home_clones_and_records_head() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(&logging_script(&home.hook_log())))?;
    let head = upstream.commit("add vim")?;
    home.add_repo("core", &upstream).await?;

    let (mut engine, sink) = home.engine().await?;
    let report = engine
        .execute(Command::Install {
            tokens: tokens(&["core/vim"]),
        })
        .await?;

    match &single(&report).outcome {
        Ok(TargetSuccess::Installed {
            package,
            commit,
            hook,
        }) => {
            assert_eq!(package, &PackageId::new("core", "vim"));
            assert_eq!(commit, &head);
            assert!(!hook.skipped);
            assert_eq!(hook.exit_code, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert!(home.layout().repository_dir("core").join("vim/pkg.sh").is_file());
    assert_eq!(home.hook_calls(), vec!["install vim"]);

    let record = engine.store().get("core", "vim").expect("record");
    assert_eq!(record.commit, head);
    assert!(record.enabled);
    assert!(record.updated_at.is_none());

    assert!(report.environment_changed);
    assert_eq!(
        sink.events(),
        vec![Event::EnvironmentChanged {
            packages: vec![PackageId::new("core", "vim")],
        }]
    );
    Ok(())
}

#[tokio::test]
async fn test_failing_target_does_not_stop_the_batch() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("a", Some(&failing_script("install", 3)))?;
    upstream.add_package("b", Some(&logging_script(&home.hook_log())))?;
    upstream.commit("add a and b")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::RepoSync {
        names: vec![],
    })
    .await?;

    let report = home
        .run(Command::Install {
            tokens: tokens(&["a", "b"]),
        })
        .await?;

    let batch = batch(&report);
    assert!(report.has_failures());
    assert_eq!(batch.len(), 2);
    match &batch.targets()[0].outcome {
        Err(ShpmError::HookFailure {
            package,
            exit_code,
            ..
        }) => {
            assert_eq!(package, "core/a");
            assert_eq!(*exit_code, 3);
        }
        other => panic!("unexpected outcome for a: {other:?}"),
    }
    assert!(matches!(batch.targets()[1].outcome, Ok(TargetSuccess::Installed { .. })));

    let (engine, _) = home.engine().await?;
    assert!(engine.store().get("core", "a").is_none());
    assert!(engine.store().get("core", "b").is_some());
    assert_eq!(home.hook_calls(), vec!["install b"]);
    Ok(())
}

#[tokio::test]
async fn test_install_rejections() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    upstream.commit("add vim")?;
    home.add_repo("core", &upstream).await?;

    let report = home
        .run(Command::Install {
            tokens: tokens(&["core/nope", "core/vim", "core/vim", "ghost/vim", "bad token"]),
        })
        .await?;
    let targets = batch(&report).targets();

    assert!(matches!(targets[0].outcome, Err(ShpmError::PackageNotFound { .. })));
    match &targets[1].outcome {
        Ok(TargetSuccess::Installed {
            hook,
            ..
        }) => {
            // No pkg.sh: the install stage is skipped and counts as success
            assert!(hook.skipped);
            assert_eq!(hook.exit_code, 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(targets[2].outcome, Err(ShpmError::AlreadyInstalled { .. })));
    assert!(matches!(targets[3].outcome, Err(ShpmError::RepositoryNotFound { .. })));
    assert!(matches!(targets[4].outcome, Err(ShpmError::InvalidToken { .. })));
    Ok(())
}

#[tokio::test]
async fn test_install_only_accepts_package_directories() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    upstream.commit("add vim")?;
    // Not synced yet: the first install clones the repository
    home.add_repo("core", &upstream).await?;

    let report = home
        .run(Command::Install {
            tokens: tokens(&["core/.git", "core/..", "core/README.md"]),
        })
        .await?;
    let targets = batch(&report).targets();

    assert!(matches!(targets[0].outcome, Err(ShpmError::InvalidToken { .. })));
    assert!(matches!(targets[1].outcome, Err(ShpmError::InvalidToken { .. })));
    match &targets[2].outcome {
        Err(ShpmError::PackageNotFound {
            name,
        }) => assert_eq!(name, "core/README.md"),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let (engine, _) = home.engine().await?;
    assert!(engine.store().list().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_script_exiting_while_loading_fails_install() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some("pkg.install() { echo installed; }\nexit 1\n"))?;
    upstream.commit("add vim")?;
    home.add_repo("core", &upstream).await?;

    let report = home
        .run(Command::Install {
            tokens: tokens(&["core/vim"]),
        })
        .await?;
    match &single(&report).outcome {
        Err(ShpmError::HookFailure {
            package,
            hook,
            exit_code,
        }) => {
            assert_eq!(package, "core/vim");
            assert_eq!(hook, "pkg.sh");
            assert_eq!(*exit_code, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!report.environment_changed);

    let (engine, _) = home.engine().await?;
    assert!(engine.store().get("core", "vim").is_none());
    Ok(())
}

#[tokio::test]
async fn test_unqualified_name_resolution() -> Result<()> {
    let home = TestHome::new()?;
    let core = home.upstream("core")?;
    core.add_package("vim", None)?.add_package("git", None)?;
    core.commit("init")?;
    let extra = home.upstream("extra")?;
    extra.add_package("vim", None)?;
    extra.commit("init")?;
    home.add_repo("core", &core).await?;
    home.add_repo("extra", &extra).await?;
    home.run(Command::RepoSync {
        names: vec![],
    })
    .await?;

    let report = home
        .run(Command::Install {
            tokens: tokens(&["vim", "git", "tmux"]),
        })
        .await?;
    let targets = batch(&report).targets();

    match &targets[0].outcome {
        Err(ShpmError::AmbiguousPackage {
            name,
            candidates,
        }) => {
            assert_eq!(name, "vim");
            assert_eq!(candidates, &vec!["core/vim".to_string(), "extra/vim".to_string()]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    match &targets[1].outcome {
        Ok(TargetSuccess::Installed {
            package,
            ..
        }) => assert_eq!(package, &PackageId::new("core", "git")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(matches!(targets[2].outcome, Err(ShpmError::PackageNotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_update_runs_hook_only_when_head_moved() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    let script = logging_script(&home.hook_log());
    upstream.add_package("vim", Some(&script))?.add_package("git", Some(&script))?;
    let first = upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim", "core/git"]),
    })
    .await?;

    let (mut engine, sink) = home.engine().await?;
    let report = engine
        .execute(Command::Update {
            tokens: vec![],
        })
        .await?;
    for target in batch(&report).targets() {
        match &target.outcome {
            Ok(TargetSuccess::UpToDate {
                commit,
                ..
            }) => assert_eq!(commit, &first),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert!(!report.environment_changed);
    assert!(sink.events().is_empty());

    upstream.write_file("vim/vimrc", "set number\n")?;
    let second = upstream.commit("vimrc")?;

    let report = home
        .run(Command::Update {
            tokens: tokens(&["vim", "core/git"]),
        })
        .await?;
    let targets = batch(&report).targets();
    assert_eq!(targets.len(), 2);
    for target in targets {
        match &target.outcome {
            Ok(TargetSuccess::Updated {
                from,
                to,
                hook,
                ..
            }) => {
                assert_eq!(from, &first);
                assert_eq!(to, &second);
                assert!(!hook.skipped);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    let (engine, _) = home.engine().await?;
    let record = engine.store().get("core", "vim").expect("record");
    assert_eq!(record.commit, second);
    assert!(record.updated_at.is_some());
    assert_eq!(
        home.hook_calls(),
        vec!["install vim", "install git", "update vim", "update git"]
    );
    Ok(())
}

#[tokio::test]
async fn test_files_written_by_hooks_do_not_block_updates() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some("pkg.install() { touch built.cache; }\npkg.update() { touch built.cache; }\n"))?;
    upstream.commit("add vim")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim"]),
    })
    .await?;
    let built = home.layout().repository_dir("core").join("vim/built.cache");
    assert!(built.is_file());

    upstream.write_file("vim/vimrc", "set number\n")?;
    let second = upstream.commit("vimrc")?;

    let report = home
        .run(Command::Update {
            tokens: tokens(&["core/vim"]),
        })
        .await?;
    match &single(&report).outcome {
        Ok(TargetSuccess::Updated {
            to,
            ..
        }) => assert_eq!(to, &second),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(built.is_file());
    assert!(home.layout().repository_dir("core").join("vim/vimrc").is_file());
    Ok(())
}

#[tokio::test]
async fn test_update_after_forced_repository_removal() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(&logging_script(&home.hook_log())))?;
    let head = upstream.commit("add vim")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim"]),
    })
    .await?;
    home.run(Command::RepoRemove {
        name: "core".to_string(),
        force: true,
    })
    .await?;

    upstream.write_file("vim/vimrc", "set number\n")?;
    upstream.commit("vimrc")?;

    for requested in [tokens(&["core/vim"]), vec![]] {
        let report = home
            .run(Command::Update {
                tokens: requested,
            })
            .await?;
        assert!(report.has_failures());
        match &single(&report).outcome {
            Err(ShpmError::RepositoryNotFound {
                ..
            }) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    let (engine, _) = home.engine().await?;
    let record = engine.store().get("core", "vim").expect("record");
    assert!(record.orphaned);
    assert_eq!(record.commit, head);
    assert_eq!(home.hook_calls(), vec!["install vim"]);
    Ok(())
}

#[tokio::test]
async fn test_update_failure_keeps_old_commit() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(&failing_script("update", 4)))?;
    let first = upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim"]),
    })
    .await?;

    upstream.write_file("vim/vimrc", "set number\n")?;
    upstream.commit("vimrc")?;

    let report = home
        .run(Command::Update {
            tokens: tokens(&["core/vim"]),
        })
        .await?;
    assert!(matches!(
        single(&report).outcome,
        Err(ShpmError::HookFailure {
            exit_code: 4,
            ..
        })
    ));

    let (engine, _) = home.engine().await?;
    assert_eq!(engine.store().get("core", "vim").expect("record").commit, first);
    Ok(())
}

#[tokio::test]
async fn test_update_of_unknown_package() -> Result<()> {
    let home = TestHome::new()?;
    let report = home
        .run(Command::Update {
            tokens: tokens(&["core/vim"]),
        })
        .await?;
    assert!(matches!(single(&report).outcome, Err(ShpmError::NotInstalled { .. })));
    Ok(())
}

#[tokio::test]
async fn test_remove_hook_failure_keeps_record_unless_forced() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(&failing_script("remove", 2)))?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim"]),
    })
    .await?;

    let report = home
        .run(Command::Remove {
            tokens: tokens(&["core/vim"]),
            force: false,
        })
        .await?;
    assert!(matches!(
        single(&report).outcome,
        Err(ShpmError::HookFailure {
            exit_code: 2,
            ..
        })
    ));
    assert!(!report.environment_changed);
    let (engine, _) = home.engine().await?;
    assert!(engine.store().get("core", "vim").is_some());

    let report = home
        .run(Command::Remove {
            tokens: tokens(&["core/vim"]),
            force: true,
        })
        .await?;
    match &single(&report).outcome {
        Ok(TargetSuccess::Removed {
            hook,
            warning,
            ..
        }) => {
            assert!(hook.is_none());
            assert!(warning.as_deref().is_some_and(|w| w.contains("remove")));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    let (engine, _) = home.engine().await?;
    assert!(engine.store().get("core", "vim").is_none());
    Ok(())
}

#[tokio::test]
async fn test_remove_runs_hook_and_deletes_record() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(&logging_script(&home.hook_log())))?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim"]),
    })
    .await?;

    let (mut engine, sink) = home.engine().await?;
    let report = engine
        .execute(Command::Remove {
            tokens: tokens(&["vim", "vim"]),
            force: false,
        })
        .await?;
    let targets = batch(&report).targets();
    assert!(matches!(targets[0].outcome, Ok(TargetSuccess::Removed { .. })));
    assert!(matches!(targets[1].outcome, Err(ShpmError::NotInstalled { .. })));

    assert_eq!(home.hook_calls(), vec!["install vim", "remove vim"]);
    assert!(engine.store().list().is_empty());
    assert_eq!(sink.events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_enable_and_disable() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(&logging_script(&home.hook_log())))?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim"]),
    })
    .await?;

    let report = home
        .run(Command::Disable {
            tokens: tokens(&["vim", "tmux"]),
        })
        .await?;
    let targets = batch(&report).targets();
    assert!(matches!(targets[0].outcome, Ok(TargetSuccess::Disabled { .. })));
    assert!(matches!(targets[1].outcome, Err(ShpmError::NotInstalled { .. })));
    assert!(report.environment_changed);

    let (engine, _) = home.engine().await?;
    assert!(!engine.store().get("core", "vim").expect("record").enabled);
    assert!(engine.store().list_enabled().is_empty());

    home.run(Command::Enable {
        tokens: tokens(&["core/vim"]),
    })
    .await?;
    let (engine, _) = home.engine().await?;
    assert!(engine.store().get("core", "vim").expect("record").enabled);

    // Toggling never runs hooks
    assert_eq!(home.hook_calls(), vec!["install vim"]);
    Ok(())
}

//! The generated shell integration script.

use anyhow::Result;
use std::process::Command as Process;

use shpm::engine::{Command, EnvScript, Report};
use shpm::package::PackageId;

use crate::common::{TestHome, tokens};

const LOAD_SCRIPT: &str = r#"pkg.load() {
    export SHPM_LOADED="${SHPM_LOADED:+$SHPM_LOADED,}$PKG_REPO/$PKG_NAME"
}
"#;

async fn env_script(home: &TestHome) -> Result<EnvScript> {
    match home.run(Command::Env).await?.report {
        Report::Env(env) => Ok(env),
        other => panic!("unexpected report: {other:?}"),
    }
}

/// Evaluates `script` in a clean bash and prints `$SHPM_LOADED`.
fn eval_loaded(script: &str) -> Result<String> {
    let output = Process::new("bash")
        .args(["--noprofile", "--norc", "-c"])
        .arg(format!("{script}\nprintf '%s' \"$SHPM_LOADED\""))
        .env_remove("SHPM_LOADED")
        .output()?;
    assert!(output.status.success(), "eval failed: {}", String::from_utf8_lossy(&output.stderr));
    Ok(String::from_utf8(output.stdout)?)
}

#[tokio::test]
async fn test_env_loads_enabled_packages_in_order() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream
        .add_package("aliases", Some(LOAD_SCRIPT))?
        .add_package("vim", Some(LOAD_SCRIPT))?
        .add_package("plain", None)?;
    upstream.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim", "core/aliases", "core/plain"]),
    })
    .await?;

    let env = env_script(&home).await?;
    assert_eq!(
        env.loaded,
        vec![
            PackageId::new("core", "aliases"),
            PackageId::new("core", "plain"),
            PackageId::new("core", "vim"),
        ]
    );
    assert!(env.warnings.is_empty());
    assert_eq!(eval_loaded(&env.script)?, "core/aliases,core/vim");
    Ok(())
}

#[tokio::test]
async fn test_env_skips_disabled_and_orphaned_packages() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(LOAD_SCRIPT))?.add_package("git", Some(LOAD_SCRIPT))?;
    upstream.commit("init")?;
    let extra = home.upstream("extra")?;
    extra.add_package("tmux", Some(LOAD_SCRIPT))?;
    extra.commit("init")?;
    home.add_repo("core", &upstream).await?;
    home.add_repo("extra", &extra).await?;
    home.run(Command::Install {
        tokens: tokens(&["core/vim", "core/git", "extra/tmux"]),
    })
    .await?;

    home.run(Command::Disable {
        tokens: tokens(&["core/git"]),
    })
    .await?;
    home.run(Command::RepoRemove {
        name: "extra".to_string(),
        force: true,
    })
    .await?;

    let env = env_script(&home).await?;
    assert_eq!(env.loaded, vec![PackageId::new("core", "vim")]);
    assert_eq!(env.warnings, vec!["skipping extra/tmux: orphaned".to_string()]);
    assert_eq!(eval_loaded(&env.script)?, "core/vim");
    Ok(())
}

#[tokio::test]
async fn test_env_defines_reloading_wrapper() -> Result<()> {
    let home = TestHome::new()?;
    home.run(Command::Init).await?;

    let env = env_script(&home).await?;
    assert!(env.loaded.is_empty());
    assert!(env.script.contains("shpm() {"));

    // The prelude written by init is sourced, so its helpers exist
    let output = Process::new("bash")
        .args(["--noprofile", "--norc", "-c"])
        .arg(format!("{}\ndeclare -F shpm.link shpm.has", env.script))
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    Ok(())
}

//! The `shpm` binary.

use anyhow::Result;
use predicates::prelude::*;

use shpm::test_utils::{failing_script, logging_script};

use crate::common::TestHome;

#[test]
fn test_help_lists_commands() {
    let home = TestHome::new().unwrap();
    home.shpm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("repo"))
        .stdout(predicate::str::contains("env"));
}

#[test]
fn test_init_creates_layout() -> Result<()> {
    let home = TestHome::new()?;
    home.shpm()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"))
        .stdout(predicate::str::contains("eval \"$(shpm env)\""));

    let layout = home.layout();
    assert!(layout.config_file().is_file());
    assert!(layout.state_file().is_file());
    assert!(layout.prelude_file().is_file());
    assert!(layout.repos_dir().is_dir());

    // Running it again keeps working
    home.shpm().arg("init").assert().success();
    Ok(())
}

#[test]
fn test_install_list_remove_flow() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(&logging_script(&home.hook_log())))?;
    upstream.commit("init")?;
    let url = upstream.url();

    home.shpm()
        .args(["repo", "add", "core", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added repository core"));

    home.shpm()
        .args(["install", "core/vim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed core/vim"));
    assert!(home.layout().reload_marker().is_file());
    assert_eq!(home.hook_calls(), vec!["install vim"]);

    let output = home.shpm().args(["list", "--format", "json"]).output()?;
    assert!(output.status.success());
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(entries[0]["repo"], "core");
    assert_eq!(entries[0]["name"], "vim");
    assert_eq!(entries[0]["status"], "ok");
    assert_eq!(entries[0]["enabled"], true);

    home.shpm()
        .args(["disable", "vim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disabled core/vim"));
    home.shpm().arg("list").assert().success().stdout(predicate::str::contains("disabled"));

    home.shpm()
        .args(["remove", "vim"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed core/vim"));
    home.shpm()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages installed"));
    Ok(())
}

#[test]
fn test_partial_failure_exits_with_one() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    upstream.commit("init")?;
    home.shpm().args(["repo", "add", "core", &upstream.url()]).assert().success();

    home.shpm()
        .args(["install", "core/nope", "core/vim"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Installed core/vim"))
        .stderr(predicate::str::contains("core/nope"))
        .stderr(predicate::str::contains("1 of 2 targets failed"));

    let output = home.shpm().args(["install", "core/vim", "--format", "json"]).output()?;
    assert_eq!(output.status.code(), Some(1));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summary[0]["status"], "error");
    assert_eq!(summary[0]["error"], "AlreadyInstalled");
    Ok(())
}

#[test]
fn test_json_output_is_not_mixed_with_hook_output() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some("pkg.install() { echo \"building vim\"; echo \"warning: slow\" >&2; }\n"))?;
    upstream.commit("init")?;
    home.shpm().args(["repo", "add", "core", &upstream.url()]).assert().success();

    let output = home.shpm().args(["install", "core/vim", "--format", "json"]).output()?;
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summary[0]["target"], "core/vim");
    assert_eq!(summary[0]["status"], "ok");

    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("building vim"));
    assert!(stderr.contains("warning: slow"));
    Ok(())
}

#[test]
fn test_remove_with_failing_hook_needs_force() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", Some(&failing_script("remove", 5)))?;
    upstream.commit("init")?;
    home.shpm().args(["repo", "add", "core", &upstream.url()]).assert().success();
    home.shpm().args(["install", "core/vim"]).assert().success();

    home.shpm()
        .args(["remove", "core/vim"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("exit code 5"));

    home.shpm()
        .args(["remove", "--force", "core/vim"])
        .assert()
        .success()
        .stderr(predicate::str::contains("warning"));
    Ok(())
}

#[test]
fn test_repo_remove_in_use_fails() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    upstream.commit("init")?;
    home.shpm().args(["repo", "add", "core", &upstream.url()]).assert().success();
    home.shpm().args(["install", "core/vim"]).assert().success();

    home.shpm()
        .args(["repo", "remove", "core"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("in use"));

    home.shpm()
        .args(["repo", "remove", "core", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("orphaned: core/vim"));

    home.shpm()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("orphaned"));
    Ok(())
}

#[test]
fn test_repo_sync_and_list() -> Result<()> {
    let home = TestHome::new()?;
    let upstream = home.upstream("core")?;
    upstream.add_package("vim", None)?;
    let head = upstream.commit("init")?;
    home.shpm().args(["repo", "add", "core", &upstream.url()]).assert().success();

    home.shpm()
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not synced"));

    home.shpm()
        .args(["repo", "sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("core updated to {}", &head[..8])));

    home.shpm()
        .args(["repo", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 packages"));

    home.shpm()
        .args(["search", "vi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core/vim"));
    Ok(())
}

#[test]
fn test_env_prints_script() {
    let home = TestHome::new().unwrap();
    home.shpm()
        .arg("env")
        .assert()
        .success()
        .stdout(predicate::str::contains("export SHPM_HOME="))
        .stdout(predicate::str::contains("shpm() {"));
}

#[test]
fn test_malformed_state_is_reported() -> Result<()> {
    let home = TestHome::new()?;
    std::fs::create_dir_all(home.home())?;
    std::fs::write(home.layout().state_file(), "this is not toml [[[")?;

    home.shpm()
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("state"));
    Ok(())
}

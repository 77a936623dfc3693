//! Shell integration script printed by `shpm env`.
//!
//! Users add `eval "$(shpm env)"` to their shell startup file. The script:
//!
//! 1. exports `SHPM_HOME` and `SHPM_PRELUDE` and sources the prelude
//! 2. for every enabled, loadable record in store order, sources the
//!    package's `pkg.sh` in the current shell and calls `pkg.load` if defined
//! 3. defines a `shpm` wrapper that re-evaluates `shpm env` whenever a
//!    command left the reload marker behind
//!
//! Records that cannot be loaded are skipped with a comment in the script and
//! a warning returned to the caller.

use std::fmt::Write as _;
use std::path::Path;

use crate::config::Layout;
use crate::constants::RELOAD_MARKER_NAME;
use crate::engine::status::ListEntry;
use crate::package::PackageId;

/// Generated script plus what it did not load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvScript {
    /// Script to `eval` in an interactive shell
    pub script: String,
    /// Packages the script loads, in order
    pub loaded: Vec<PackageId>,
    /// One message per skipped dangling record
    pub warnings: Vec<String>,
}

/// Quotes `value` for POSIX shells.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

const LOADER: &str = r#"__shpm_load() {
    local PKG_NAME="$1" PKG_REPO="$2" PKG_PATH="$3" PKG_HOOK=load
    unset -f pkg.install pkg.update pkg.remove pkg.load
    [ -f "$PKG_PATH/pkg.sh" ] || return 0
    if ! . "$PKG_PATH/pkg.sh"; then
        echo "shpm: failed to source $PKG_REPO/$PKG_NAME" >&2
        return 1
    fi
    if declare -F pkg.load >/dev/null; then
        pkg.load || echo "shpm: load hook of $PKG_REPO/$PKG_NAME failed" >&2
    fi
    unset -f pkg.install pkg.update pkg.remove pkg.load
}
"#;

/// Builds the integration script for `entries`.
#[must_use]
pub fn render<'a>(
    layout: &Layout,
    prelude: &Path,
    entries: impl IntoIterator<Item = &'a ListEntry>,
) -> EnvScript {
    let mut script = String::from("# Generated by shpm env\n");
    let mut loaded = Vec::new();
    let mut warnings = Vec::new();

    let _ = writeln!(script, "export SHPM_HOME={}", shell_quote(&layout.home().display().to_string()));
    let _ = writeln!(script, "export SHPM_PRELUDE={}", shell_quote(&prelude.display().to_string()));
    script.push_str("if [ -f \"$SHPM_PRELUDE\" ]; then . \"$SHPM_PRELUDE\"; fi\n");
    script.push_str(LOADER);

    for entry in entries {
        let record = &entry.record;
        if !record.enabled {
            continue;
        }
        let id = record.id();

        if entry.status.is_dangling() {
            let warning = format!("skipping {id}: {}", entry.status);
            let _ = writeln!(script, "# shpm: {warning}");
            let _ = writeln!(script, "echo {} >&2", shell_quote(&format!("shpm: {warning}")));
            warnings.push(warning);
            continue;
        }

        let dir = layout.repository_dir(&record.repo).join(&record.name);
        let _ = writeln!(
            script,
            "__shpm_load {} {} {}",
            shell_quote(&record.name),
            shell_quote(&record.repo),
            shell_quote(&dir.display().to_string())
        );
        loaded.push(id);
    }

    script.push_str("unset -f __shpm_load\n");
    let _ = write!(
        script,
        r#"shpm() {{
    command shpm "$@"
    local status=$?
    if [ -f "$SHPM_HOME/{RELOAD_MARKER_NAME}" ]; then
        rm -f "$SHPM_HOME/{RELOAD_MARKER_NAME}"
        eval "$(command shpm env 2>/dev/null)"
    fi
    return $status
}}
"#
    );

    EnvScript {
        script,
        loaded,
        warnings,
    }
}

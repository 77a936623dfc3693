//! Cross-platform utilities shared by the registry, state store and executors.
//!
//! - [`fs`] - directory creation, atomic writes, directory listing
//! - [`platform`] - home directory, path expansion, git executable name

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, ensure_dir, list_subdirectories, remove_dir_all};
pub use platform::{get_git_command, get_home_dir, is_windows, resolve_path};

//! Integration test suite for shpm
//!
//! End-to-end tests that drive the engine and the `shpm` binary against
//! throwaway homes and `file://` package repositories.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the `shpm` binary, argument handling and exit codes
//! - **lifecycle**: install, update, remove, enable and disable through the engine
//! - **repositories**: registering, syncing and removing repositories
//! - **shell_env**: the generated `shpm env` script

mod common;

mod cli;
mod lifecycle;
mod repositories;
mod shell_env;

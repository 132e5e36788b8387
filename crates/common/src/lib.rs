//! Testkit Common - Shared functionality for testkit components
//!
//! This crate provides the pieces shared by the harness and graph crates:
//! the error taxonomy, retry policies, deterministic wallet derivation,
//! cache paths, and logging setup.

/// Cache directory resolution for rewritten manifests and other artifacts
pub mod cache;
/// Environment variable name constants for testkit configuration
pub mod env;
/// Typed error taxonomy shared across the workspace
pub mod error;
/// Logging setup and utilities for consistent logging across components
pub mod logging;
/// Bounded retry policies for polling loops
pub mod retry;
/// Test environment helpers
pub mod test_utils;
/// Deterministic wallet derivation from a mnemonic and derivation path
pub mod wallet;

pub use cache::*;
pub use error::*;
pub use logging::*;
pub use retry::*;
pub use wallet::*;

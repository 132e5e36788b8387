//! Environment variable name constants for testkit configuration.
//!
//! A single source of truth for every variable the toolkit reads, so call
//! sites cannot drift apart on spelling.

/// Overrides the cache directory used for staged subgraph manifests.
///
/// Defaults to `~/.testkit/cache` when unset. The CLI's `--cache-dir`
/// argument takes precedence over this variable.
pub const TESTKIT_CACHE_DIR: &str = "TESTKIT_CACHE_DIR";

/// Overrides the node binary the harness spawns.
///
/// Defaults to `anvil` on the `PATH`. Useful for pinning a specific
/// foundry installation in CI.
pub const TESTKIT_NODE_BIN: &str = "TESTKIT_NODE_BIN";

/// RPC URL used to fork a remote network, consumed by the CLI's
/// `--fork-url` argument as its env fallback.
pub const TESTKIT_FORK_URL: &str = "TESTKIT_FORK_URL";

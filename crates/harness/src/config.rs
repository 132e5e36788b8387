//! Harness configuration.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use testkit_common::{RetryPolicy, DEFAULT_DERIVATION_PATH, DEFAULT_MNEMONIC};

/// Fork a local chain off a remote network at a fixed height.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkConfig {
    /// JSON-RPC URL of the upstream network.
    pub url: String,
    /// Block height to fork at.
    pub block_number: u64,
}

/// Configuration for starting or binding to a development node,
/// with fluent setters and sensible defaults.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    port: u16,
    accounts: u32,
    mnemonic: String,
    derivation_path: String,
    project_root: Option<PathBuf>,
    graph_project: Option<PathBuf>,
    fork: Option<ForkConfig>,
    node_bin: String,
    startup_timeout: Duration,
    receipt_policy: RetryPolicy,
    silent: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Node configuration
            port: 8545,
            accounts: 10,
            mnemonic: DEFAULT_MNEMONIC.to_string(),
            derivation_path: DEFAULT_DERIVATION_PATH.to_string(),
            node_bin: std::env::var(testkit_common::env::TESTKIT_NODE_BIN)
                .unwrap_or_else(|_| "anvil".to_string()),

            // Project wiring
            project_root: None,
            graph_project: None,
            fork: None,

            // Polling bounds
            startup_timeout: Duration::from_secs(30),
            receipt_policy: RetryPolicy::fixed(Duration::from_secs(1), 30),

            // Child process output suppressed unless opted in
            silent: true,
        }
    }
}

impl NodeConfig {
    /// New config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the port the node listens on (default 8545).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the number of accounts to derive (default 10).
    pub fn with_accounts(mut self, count: u32) -> Self {
        self.accounts = count;
        self
    }

    /// Set the derivation mnemonic (default: the standard test mnemonic).
    pub fn with_mnemonic(mut self, mnemonic: impl Into<String>) -> Self {
        self.mnemonic = mnemonic.into();
        self
    }

    /// Set the derivation path prefix (default `m/44'/60'/0'/0`).
    pub fn with_derivation_path(mut self, path: impl Into<String>) -> Self {
        self.derivation_path = path.into();
        self
    }

    /// Set the contract project root contracts are deployed from.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Set the directory holding a docker compose file for an indexing
    /// stack brought up alongside the node.
    pub fn with_graph_project(mut self, dir: impl Into<PathBuf>) -> Self {
        self.graph_project = Some(dir.into());
        self
    }

    /// Fork state from a remote network at a fixed height.
    pub fn with_fork(mut self, url: impl Into<String>, block_number: u64) -> Self {
        self.fork = Some(ForkConfig { url: url.into(), block_number });
        self
    }

    /// Override the node binary (default `anvil`, or `TESTKIT_NODE_BIN`).
    pub fn with_node_bin(mut self, bin: impl Into<String>) -> Self {
        self.node_bin = bin.into();
        self
    }

    /// Bound on how long to wait for the node's ready signal (default 30s).
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Polling schedule for transaction receipts (default 1s x 30).
    pub fn with_receipt_policy(mut self, policy: RetryPolicy) -> Self {
        self.receipt_policy = policy;
        self
    }

    /// Show child process output instead of suppressing it.
    pub fn verbose(mut self) -> Self {
        self.silent = false;
        self
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Number of accounts to derive.
    pub fn accounts(&self) -> u32 {
        self.accounts
    }

    /// Derivation mnemonic.
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    /// Derivation path prefix.
    pub fn derivation_path(&self) -> &str {
        &self.derivation_path
    }

    /// Contract project root, when configured.
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Docker compose directory for the indexing stack, when configured.
    pub fn graph_project(&self) -> Option<&Path> {
        self.graph_project.as_deref()
    }

    /// Fork settings, when configured.
    pub fn fork(&self) -> Option<&ForkConfig> {
        self.fork.as_ref()
    }

    /// Node binary name or path.
    pub fn node_bin(&self) -> &str {
        &self.node_bin
    }

    /// Startup readiness bound.
    pub fn startup_timeout(&self) -> Duration {
        self.startup_timeout
    }

    /// Receipt polling schedule.
    pub fn receipt_policy(&self) -> &RetryPolicy {
        &self.receipt_policy
    }

    /// Whether child process output is suppressed.
    pub fn silent(&self) -> bool {
        self.silent
    }

    /// HTTP endpoint for the configured port.
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_standard_dev_node() {
        let config = NodeConfig::default();
        assert_eq!(config.port(), 8545);
        assert_eq!(config.accounts(), 10);
        assert_eq!(config.mnemonic(), DEFAULT_MNEMONIC);
        assert_eq!(config.endpoint(), "http://127.0.0.1:8545");
        assert!(config.fork().is_none());
        assert!(config.silent());
    }

    #[test]
    fn fluent_setters_compose() {
        let config = NodeConfig::new()
            .with_port(19000)
            .with_accounts(3)
            .with_fork("https://rpc.example", 6_000_000)
            .with_project_root("/tmp/project")
            .verbose();
        assert_eq!(config.port(), 19000);
        assert_eq!(config.accounts(), 3);
        assert_eq!(
            config.fork(),
            Some(&ForkConfig { url: "https://rpc.example".into(), block_number: 6_000_000 })
        );
        assert_eq!(config.project_root(), Some(Path::new("/tmp/project")));
        assert!(!config.silent());
    }
}

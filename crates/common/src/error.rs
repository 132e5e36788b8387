//! Error taxonomy for the harness and graph deployer.
//!
//! Callers are expected to match on variants rather than message substrings,
//! so every failure mode that tests may want to distinguish gets its own
//! kind with enough context to diagnose it.

use std::{path::PathBuf, time::Duration};

use alloy_primitives::TxHash;

/// Result alias used throughout the workspace.
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Everything that can go wrong while driving a node, deploying contracts,
/// or publishing a subgraph.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The node did not signal readiness within the configured bound.
    #[error("node on port {port} did not become ready within {timeout:?}")]
    StartupTimeout {
        /// Port the node was asked to listen on.
        port: u16,
        /// How long we waited overall.
        timeout: Duration,
    },

    /// The node process reported the port as taken. Remediation (killing the
    /// holder and respawning once) already failed when this surfaces.
    #[error("port {port} is unavailable")]
    PortUnavailable {
        /// The contested port.
        port: u16,
    },

    /// The node process exited before signalling readiness.
    #[error("node process exited during startup:\n{output}")]
    NodeExited {
        /// Captured stdout/stderr of the dead process, for diagnostics.
        output: String,
    },

    /// An operation needs a piece of configuration that was never provided.
    #[error("missing configuration: {what}")]
    ConfigurationMissing {
        /// Which setting is required (e.g. the project root for deploys).
        what: &'static str,
    },

    /// No compiled artifact could be located for a contract name.
    #[error("no compiled artifact found for contract {contract:?} under {searched}")]
    ArtifactNotFound {
        /// Contract name as requested.
        contract: String,
        /// Project root that was searched.
        searched: PathBuf,
    },

    /// The deployment transaction mined but produced no usable contract.
    #[error("deployment of {contract:?} failed (tx {tx_hash})")]
    DeploymentFailed {
        /// Contract name as requested.
        contract: String,
        /// Hash of the failed deployment transaction.
        tx_hash: TxHash,
    },

    /// The contract ABI exposes no function with the requested name.
    #[error("contract has no method named {method:?}")]
    MethodNotFound {
        /// Requested method name.
        method: String,
    },

    /// Several overloads match the requested name and argument count.
    #[error("method {method:?} is ambiguous for {arg_count} argument(s)")]
    AmbiguousMethod {
        /// Requested method name.
        method: String,
        /// Number of arguments supplied.
        arg_count: usize,
    },

    /// A state-changing transaction mined with a failure status.
    #[error("transaction {tx_hash} failed")]
    TransactionFailed {
        /// Hash of the reverted transaction.
        tx_hash: TxHash,
    },

    /// The receipt never showed up within the polling bound.
    #[error("no receipt for transaction {tx_hash} after {attempts} attempts")]
    ReceiptTimeout {
        /// Hash of the pending transaction.
        tx_hash: TxHash,
        /// How many polls were made.
        attempts: u32,
    },

    /// Resetting a forked chain back to its fork height failed. Callers log
    /// and swallow this: some upstream networks do not support resets.
    #[error("fork reset failed: {reason}")]
    ForkResetFailed {
        /// Underlying failure, stringified for the log line.
        reason: String,
    },

    /// The local graph node refused the create/deploy command. Transient
    /// right after chain startup and retried under a policy.
    #[error("graph node not ready after {attempts} attempt(s): {output}")]
    IndexerNotReady {
        /// How many attempts were made.
        attempts: u32,
        /// Output of the last failed command.
        output: String,
    },

    /// JSON-RPC transport failure.
    #[error(transparent)]
    Rpc(#[from] alloy_transport::TransportError),

    /// ABI encode/decode failure.
    #[error(transparent)]
    Abi(#[from] alloy_dyn_abi::Error),

    /// Wallet derivation failure.
    #[error(transparent)]
    Signer(#[from] alloy_signer_local::LocalSignerError),

    /// Filesystem or child-process I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed JSON (artifact files).
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Malformed YAML (subgraph manifests).
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_render_their_context() {
        let err = HarnessError::StartupTimeout { port: 19000, timeout: Duration::from_secs(30) };
        assert!(err.to_string().contains("19000"));

        let err = HarnessError::ConfigurationMissing { what: "project root" };
        assert!(err.to_string().contains("project root"));

        let err = HarnessError::AmbiguousMethod { method: "initialize".into(), arg_count: 2 };
        assert!(err.to_string().contains("initialize"));
        assert!(err.to_string().contains('2'));
    }
}

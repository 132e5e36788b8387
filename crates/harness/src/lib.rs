//! Testkit Harness - local Ethereum node lifecycle management
//!
//! The harness owns (or binds to) a single development node per handle:
//! it spawns the node process, waits for readiness, derives deterministic
//! test wallets, snapshots and rolls back chain state between test cases,
//! deploys contracts from compiled artifacts, and routes typed contract
//! calls as either read-only calls or mined transactions.

/// Node and harness configuration builders
pub mod config;
/// Contract deployment from compiled project artifacts
pub mod deploy;
/// Docker compose helper for auxiliary services
pub mod docker;
/// Typed call routing between `eth_call` and mined transactions
pub mod invoke;
/// The node process manager
pub mod node;
/// Transaction receipt polling
pub mod waiter;

pub use config::{ForkConfig, NodeConfig};
pub use deploy::{load_artifact, Artifact, DeployRequest, DeployedContract};
pub use invoke::{invoke_contract, ContractHandle};
pub use node::{Harness, Snapshot};
pub use waiter::wait_for_receipt;

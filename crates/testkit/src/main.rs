//! Testkit - local Ethereum test infrastructure from the shell
//!
//! `testkit node` starts a development node (plus an optional indexing
//! stack) and keeps it alive until Ctrl+C; `testkit graph` patches a
//! subgraph manifest with deployed contract locations and publishes it to
//! the local graph node.

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use testkit_graph::{ContractLocation, GraphDeployer};
use testkit_harness::{Harness, NodeConfig};

/// Command-line interface for testkit
#[derive(Debug, Parser)]
#[command(name = "testkit")]
#[command(about = "Local Ethereum test harness - node lifecycle and subgraph deployment")]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a development node and keep it running until Ctrl+C
    Node {
        /// Port for the node's JSON-RPC server
        #[arg(long, default_value = "8545")]
        port: u16,

        /// Number of funded accounts to derive
        #[arg(long, default_value = "10")]
        accounts: u32,

        /// Mnemonic the accounts are derived from
        #[arg(long)]
        mnemonic: Option<String>,

        /// Upstream RPC URL to fork state from
        #[arg(long, env = testkit_common::env::TESTKIT_FORK_URL)]
        fork_url: Option<String>,

        /// Block height to fork at (requires --fork-url)
        #[arg(long, requires = "fork_url")]
        fork_block: Option<u64>,

        /// Directory with a docker compose file for an indexing stack to
        /// bring up alongside the node
        #[arg(long)]
        graph_project: Option<PathBuf>,

        /// Seconds to wait for the node to become ready
        #[arg(long, default_value = "30")]
        startup_timeout: u64,

        /// Show node output instead of suppressing it
        #[arg(long)]
        verbose: bool,
    },
    /// Patch a subgraph manifest and publish it to the local graph node
    Graph {
        /// Subgraph project directory (holds subgraph.yaml and the yarn
        /// create-local / deploy-local scripts)
        #[arg(long)]
        project: PathBuf,

        /// Deployed contract location, as NAME=ADDRESS@BLOCK. Repeatable.
        #[arg(long = "contract", value_name = "NAME=ADDRESS@BLOCK")]
        contracts: Vec<String>,

        /// Network name stamped onto every data source
        #[arg(long)]
        network: Option<String>,

        /// Directory to stage the rewritten manifest in
        /// (default: ~/.testkit/cache, or TESTKIT_CACHE_DIR)
        #[arg(long, env = testkit_common::env::TESTKIT_CACHE_DIR)]
        cache_dir: Option<PathBuf>,

        /// Show yarn output instead of suppressing it
        #[arg(long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    testkit_common::init_logging(Some("testkit=info,testkit_harness=info,testkit_graph=info"));

    match cli.command {
        Commands::Node {
            port,
            accounts,
            mnemonic,
            fork_url,
            fork_block,
            graph_project,
            startup_timeout,
            verbose,
        } => {
            let mut config = NodeConfig::new()
                .with_port(port)
                .with_accounts(accounts)
                .with_startup_timeout(Duration::from_secs(startup_timeout));
            if let Some(mnemonic) = mnemonic {
                config = config.with_mnemonic(mnemonic);
            }
            if let Some(url) = fork_url {
                config = config.with_fork(url, fork_block.unwrap_or_default());
            }
            if let Some(dir) = graph_project {
                config = config.with_graph_project(dir);
            }
            if verbose {
                config = config.verbose();
            }
            run_node(config).await
        }
        Commands::Graph { project, contracts, network, cache_dir, verbose } => {
            let contracts = parse_contract_locations(&contracts)?;
            let mut deployer = GraphDeployer::new(project);
            if let Some(network) = network {
                deployer = deployer.with_network(network);
            }
            if let Some(dir) = cache_dir {
                deployer = deployer.with_cache(testkit_common::TestkitCachePath::new(dir));
            }
            if verbose {
                deployer = deployer.verbose();
            }
            let manifest = deployer.deploy(&contracts).await?;
            println!("deployed {}", manifest.display());
            Ok(())
        }
    }
}

/// Starts the node and blocks until Ctrl+C, then tears it down.
async fn run_node(config: NodeConfig) -> Result<()> {
    let harness = Harness::start(config).await?;

    println!("node listening on {}", harness.endpoint());
    for (index, wallet) in harness.wallets().iter().enumerate() {
        println!("  account {index}: {}", wallet.address);
    }
    println!("press Ctrl+C to stop");

    tokio::signal::ctrl_c().await.wrap_err("failed to listen for Ctrl+C")?;
    tracing::info!("received Ctrl+C, shutting down");
    harness.stop().await?;
    Ok(())
}

/// Parses repeated `NAME=ADDRESS@BLOCK` arguments into a location map.
fn parse_contract_locations(args: &[String]) -> Result<BTreeMap<String, ContractLocation>> {
    let mut contracts = BTreeMap::new();
    for arg in args {
        let (name, rest) = arg
            .split_once('=')
            .ok_or_else(|| eyre!("expected NAME=ADDRESS@BLOCK, got {arg:?}"))?;
        let (address, block) = rest
            .split_once('@')
            .ok_or_else(|| eyre!("expected NAME=ADDRESS@BLOCK, got {arg:?}"))?;
        let address: Address =
            address.parse().wrap_err_with(|| format!("bad address in {arg:?}"))?;
        let start_block: u64 =
            block.parse().wrap_err_with(|| format!("bad block number in {arg:?}"))?;
        contracts.insert(name.to_string(), ContractLocation { address, start_block });
    }
    Ok(contracts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_contract_locations() {
        let args = vec![
            "Echo=0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266@7".to_string(),
            "Feed=0x5FbDB2315678afecb367f032d93F642f64180aa3@12".to_string(),
        ];
        let contracts = parse_contract_locations(&args).unwrap();
        assert_eq!(contracts.len(), 2);
        assert_eq!(contracts["Echo"].start_block, 7);
        assert_eq!(contracts["Feed"].start_block, 12);
    }

    #[test]
    fn rejects_malformed_locations() {
        assert!(parse_contract_locations(&["Echo".to_string()]).is_err());
        assert!(parse_contract_locations(&["Echo=0x1234".to_string()]).is_err());
        assert!(parse_contract_locations(&["Echo=nothex@7".to_string()]).is_err());
    }

    #[test]
    fn cli_parses_node_subcommand() {
        let cli = Cli::try_parse_from([
            "testkit",
            "node",
            "--port",
            "19000",
            "--accounts",
            "3",
            "--verbose",
        ])
        .unwrap();
        match cli.command {
            Commands::Node { port, accounts, verbose, .. } => {
                assert_eq!(port, 19000);
                assert_eq!(accounts, 3);
                assert!(verbose);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    #[serial_test::serial]
    fn fork_block_requires_fork_url() {
        std::env::remove_var(testkit_common::env::TESTKIT_FORK_URL);
        assert!(Cli::try_parse_from(["testkit", "node", "--fork-block", "100"]).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn fork_url_falls_back_to_the_environment() {
        std::env::set_var(testkit_common::env::TESTKIT_FORK_URL, "https://rpc.example");
        let cli =
            Cli::try_parse_from(["testkit", "node", "--fork-block", "100"]).unwrap();
        std::env::remove_var(testkit_common::env::TESTKIT_FORK_URL);
        match cli.command {
            Commands::Node { fork_url, fork_block, .. } => {
                assert_eq!(fork_url.as_deref(), Some("https://rpc.example"));
                assert_eq!(fork_block, Some(100));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

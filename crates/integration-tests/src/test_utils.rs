//! Test utilities for integration tests

/// Initialization utilities for tests
pub mod init {
    /// Initialize test environment with cache directory and logging
    pub fn init_test_environment() {
        testkit_common::test_utils::setup_test_environment();
        testkit_common::logging::ensure_test_logging(None);
    }
}

/// Node helpers for tests that talk to a real development node
pub mod node {
    use std::{net::TcpListener, time::Duration};

    use testkit_common::RetryPolicy;
    use testkit_harness::NodeConfig;

    /// Picks a port the OS reports as free right now.
    ///
    /// There is a window between releasing the probe socket and the node
    /// binding it, which is exactly what the harness's port remediation
    /// exists for, so a rare collision here still produces a working node.
    pub fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .map(|addr| addr.port())
            .expect("failed to probe for a free port")
    }

    /// Node config for tests: a free port and tight polling bounds so a
    /// broken environment fails fast instead of hanging the suite.
    pub fn test_config() -> NodeConfig {
        NodeConfig::new()
            .with_port(free_port())
            .with_accounts(3)
            .with_startup_timeout(Duration::from_secs(15))
            .with_receipt_policy(RetryPolicy::fixed(Duration::from_millis(250), 40))
    }
}

/// Fixture writers for compiled-project and subgraph layouts
pub mod fixtures {
    use std::path::Path;

    /// ABI of the remix sample "Storage" contract used by the e2e tests.
    pub const STORAGE_ABI: &str = r#"[
        {
            "type": "function",
            "name": "retrieve",
            "inputs": [],
            "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}],
            "stateMutability": "view"
        },
        {
            "type": "function",
            "name": "store",
            "inputs": [{"name": "num", "type": "uint256", "internalType": "uint256"}],
            "outputs": [],
            "stateMutability": "nonpayable"
        }
    ]"#;

    /// Creation bytecode of the remix sample "Storage" contract
    /// (`store(uint256)` / `retrieve()`), solc 0.8.7.
    pub const STORAGE_BYTECODE: &str = "0x608060405234801561001057600080fd5b50610150806100206000396000f3fe608060405234801561001057600080fd5b50600436106100365760003560e01c80632e64cec11461003b5780636057361d14610059575b600080fd5b610043610075565b60405161005091906100d9565b60405180910390f35b610073600480360381019061006e919061009d565b61007e565b005b60008054905090565b8060008190555050565b60008135905061009781610103565b92915050565b6000602082840312156100b3576100b26100fe565b5b60006100c184828501610088565b91505092915050565b6100d3816100f4565b82525050565b60006020820190506100ee60008301846100ca565b92915050565b6000819050919050565b600080fd5b61010c816100f4565b811461011757600080fd5b5056fea2646970667358221220404e37f487a89a932dca5e77faaf6ca2de3b991f93d230604b1b8daaef64766264736f6c63430008070033";

    /// Writes a forge-layout project with the Storage artifact under `root`.
    pub fn write_storage_project(root: &Path) {
        let dir = root.join("out").join("Storage.sol");
        std::fs::create_dir_all(&dir).expect("failed to create artifact dir");
        let artifact = format!(
            r#"{{"abi": {STORAGE_ABI}, "bytecode": {{"object": "{STORAGE_BYTECODE}"}}}}"#
        );
        std::fs::write(dir.join("Storage.json"), artifact).expect("failed to write artifact");
    }

    /// Writes a minimal subgraph project (manifest template only) under
    /// `root`.
    pub fn write_subgraph_template(root: &Path) {
        let manifest = r#"specVersion: 0.0.4
schema:
  file: ./schema.graphql
dataSources:
  - kind: ethereum/contract
    name: Storage
    network: mainnet
    source:
      abi: Storage
    mapping:
      kind: ethereum/events
      apiVersion: 0.0.6
      language: wasm/assemblyscript
      entities:
        - StoredValue
      abis:
        - name: Storage
          file: ./abis/Storage.json
      file: ./src/storage.ts
"#;
        std::fs::create_dir_all(root).expect("failed to create subgraph project dir");
        std::fs::write(root.join("subgraph.yaml"), manifest)
            .expect("failed to write manifest template");
    }
}

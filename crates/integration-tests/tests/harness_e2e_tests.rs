//! End-to-end tests for the node harness
//!
//! These exercise the full lifecycle against a real `anvil` binary:
//! spawning and stopping the node, reusing a node that is already
//! listening, snapshot-based state rollback, deployment from compiled
//! artifacts, and typed contract calls. They are ignored by default and
//! only meaningful with `anvil` on PATH:
//!
//! ```sh
//! cargo test -p testkit-integration-tests -- --ignored
//! ```

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use serial_test::serial;
use testkit_common::{derive_wallet, DEFAULT_DERIVATION_PATH, DEFAULT_MNEMONIC};
use testkit_harness::{DeployRequest, Harness, NodeConfig};
use testkit_integration_tests::test_utils::{fixtures, init, node};
use tracing::info;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore = "requires anvil on PATH"]
async fn start_stop_roundtrip() {
    init::init_test_environment();

    let harness = Harness::start(node::test_config()).await.expect("failed to start node");
    assert!(harness.owns_node());

    let chain_id = harness.provider().get_chain_id().await.expect("chain id probe failed");
    info!("node up with chain id {chain_id}");
    assert_eq!(harness.wallets().len(), 3);

    harness.stop().await.expect("failed to stop node");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore = "requires anvil on PATH"]
async fn second_start_reuses_the_running_node() {
    init::init_test_environment();

    let config = node::test_config();
    let first = Harness::start(config.clone()).await.expect("failed to start node");
    let second = Harness::start(config).await.expect("failed to attach to node");

    assert!(first.owns_node());
    assert!(!second.owns_node());

    // Both handles must hand out the identical derived accounts.
    assert_eq!(first.wallets(), second.wallets());
    let expected = derive_wallet(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 0)
        .expect("derivation should succeed");
    assert_eq!(first.deployer(), expected.address);
    assert_eq!(second.deployer(), expected.address);

    drop(second);
    first.stop().await.expect("failed to stop node");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore = "requires anvil on PATH"]
async fn reset_rolls_state_back_to_the_snapshot() {
    init::init_test_environment();

    let mut harness = Harness::start(node::test_config()).await.expect("failed to start node");
    let baseline = harness.snapshot().expect("startup snapshot missing");

    // Dirty the chain.
    let _: () = harness
        .provider()
        .raw_request("anvil_mine".into(), (U256::from(5u64),))
        .await
        .expect("mining failed");
    let dirty = harness.provider().get_block_number().await.expect("height probe failed");
    assert_eq!(dirty, baseline.height + 5);

    harness.reset().await.expect("reset failed");
    let restored = harness.provider().get_block_number().await.expect("height probe failed");
    assert_eq!(restored, baseline.height + 5, "height stays monotonic across restores");

    // A second reset with no intervening writes is a no-op.
    let snapshot = harness.snapshot().expect("fresh snapshot missing");
    harness.reset().await.expect("idempotent reset failed");
    assert_eq!(harness.snapshot(), Some(snapshot));

    harness.stop().await.expect("failed to stop node");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore = "requires anvil on PATH"]
async fn deploys_and_invokes_a_contract() {
    init::init_test_environment();

    let project = tempfile::tempdir().expect("failed to create project dir");
    fixtures::write_storage_project(project.path());

    let config = node::test_config().with_project_root(project.path());
    let mut harness = Harness::start(config).await.expect("failed to start node");

    let deployed =
        harness.deploy(DeployRequest::new("Storage")).await.expect("deployment failed");
    assert_ne!(deployed.address, Address::ZERO);
    assert_eq!(deployed.owner, harness.deployer());

    let caller = harness.wallet(1).expect("missing wallet").address;

    // store() mines a transaction, retrieve() answers via eth_call.
    let stored = harness
        .invoke(caller, &deployed.handle, "store", &[DynSolValue::Uint(U256::from(42u64), 256)])
        .await
        .expect("store failed");
    assert!(stored.is_empty());

    let retrieved = harness
        .invoke(caller, &deployed.handle, "retrieve", &[])
        .await
        .expect("retrieve failed");
    assert_eq!(retrieved, vec![DynSolValue::Uint(U256::from(42u64), 256)]);

    harness.stop().await.expect("failed to stop node");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
#[ignore = "requires anvil on PATH"]
async fn impersonated_accounts_can_send() {
    init::init_test_environment();

    let harness = Harness::start(node::test_config()).await.expect("failed to start node");

    // An address no derived wallet controls.
    let stranger: Address =
        "0x00000000000000000000000000000000deadbeef".parse().expect("valid address");
    harness.impersonate(stranger).await.expect("impersonation failed");

    let balance =
        harness.provider().get_balance(stranger).await.expect("balance probe failed");
    assert!(balance > U256::ZERO, "impersonated account should be funded");

    harness.stop().await.expect("failed to stop node");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bind_times_out_without_a_node() {
    init::init_test_environment();

    let config = NodeConfig::new()
        .with_port(node::free_port())
        .with_startup_timeout(std::time::Duration::from_secs(2));
    let started = std::time::Instant::now();
    let result = Harness::bind(config).await;
    assert!(
        matches!(result, Err(testkit_common::HarnessError::StartupTimeout { .. })),
        "binding to a dead port must fail with a startup timeout"
    );
    // The configured timeout bounds the wall-clock wait; some slack for
    // the probe that straddles the deadline.
    assert!(
        started.elapsed() < std::time::Duration::from_secs(6),
        "bind waited {:?} against a 2s timeout",
        started.elapsed()
    );
}

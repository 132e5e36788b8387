//! Manifest rewriting tests against on-disk subgraph projects
//!
//! These cover the file-level half of subgraph deployment: reading a
//! manifest template from a project directory, stamping deployed contract
//! locations into it, and staging the result. The yarn-driven publish
//! itself needs a composed graph node and is exercised separately.

use std::collections::BTreeMap;

use alloy_primitives::Address;
use testkit_graph::{rewrite_manifest, ContractLocation, SubgraphManifest};
use testkit_integration_tests::test_utils::{fixtures, init};

fn storage_location() -> ContractLocation {
    ContractLocation {
        address: "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().expect("valid address"),
        start_block: 3,
    }
}

#[test]
fn template_from_disk_is_stamped_and_restaged() {
    init::init_test_environment();

    let project = tempfile::tempdir().expect("failed to create project dir");
    fixtures::write_subgraph_template(project.path());

    let template = std::fs::read_to_string(project.path().join("subgraph.yaml"))
        .expect("template missing");
    let mut manifest = SubgraphManifest::from_yaml(&template).expect("template must parse");
    assert!(manifest.data_sources[0].source.address.is_none());

    let contracts = BTreeMap::from([("Storage".to_string(), storage_location())]);
    rewrite_manifest(&mut manifest, project.path(), Some("localhost"), &contracts);

    // Stage the rewritten manifest and read it back, as the deployer does.
    let staging = tempfile::tempdir().expect("failed to create staging dir");
    let staged_path = staging.path().join("subgraph.yaml");
    std::fs::write(&staged_path, manifest.to_yaml().expect("serialization failed"))
        .expect("staging failed");

    let staged = std::fs::read_to_string(&staged_path).expect("staged manifest missing");
    let reparsed = SubgraphManifest::from_yaml(&staged).expect("staged manifest must parse");

    let data_source = &reparsed.data_sources[0];
    assert_eq!(data_source.network.as_deref(), Some("localhost"));
    assert_eq!(
        data_source.source.address.as_deref(),
        Some("0x5FbDB2315678afecb367f032d93F642f64180aa3")
    );
    assert_eq!(data_source.source.start_block, Some(3));

    // File links now resolve from anywhere, not just the project dir.
    let abi_file = data_source.mapping.abis[0].file.as_str().expect("abi link missing");
    assert!(abi_file.starts_with(project.path().to_str().expect("utf-8 path")));
}

#[test]
fn sources_without_contracts_are_dropped_from_staged_manifests() {
    init::init_test_environment();

    let project = tempfile::tempdir().expect("failed to create project dir");
    fixtures::write_subgraph_template(project.path());

    let template = std::fs::read_to_string(project.path().join("subgraph.yaml"))
        .expect("template missing");
    let mut manifest = SubgraphManifest::from_yaml(&template).expect("template must parse");

    // Nothing deployed: the Storage source has no address to fall back on.
    rewrite_manifest(&mut manifest, project.path(), None, &BTreeMap::new());
    assert!(manifest.data_sources.is_empty());
}

#[test]
fn stamped_addresses_are_checksummed() {
    init::init_test_environment();

    let mut manifest = SubgraphManifest::from_yaml(
        r#"
specVersion: 0.0.4
schema:
  file: ./schema.graphql
dataSources:
  - kind: ethereum/contract
    name: Storage
    source:
      abi: Storage
    mapping:
      abis:
        - name: Storage
          file: ./abis/Storage.json
"#,
    )
    .expect("manifest must parse");

    let lowercase: Address =
        "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().expect("valid address");
    let contracts = BTreeMap::from([(
        "Storage".to_string(),
        ContractLocation { address: lowercase, start_block: 0 },
    )]);
    rewrite_manifest(&mut manifest, std::path::Path::new("/tmp"), None, &contracts);

    assert_eq!(
        manifest.data_sources[0].source.address.as_deref(),
        Some("0x5FbDB2315678afecb367f032d93F642f64180aa3"),
        "addresses render in EIP-55 checksum form"
    );
}

//! The subgraph manifest data model.
//!
//! Only the fields the deployer needs to read or rewrite are typed; every
//! other key is carried through a flattened map so a patched manifest
//! round-trips byte-for-byte semantics with the template it came from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top level of a `subgraph.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphManifest {
    /// Manifest spec version, e.g. `0.0.4`.
    pub spec_version: String,
    /// Free-form description shown by graph explorers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source repository URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Link to the GraphQL schema file.
    pub schema: serde_yaml::Value,
    /// The contracts this subgraph indexes.
    pub data_sources: Vec<DataSource>,
    /// Everything else (templates, features, graft), carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One indexed contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    /// Data source kind, `ethereum` or `ethereum/contract`.
    pub kind: String,
    /// Data source name, conventionally the contract name.
    pub name: String,
    /// Network the contract lives on; the deployer stamps this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Where the contract lives.
    pub source: Source,
    /// Handler wiring and ABI references.
    pub mapping: Mapping,
    /// Keys this crate does not interpret, carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Where a data source's contract lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Contract address. Templates for not-yet-deployed contracts leave
    /// this empty; the deployer fills it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Name of the ABI in the mapping's `abis` list.
    pub abi: String,
    /// Block to start indexing from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_block: Option<u64>,
    /// Keys this crate does not interpret, carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Mapping section of a data source. Only the ABI list is typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    /// ABI files the mapping handlers decode against.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub abis: Vec<MappingAbi>,
    /// Keys this crate does not interpret, carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A named ABI file reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingAbi {
    /// Name the mapping refers to the ABI by.
    pub name: String,
    /// File link to the ABI JSON, a string or a `{ file: ... }` mapping.
    pub file: serde_yaml::Value,
    /// Keys this crate does not interpret, carried verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl SubgraphManifest {
    /// Parses a manifest from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Serializes the manifest back to YAML text.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
specVersion: 0.0.4
description: Local test subgraph
schema:
  file: ./schema.graphql
features:
  - nonFatalErrors
dataSources:
  - kind: ethereum/contract
    name: Echo
    network: mainnet
    source:
      abi: Echo
    mapping:
      kind: ethereum/events
      apiVersion: 0.0.6
      language: wasm/assemblyscript
      entities:
        - EchoEvent
      abis:
        - name: Echo
          file: ./abis/Echo.json
      eventHandlers:
        - event: Echoed(uint256)
          handler: handleEchoed
      file: ./src/echo.ts
"#;

    #[test]
    fn parses_a_template_manifest() {
        let manifest = SubgraphManifest::from_yaml(TEMPLATE).unwrap();
        assert_eq!(manifest.spec_version, "0.0.4");
        assert_eq!(manifest.data_sources.len(), 1);
        let ds = &manifest.data_sources[0];
        assert_eq!(ds.name, "Echo");
        assert_eq!(ds.source.abi, "Echo");
        assert!(ds.source.address.is_none());
        assert_eq!(ds.mapping.abis[0].name, "Echo");
    }

    #[test]
    fn untyped_keys_round_trip() {
        let manifest = SubgraphManifest::from_yaml(TEMPLATE).unwrap();
        let yaml = manifest.to_yaml().unwrap();
        let reparsed = SubgraphManifest::from_yaml(&yaml).unwrap();

        assert!(reparsed.extra.contains_key("features"));
        let mapping = &reparsed.data_sources[0].mapping;
        assert!(mapping.extra.contains_key("eventHandlers"));
        assert!(mapping.extra.contains_key("entities"));
    }

    #[test]
    fn start_block_serializes_in_camel_case() {
        let mut manifest = SubgraphManifest::from_yaml(TEMPLATE).unwrap();
        manifest.data_sources[0].source.start_block = Some(42);
        let yaml = manifest.to_yaml().unwrap();
        assert!(yaml.contains("startBlock: 42"));
    }
}

//! Testkit Graph - subgraph deployment against a local graph node
//!
//! Takes a subgraph project's manifest, stamps in the addresses and start
//! blocks of contracts deployed by the harness, and publishes the patched
//! manifest to the local graph node with the project's own yarn scripts.

/// Publishing a patched manifest to a local graph node
pub mod deploy;
/// The subgraph manifest data model
pub mod manifest;

pub use deploy::{rewrite_manifest, ContractLocation, GraphDeployer, VERSION_LABEL};
pub use manifest::{DataSource, Mapping, MappingAbi, Source, SubgraphManifest};

//! Publishing a patched manifest to a local graph node.
//!
//! The deployer does not talk to the graph node directly; it drives the
//! subgraph project's own yarn scripts (`create-local`, `deploy-local`),
//! the same way a developer would from the shell. `create-local` is
//! retried under a policy because a freshly composed graph node takes a
//! while to accept connections.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use alloy_primitives::Address;
use testkit_common::{HarnessError, Result, RetryPolicy, TestkitCachePath};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::manifest::SubgraphManifest;

/// Version label every local deployment is published under.
pub const VERSION_LABEL: &str = "v0.0.1";

/// Where a deployed contract ended up, for manifest stamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractLocation {
    /// On-chain address.
    pub address: Address,
    /// Block the deployment mined in; indexing starts here.
    pub start_block: u64,
}

/// Deploys a subgraph project against a local graph node.
#[derive(Debug, Clone)]
pub struct GraphDeployer {
    project_dir: PathBuf,
    cache: TestkitCachePath,
    network: Option<String>,
    create_policy: RetryPolicy,
    silent: bool,
}

impl GraphDeployer {
    /// Deployer for the subgraph project at `project_dir`.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            cache: TestkitCachePath::default(),
            network: None,
            // The graph node can take a minute to come up behind compose.
            create_policy: RetryPolicy::fixed(Duration::from_secs(1), 60),
            silent: true,
        }
    }

    /// Write the patched manifest under this cache instead of the default.
    pub fn with_cache(mut self, cache: TestkitCachePath) -> Self {
        self.cache = cache;
        self
    }

    /// Stamp this network name onto every data source.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Retry schedule for `create-local` (default 1s x 60).
    pub fn with_create_policy(mut self, policy: RetryPolicy) -> Self {
        self.create_policy = policy;
        self
    }

    /// Show yarn output instead of suppressing it.
    pub fn verbose(mut self) -> Self {
        self.silent = false;
        self
    }

    /// Rewrites the project's manifest with `contracts` and publishes it.
    ///
    /// Returns the path of the rewritten manifest that was deployed.
    pub async fn deploy(
        &self,
        contracts: &BTreeMap<String, ContractLocation>,
    ) -> Result<PathBuf> {
        let template_path = self.project_dir.join("subgraph.yaml");
        let template = std::fs::read_to_string(&template_path)?;
        let mut manifest = SubgraphManifest::from_yaml(&template)?;
        rewrite_manifest(&mut manifest, &self.project_dir, self.network.as_deref(), contracts);

        let manifest_dir = self
            .cache
            .graph_manifest_dir()
            .ok_or(HarnessError::ConfigurationMissing { what: "cache directory" })?;
        std::fs::create_dir_all(&manifest_dir)?;
        let manifest_path = manifest_dir.join("subgraph.yaml");
        std::fs::write(&manifest_path, manifest.to_yaml()?)?;
        debug!("rewritten manifest staged at {}", manifest_path.display());

        self.create_local().await?;
        self.deploy_local(&manifest_path).await?;
        info!("subgraph published as {VERSION_LABEL}");
        Ok(manifest_path)
    }

    /// `yarn create-local`, retried until the graph node accepts it.
    async fn create_local(&self) -> Result<()> {
        self.create_policy
            .run("yarn create-local", || self.run_yarn(&["create-local"]))
            .await
            .map_err(|output| HarnessError::IndexerNotReady {
                attempts: self.create_policy.max_attempts,
                output,
            })?;
        Ok(())
    }

    /// `yarn deploy-local <manifest> -l v0.0.1`, not retried: once create
    /// succeeded the node is up, so a deploy failure is a real error.
    async fn deploy_local(&self, manifest: &Path) -> Result<()> {
        let manifest = manifest.to_string_lossy();
        self.run_yarn(&["deploy-local", &manifest, "-l", VERSION_LABEL])
            .await
            .map_err(|output| HarnessError::IndexerNotReady { attempts: 1, output })?;
        Ok(())
    }

    async fn run_yarn(&self, args: &[&str]) -> Result<(), String> {
        let mut cmd = Command::new("yarn");
        cmd.args(args).current_dir(&self.project_dir).stdin(Stdio::null());
        if self.silent {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        let output = cmd.output().await.map_err(|err| err.to_string())?;
        if output.status.success() {
            debug!("yarn {} succeeded", args.join(" "));
            Ok(())
        } else {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            Err(combined.trim().to_string())
        }
    }
}

/// Rewrites a manifest template for deployment against the local chain.
///
/// Contract addresses and start blocks are stamped into matching data
/// sources (matched by `source.abi` name, falling back to the data source
/// name). Unmatched sources that carry no static address cannot be indexed
/// and are dropped with a warning. When `network` is given it overrides
/// each data source's network. Relative file links are resolved against
/// `base_dir` so the staged manifest works from any directory.
pub fn rewrite_manifest(
    manifest: &mut SubgraphManifest,
    base_dir: &Path,
    network: Option<&str>,
    contracts: &BTreeMap<String, ContractLocation>,
) {
    absolutize_link(&mut manifest.schema, base_dir);

    manifest.data_sources.retain_mut(|ds| {
        if let Some(network) = network {
            ds.network = Some(network.to_string());
        }
        if let Some(file) = ds.mapping.extra.get_mut("file") {
            absolutize_link(file, base_dir);
        }
        for abi in &mut ds.mapping.abis {
            absolutize_link(&mut abi.file, base_dir);
        }

        let location =
            contracts.get(&ds.source.abi).or_else(|| contracts.get(&ds.name)).copied();
        match location {
            Some(location) => {
                ds.source.address = Some(location.address.to_string());
                ds.source.start_block = Some(location.start_block);
                true
            }
            None if ds.source.address.is_some() => {
                // Static address baked into the template, leave it alone.
                true
            }
            None => {
                warn!(
                    "data source {:?} has no deployed contract and no static address, dropping it",
                    ds.name
                );
                false
            }
        }
    });
}

/// Resolves a relative `file` link (a bare string or a `{ file: ... }`
/// mapping) against `base`.
fn absolutize_link(link: &mut serde_yaml::Value, base: &Path) {
    match link {
        serde_yaml::Value::String(file) => {
            let path = Path::new(file.as_str());
            if path.is_relative() {
                *file = base.join(path).to_string_lossy().into_owned();
            }
        }
        serde_yaml::Value::Mapping(map) => {
            if let Some(inner) = map.get_mut("file") {
                absolutize_link(inner, base);
            }
        }
        _ => {}
    }
}

//! Contract deployment from compiled project artifacts.
//!
//! Artifacts are located on disk rather than compiled here: a forge
//! project keeps them under `out/<Name>.sol/<Name>.json` with the
//! creation bytecode at `bytecode.object`, a hardhat project nests
//! `<Name>.json` somewhere under `artifacts/` with `bytecode` as a bare
//! hex string. Both layouts carry the ABI under `abi`.

use std::path::{Path, PathBuf};

use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::JsonAbi;
use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes};
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::TransactionRequest;
use serde_json::Value;
use testkit_common::{HarnessError, Result, RetryPolicy};
use tracing::{debug, info};

use crate::{invoke::ContractHandle, waiter::wait_for_receipt};

/// What to deploy and how to initialize it.
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    /// Contract name, matched against artifact file names.
    pub name: String,
    /// ABI override; when absent the artifact's ABI is used.
    pub abi: Option<JsonAbi>,
    /// Arguments for the contract's `initialize(...)` function. An empty
    /// vector skips initialization.
    pub args: Vec<DynSolValue>,
}

impl DeployRequest {
    /// Deploy `name` with no initializer arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), abi: None, args: Vec::new() }
    }

    /// Use this ABI instead of the one found in the artifact.
    pub fn with_abi(mut self, abi: JsonAbi) -> Self {
        self.abi = Some(abi);
        self
    }

    /// Call `initialize(...)` with these arguments after deployment.
    pub fn with_args(mut self, args: Vec<DynSolValue>) -> Self {
        self.args = args;
        self
    }
}

/// A contract deployed through the harness.
#[derive(Debug, Clone)]
pub struct DeployedContract {
    /// Where the contract lives on chain.
    pub address: Address,
    /// The account that sent the deployment transaction.
    pub owner: Address,
    /// Call handle built from the contract's ABI.
    pub handle: ContractHandle,
}

/// ABI and creation bytecode pulled out of a compiled artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Contract ABI.
    pub abi: JsonAbi,
    /// Creation bytecode.
    pub bytecode: Bytes,
}

/// Loads the artifact for `name` from a compiled project at `root`.
///
/// Checks the forge layout first, then walks the hardhat `artifacts/`
/// tree. Debug artifacts (`*.dbg.json`) are skipped.
pub fn load_artifact(root: &Path, name: &str) -> Result<Artifact> {
    let forge_path = root.join("out").join(format!("{name}.sol")).join(format!("{name}.json"));
    if forge_path.is_file() {
        debug!("loading forge artifact {}", forge_path.display());
        return parse_artifact(&forge_path, name);
    }

    let hardhat_root = root.join("artifacts");
    if let Some(found) = find_artifact_file(&hardhat_root, &format!("{name}.json"))? {
        debug!("loading hardhat artifact {}", found.display());
        return parse_artifact(&found, name);
    }

    Err(HarnessError::ArtifactNotFound { contract: name.to_string(), searched: root.to_path_buf() })
}

fn find_artifact_file(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().is_some_and(|n| n == file_name)
                && !path.to_string_lossy().ends_with(".dbg.json")
            {
                return Ok(Some(path));
            }
        }
    }
    Ok(None)
}

fn parse_artifact(path: &Path, name: &str) -> Result<Artifact> {
    let raw: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let abi = raw
        .get("abi")
        .cloned()
        .ok_or_else(|| missing_field(name, path, "abi"))
        .and_then(|abi| serde_json::from_value::<JsonAbi>(abi).map_err(Into::into))?;

    // Forge nests the hex under bytecode.object, hardhat keeps it flat.
    let hex = raw
        .get("bytecode")
        .and_then(|b| match b {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("object").and_then(Value::as_str),
            _ => None,
        })
        .ok_or_else(|| missing_field(name, path, "bytecode"))?;
    let bytecode: Bytes = hex.parse().map_err(|_| missing_field(name, path, "bytecode"))?;

    Ok(Artifact { abi, bytecode })
}

fn missing_field(name: &str, path: &Path, field: &str) -> HarnessError {
    HarnessError::ArtifactNotFound {
        contract: format!("{name} ({field} missing)"),
        searched: path.to_path_buf(),
    }
}

/// Deploys a contract and runs its initializer when arguments are given.
pub async fn deploy_contract(
    provider: &DynProvider,
    owner: Address,
    project_root: &Path,
    request: &DeployRequest,
    receipt_policy: &RetryPolicy,
) -> Result<DeployedContract> {
    let artifact = load_artifact(project_root, &request.name)?;
    let abi = request.abi.clone().unwrap_or(artifact.abi);

    let tx = TransactionRequest::default()
        .with_from(owner)
        .with_deploy_code(artifact.bytecode);
    let pending = provider.send_transaction(tx).await?;
    let tx_hash = *pending.tx_hash();
    let receipt = wait_for_receipt(provider, tx_hash, receipt_policy).await?;
    if !receipt.status() {
        return Err(HarnessError::DeploymentFailed { contract: request.name.clone(), tx_hash });
    }
    let address = receipt
        .contract_address
        .ok_or_else(|| HarnessError::DeploymentFailed { contract: request.name.clone(), tx_hash })?;
    info!("deployed {} at {address}", request.name);

    let handle = ContractHandle::new(address, abi);
    if request.args.is_empty() {
        debug!("{} has no initializer arguments, skipping initialization", request.name);
    } else if let Some(initializer) =
        handle.initializer(request.args.len()).map(|f| f.name.clone())
    {
        invoke_initializer(provider, owner, &handle, &initializer, &request.args, receipt_policy)
            .await?;
    } else {
        debug!("{} exposes no initializer, skipping initialization", request.name);
    }

    Ok(DeployedContract { address, owner, handle })
}

async fn invoke_initializer(
    provider: &DynProvider,
    owner: Address,
    handle: &ContractHandle,
    method: &str,
    args: &[DynSolValue],
    receipt_policy: &RetryPolicy,
) -> Result<()> {
    let function = handle.resolve(method, args.len())?;
    let input = function.abi_encode_input(args)?;
    let tx = TransactionRequest::default()
        .with_from(owner)
        .with_to(handle.address())
        .with_input(input);
    let pending = provider.send_transaction(tx).await?;
    let tx_hash = *pending.tx_hash();
    let receipt = wait_for_receipt(provider, tx_hash, receipt_policy).await?;
    if !receipt.status() {
        return Err(HarnessError::TransactionFailed { tx_hash });
    }
    debug!("initialized {} via {method}", handle.address());
    Ok(())
}

//! Typed contract call routing.
//!
//! A [`ContractHandle`] resolves its method table once, when it is built
//! from the ABI; invoking a method is then a lookup plus either a single
//! `eth_call` round-trip (view/pure) or a node-signed transaction followed
//! by receipt polling. No per-call ABI reflection.

use std::collections::BTreeMap;

use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi, StateMutability};
use alloy_network::TransactionBuilder;
use alloy_primitives::Address;
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::TransactionRequest;
use testkit_common::{HarnessError, Result, RetryPolicy};
use tracing::debug;

use crate::waiter::wait_for_receipt;

/// A deployed contract with its method table.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    address: Address,
    abi: JsonAbi,
    methods: BTreeMap<String, Vec<Function>>,
}

impl ContractHandle {
    /// Builds the handle, indexing every ABI function by name.
    pub fn new(address: Address, abi: JsonAbi) -> Self {
        let mut methods: BTreeMap<String, Vec<Function>> = BTreeMap::new();
        for function in abi.functions() {
            methods.entry(function.name.clone()).or_default().push(function.clone());
        }
        Self { address, abi, methods }
    }

    /// Contract address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The full ABI the handle was built from.
    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    /// Resolves `method` for a call with `arg_count` arguments.
    ///
    /// Overloads are disambiguated by parameter count; a sole candidate is
    /// accepted regardless so that an argument mismatch surfaces as an ABI
    /// encoding error instead of a lookup failure.
    pub fn resolve(&self, method: &str, arg_count: usize) -> Result<&Function> {
        let candidates = self
            .methods
            .get(method)
            .ok_or_else(|| HarnessError::MethodNotFound { method: method.to_string() })?;
        let matching: Vec<&Function> =
            candidates.iter().filter(|f| f.inputs.len() == arg_count).collect();
        match matching.as_slice() {
            [single] => Ok(*single),
            [] if candidates.len() == 1 => Ok(&candidates[0]),
            _ => Err(HarnessError::AmbiguousMethod { method: method.to_string(), arg_count }),
        }
    }

    /// The post-deployment initializer for `arg_count` arguments, if any.
    ///
    /// Upgradeable-contract projects expose a function whose signature
    /// starts with `initialize(` instead of doing work in the constructor.
    /// Overloads preferring a matching parameter count win.
    pub fn initializer(&self, arg_count: usize) -> Option<&Function> {
        let candidates: Vec<&Function> = self
            .abi
            .functions()
            .filter(|f| f.signature().starts_with("initialize("))
            .collect();
        candidates
            .iter()
            .find(|f| f.inputs.len() == arg_count)
            .copied()
            .or_else(|| candidates.first().copied())
    }

    /// Whether a function can be served by a read-only call.
    pub fn is_view(function: &Function) -> bool {
        matches!(function.state_mutability, StateMutability::View | StateMutability::Pure)
    }
}

/// Invokes `method` on `contract` as `wallet`.
///
/// View and pure methods resolve immediately with their decoded return
/// values. State-changing methods submit a node-signed transaction and
/// resolve with an empty value vector once the receipt shows success, or
/// fail with [`HarnessError::TransactionFailed`] when it shows failure.
pub async fn invoke_contract(
    provider: &DynProvider,
    wallet: Address,
    contract: &ContractHandle,
    method: &str,
    params: &[DynSolValue],
    receipt_policy: &RetryPolicy,
) -> Result<Vec<DynSolValue>> {
    let function = contract.resolve(method, params.len())?;
    let input = function.abi_encode_input(params)?;
    let tx = TransactionRequest::default()
        .with_from(wallet)
        .with_to(contract.address())
        .with_input(input);

    if ContractHandle::is_view(function) {
        debug!("calling {}.{method} as {wallet}", contract.address());
        let output = provider.call(tx).await?;
        return Ok(function.abi_decode_output(&output)?);
    }

    debug!("sending {}.{method} as {wallet}", contract.address());
    let pending = provider.send_transaction(tx).await?;
    let tx_hash = *pending.tx_hash();
    let receipt = wait_for_receipt(provider, tx_hash, receipt_policy).await?;
    if !receipt.status() {
        return Err(HarnessError::TransactionFailed { tx_hash });
    }
    Ok(Vec::new())
}

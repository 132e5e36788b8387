//! Transaction receipt polling.

use alloy_primitives::TxHash;
use alloy_provider::{DynProvider, Provider};
use alloy_rpc_types::TransactionReceipt;
use testkit_common::{HarnessError, Result, RetryPolicy};
use tokio::time::sleep;
use tracing::trace;

/// Polls for the receipt of `tx_hash` until it is mined or the policy is
/// exhausted.
///
/// A receipt without a block hash counts as pending: we only resolve on a
/// definitive status, never on an absent or half-populated receipt.
pub async fn wait_for_receipt(
    provider: &DynProvider,
    tx_hash: TxHash,
    policy: &RetryPolicy,
) -> Result<TransactionReceipt> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match provider.get_transaction_receipt(tx_hash).await? {
            Some(receipt) if receipt.block_hash.is_some() => {
                trace!("receipt for {tx_hash} after {attempts} attempt(s)");
                return Ok(receipt);
            }
            other => {
                trace!(
                    "transaction {tx_hash} not mined yet (attempt {attempts}, pending = {})",
                    other.is_some()
                );
            }
        }
        if attempts >= policy.max_attempts {
            return Err(HarnessError::ReceiptTimeout { tx_hash, attempts });
        }
        sleep(policy.backoff_for(attempts - 1)).await;
    }
}

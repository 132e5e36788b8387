//! Deterministic wallet derivation.
//!
//! Wallets are derived from a BIP-39 mnemonic and a BIP-44 derivation path
//! plus account index. The same inputs always yield the same key pair,
//! which is what makes test fixtures reproducible across runs.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use alloy_signer_local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};

use crate::error::Result;

/// The mnemonic hardhat and anvil use for their default accounts.
pub const DEFAULT_MNEMONIC: &str =
    "test test test test test test test test test test test junk";

/// The standard Ethereum account derivation path prefix.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0";

/// A derived account: address plus the raw private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletAccount {
    /// Account address.
    pub address: Address,
    /// 32-byte secp256k1 private key.
    pub private_key: B256,
}

impl WalletAccount {
    /// Local signer for this account.
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        Ok(PrivateKeySigner::from_bytes(&self.private_key)
            .map_err(alloy_signer_local::LocalSignerError::from)?)
    }
}

/// Derives the account at `index` under `path` from `mnemonic`.
pub fn derive_wallet(mnemonic: &str, path: &str, index: u32) -> Result<WalletAccount> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .derivation_path(format!("{path}/{index}"))?
        .build()?;
    Ok(WalletAccount { address: signer.address(), private_key: signer.to_bytes() })
}

/// Derives `count` consecutive accounts, keyed by address.
///
/// The map is ordered so two identical invocations produce identical
/// iteration order as well as identical contents.
pub fn derive_wallets(
    mnemonic: &str,
    path: &str,
    count: u32,
) -> Result<BTreeMap<Address, WalletAccount>> {
    let mut wallets = BTreeMap::new();
    for index in 0..count {
        let account = derive_wallet(mnemonic, path, index)?;
        wallets.insert(account.address, account);
    }
    Ok(wallets)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Account 0 of the standard test mnemonic, as printed by anvil.
    const ACCOUNT_0: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const ACCOUNT_0_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_wallet(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 3).unwrap();
        let b = derive_wallet(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derives_the_well_known_first_account() {
        let account = derive_wallet(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 0).unwrap();
        assert_eq!(account.address, ACCOUNT_0.parse::<Address>().unwrap());
        assert_eq!(account.private_key, ACCOUNT_0_KEY.parse::<B256>().unwrap());
    }

    #[test]
    fn indexes_yield_distinct_accounts() {
        let a = derive_wallet(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 0).unwrap();
        let b = derive_wallet(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 1).unwrap();
        assert_ne!(a.address, b.address);
        assert_ne!(a.private_key, b.private_key);
    }

    #[test]
    fn wallet_maps_are_reproducible() {
        let a = derive_wallets(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 5).unwrap();
        let b = derive_wallets(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 5).unwrap();
        assert_eq!(a.len(), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn signer_round_trips_the_key() {
        let account = derive_wallet(DEFAULT_MNEMONIC, DEFAULT_DERIVATION_PATH, 1).unwrap();
        let signer = account.signer().unwrap();
        assert_eq!(signer.address(), account.address);
    }
}

//! Shared test helpers: well-known mnemonics and a scriptable ledger oracle.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use hdvault_core::address::Address;
use hdvault_core::error::OracleError;
use hdvault_core::path::DerivationPath;
use hdvault_core::traits::{BlockRef, KeyDerivation, LedgerOracle};
use hdvault_wallet::HdKeyChain;

/// Development mnemonic used by Hardhat, Anvil, and Ganache.
pub const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Addresses of [`DEV_MNEMONIC`] at `m/44'/60'/0'/0/{0,1,2}`.
pub const DEV_ADDRESSES: [&str; 3] = [
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
    "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
    "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC",
];

/// BIP-39 reference mnemonic, used with the passphrase [`TREZOR_PASSPHRASE`].
pub const TREZOR_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const TREZOR_PASSPHRASE: &str = "TREZOR";
pub const TREZOR_SEED_HEX: &str = "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04";

/// Address at position `i` of the branch starting at `base`.
pub fn branch_address(keys: &HdKeyChain, base: &DerivationPath, i: usize) -> Address {
    let path = base.branch().nth(i).expect("branch long enough");
    keys.derive_address(&path).expect("derivable path")
}

/// Which oracle method a query went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Balance,
    TransactionCount,
}

/// In-memory ledger. Addresses it does not know have zero balance and nonce.
///
/// Every query is recorded so tests can assert on scan order and on which
/// addresses were never touched.
#[derive(Default)]
pub struct MockOracle {
    balances: HashMap<Address, u128>,
    nonces: HashMap<Address, u64>,
    fail_on: Option<Address>,
    log: Mutex<Vec<(Address, Query, BlockRef)>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, address: Address, wei: u128) -> Self {
        self.balances.insert(address, wei);
        self
    }

    pub fn with_nonce(mut self, address: Address, nonce: u64) -> Self {
        self.nonces.insert(address, nonce);
        self
    }

    /// Every query about `address` fails with a transport error.
    pub fn failing_on(mut self, address: Address) -> Self {
        self.fail_on = Some(address);
        self
    }

    /// All recorded queries in call order.
    pub fn queries(&self) -> Vec<(Address, Query, BlockRef)> {
        self.log.lock().clone()
    }

    /// Distinct addresses queried, in first-seen order.
    pub fn queried_addresses(&self) -> Vec<Address> {
        let mut seen = Vec::new();
        for (address, _, _) in self.log.lock().iter() {
            if !seen.contains(address) {
                seen.push(*address);
            }
        }
        seen
    }

    fn record(&self, address: &Address, query: Query, block: BlockRef) -> Result<(), OracleError> {
        self.log.lock().push((*address, query, block));
        if self.fail_on == Some(*address) {
            return Err(OracleError::Transport("mock failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerOracle for MockOracle {
    async fn balance_at(&self, address: &Address, block: BlockRef) -> Result<u128, OracleError> {
        self.record(address, Query::Balance, block)?;
        Ok(self.balances.get(address).copied().unwrap_or(0))
    }

    async fn transaction_count_at(
        &self,
        address: &Address,
        block: BlockRef,
    ) -> Result<u64, OracleError> {
        self.record(address, Query::TransactionCount, block)?;
        Ok(self.nonces.get(address).copied().unwrap_or(0))
    }
}

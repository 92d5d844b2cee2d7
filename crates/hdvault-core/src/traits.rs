//! Trait interfaces between the wallet and the outside world.
//!
//! - [`KeyDerivation`]: deterministic path-to-key mapping (the wallet's key chain implements)
//! - [`LedgerOracle`]: read-only account state from a ledger (the CLI's JSON-RPC client implements)

use async_trait::async_trait;
use k256::ecdsa::{SigningKey, VerifyingKey};
use std::fmt;

use crate::address::Address;
use crate::error::OracleError;
use crate::path::DerivationPath;

/// Deterministic derivation of secp256k1 keys from a seed.
///
/// The same seed and path always yield the same key. Implementations hold
/// the master secret and must be shareable across threads.
pub trait KeyDerivation: Send + Sync {
    type Error;

    /// Derive the private key at `path`.
    fn derive_private_key(&self, path: &DerivationPath) -> Result<SigningKey, Self::Error>;

    /// Derive the public key at `path`.
    ///
    /// Default implementation derives the private key and drops it.
    fn derive_public_key(&self, path: &DerivationPath) -> Result<VerifyingKey, Self::Error> {
        Ok(*self.derive_private_key(path)?.verifying_key())
    }

    /// Derive the account address at `path`.
    fn derive_address(&self, path: &DerivationPath) -> Result<Address, Self::Error> {
        Ok(Address::from_public_key(&self.derive_public_key(path)?))
    }
}

/// Block at which account state is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockRef {
    #[default]
    Latest,
    Pending,
    Number(u64),
}

impl BlockRef {
    /// JSON-RPC block tag: `latest`, `pending`, or a `0x` hex quantity.
    pub fn to_rpc_param(&self) -> String {
        match self {
            BlockRef::Latest => "latest".to_string(),
            BlockRef::Pending => "pending".to_string(),
            BlockRef::Number(n) => format!("0x{n:x}"),
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rpc_param())
    }
}

/// Read-only view of account state on a ledger.
///
/// Discovery only reads; nothing here submits transactions. Retries and
/// timeouts are the implementation's business.
#[async_trait]
pub trait LedgerOracle: Send + Sync {
    /// Balance of `address` in wei at `block`.
    async fn balance_at(&self, address: &Address, block: BlockRef) -> Result<u128, OracleError>;

    /// Number of transactions sent from `address` as of `block`.
    async fn transaction_count_at(
        &self,
        address: &Address,
        block: BlockRef,
    ) -> Result<u64, OracleError>;
}

//! Seed management and BIP-32 key derivation.
//!
//! [`HdKeyChain`] holds a seed and the master extended key computed from it
//! once. Every derivation walks the path from the master key one child step
//! at a time, so a failure at any step fails the whole call and no partial
//! key ever escapes.

use bip32::{ChildNumber, XPrv};
use k256::ecdsa::SigningKey;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use hdvault_core::constants::{BIP39_SEED_LEN, MAX_SEED_LEN, MIN_SEED_LEN};
use hdvault_core::path::DerivationPath;
use hdvault_core::traits::KeyDerivation;

use crate::error::WalletError;

/// BIP-32 seed bytes, 16 to 64 bytes long.
///
/// Secret material is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: Vec<u8>,
}

impl Seed {
    /// Generate a random 64-byte seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = vec![0u8; BIP39_SEED_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a seed from raw bytes. Empty and out-of-range lengths are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.is_empty() {
            return Err(WalletError::InvalidInput("empty seed".into()));
        }
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&bytes.len()) {
            return Err(WalletError::InvalidInput(format!(
                "seed must be {MIN_SEED_LEN}..={MAX_SEED_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Parse a hex-encoded seed, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        let s = s.trim();
        let mut bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| WalletError::InvalidInput(format!("seed hex: {e}")))?;
        let seed = Self::from_bytes(&bytes);
        bytes.zeroize();
        seed
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Deterministic key tree rooted at one seed.
#[derive(Clone)]
pub struct HdKeyChain {
    seed: Seed,
    master: XPrv,
}

impl HdKeyChain {
    /// Compute the master key for `seed`.
    pub fn new(seed: Seed) -> Result<Self, WalletError> {
        let master =
            XPrv::new(seed.as_bytes()).map_err(|e| WalletError::Derivation(e.to_string()))?;
        Ok(Self { seed, master })
    }

    /// Build a key chain from raw seed bytes.
    pub fn from_seed_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        Self::new(Seed::from_bytes(bytes)?)
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }
}

impl KeyDerivation for HdKeyChain {
    type Error = WalletError;

    fn derive_private_key(&self, path: &DerivationPath) -> Result<SigningKey, WalletError> {
        let mut key = self.master.clone();
        for &index in path.indices() {
            key = key
                .derive_child(ChildNumber(index))
                .map_err(|e| WalletError::Derivation(format!("{path} at index {index}: {e}")))?;
        }
        Ok(key.private_key().clone())
    }
}

impl fmt::Debug for HdKeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdKeyChain")
            .field("seed", &self.seed)
            .field("master", &"[REDACTED]")
            .finish()
    }
}

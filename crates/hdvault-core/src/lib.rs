//! # hdvault-core
//! Foundation types and traits for the hdvault wallet.
//!
//! - [`path`]: BIP-32/BIP-44 derivation paths and branch iteration
//! - [`address`]: EIP-55 Ethereum addresses
//! - [`crypto`]: Keccak-256 and recoverable secp256k1 signatures
//! - [`transaction`]: legacy EIP-155 transactions over a minimal [`rlp`] encoder
//! - [`traits`]: the key-derivation and ledger-oracle seams

pub mod address;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod path;
pub mod rlp;
pub mod traits;
pub mod transaction;
pub mod types;
pub mod units;

pub use address::Address;
pub use path::DerivationPath;
pub use types::Hash256;

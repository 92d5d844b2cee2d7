//! # hdvault-wallet: hierarchical-deterministic Ethereum wallet.
//!
//! Derives keys from one BIP-39/BIP-32 seed, tracks the accounts the user
//! actually uses, discovers active accounts against a ledger with the
//! BIP-44 gap limit, signs digests and transactions, and persists the whole
//! state in an optionally encrypted envelope.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`keys`]: Seed and the BIP-32 key chain
//! - [`mnemonic`]: BIP-39 generation, seed derivation, word suggestions
//! - [`tracker`]: pinned-account registry
//! - [`discovery`]: gap-limit account discovery
//! - [`signer`]: digest, message, and transaction signing
//! - [`encryption`]: AES-256-CFB payload encryption
//! - [`store`]: on-disk envelope format
//! - [`wallet`]: high-level wallet composition

pub mod discovery;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod signer;
pub mod store;
pub mod tracker;
pub mod wallet;

// Re-exports for convenient access
pub use discovery::{DiscoveryReport, SelfDiscovery};
pub use error::WalletError;
pub use keys::{HdKeyChain, Seed};
pub use signer::Signer;
pub use tracker::{Account, AccountTracker, SharedKeys};
pub use wallet::Wallet;

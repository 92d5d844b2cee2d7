//! Error types for hdvault core types.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty derivation path")] Empty,
    #[error("ambiguous path: use 'm/' prefix for absolute paths, or no leading '/' for relative ones")] Ambiguous,
    #[error("invalid component: {0:?}")] InvalidComponent(String),
    #[error("component {value} out of allowed range [0, {max}]")] OutOfRange { value: String, max: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("missing 0x prefix")] MissingPrefix,
    #[error("invalid length: {0} hex characters")] InvalidLength(usize),
    #[error("invalid hex character")] InvalidHex,
    #[error("invalid EIP-55 checksum")] InvalidChecksum,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key bytes")] InvalidPrivateKey,
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("invalid recovery id: {0}")] InvalidRecoveryId(u64),
    #[error("digest must be {expected} bytes, got {got}")] InvalidDigestLength { expected: usize, got: usize },
    #[error("signing failed: {0}")] SigningFailed(String),
    #[error("public key recovery failed")] RecoveryFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction is not signed")] Unsigned,
    #[error("invalid v value {v} for chain id {chain_id}")] InvalidV { v: u64, chain_id: u64 },
    #[error("chain id {0} overflows the EIP-155 v value")] ChainIdOverflow(u64),
    #[error(transparent)] Crypto(#[from] CryptoError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("invalid amount: {0:?}")] InvalidAmount(String),
    #[error("more than {max} decimal places")] TooManyDecimals { max: usize },
    #[error("amount overflows u128 wei")] Overflow,
}

/// Failure reported by a ledger oracle. Retry policy belongs to the oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("transport: {0}")] Transport(String),
    #[error("invalid response: {0}")] InvalidResponse(String),
    #[error("timeout")] Timeout,
}

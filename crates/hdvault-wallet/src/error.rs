//! Wallet error types.

use hdvault_core::address::Address;
use hdvault_core::error::{AddressError, CryptoError, OracleError, PathError, TransactionError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Malformed caller input: empty seed, bad seed length, bad hex.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or empty BIP-39 mnemonic phrase.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// The account is not pinned in this wallet.
    #[error("unknown account: {0}")]
    UnknownAccount(Address),

    /// BIP-32 child key derivation failed.
    #[error("key derivation: {0}")]
    Derivation(String),

    /// The signature recovered to an address other than the requested one.
    #[error("signer mismatch: expected {expected}, recovered {got}")]
    SignerMismatch {
        /// Account the caller asked to sign with.
        expected: Address,
        /// Address recovered from the signed transaction.
        got: Address,
    },

    /// Ledger oracle query failed during discovery or a balance lookup.
    #[error("ledger oracle: {0}")]
    Oracle(#[from] OracleError),

    /// Wrong password for this wallet session.
    #[error("invalid password")]
    InvalidPassword,

    /// Wallet file is malformed, or decrypted to something that is not a wallet.
    #[error("decode: {0}")]
    Decode(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Unparseable derivation path.
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_account() {
        let addr: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        let e = WalletError::UnknownAccount(addr);
        assert_eq!(
            e.to_string(),
            "unknown account: 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn display_signer_mismatch() {
        let e = WalletError::SignerMismatch {
            expected: Address::from_bytes([0x11; 20]),
            got: Address::ZERO,
        };
        let msg = e.to_string();
        assert!(msg.starts_with("signer mismatch: expected 0x1111"));
        assert!(msg.ends_with("0x0000000000000000000000000000000000000000"));
    }

    #[test]
    fn display_invalid_password() {
        assert_eq!(WalletError::InvalidPassword.to_string(), "invalid password");
    }

    #[test]
    fn clone_and_eq() {
        let e1 = WalletError::Decode("bad base64".into());
        let e2 = e1.clone();
        assert_eq!(e1, e2);
    }

    #[test]
    fn malformed_paths_surface_as_path_errors() {
        use hdvault_core::path::DerivationPath;

        let cases = [
            ("m", PathError::Empty),
            ("/0/1", PathError::Ambiguous),
        ];
        for (text, expected) in cases {
            let err: WalletError = text.parse::<DerivationPath>().unwrap_err().into();
            assert_eq!(err, WalletError::Path(expected));
        }
        let err: WalletError = "m/44'/x".parse::<DerivationPath>().unwrap_err().into();
        assert!(matches!(err, WalletError::Path(PathError::InvalidComponent(_))));
        let err: WalletError = "m/4294967296".parse::<DerivationPath>().unwrap_err().into();
        assert!(matches!(err, WalletError::Path(PathError::OutOfRange { .. })));
    }

    #[test]
    fn from_core_errors() {
        let wallet: WalletError = CryptoError::InvalidPublicKey.into();
        assert_eq!(wallet, WalletError::Crypto(CryptoError::InvalidPublicKey));

        let wallet: WalletError = PathError::Empty.into();
        assert_eq!(wallet.to_string(), "empty derivation path");

        let wallet: WalletError = OracleError::Timeout.into();
        assert_eq!(wallet.to_string(), "ledger oracle: timeout");
    }
}

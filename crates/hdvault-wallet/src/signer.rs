//! Signing with pinned accounts.
//!
//! Every operation resolves the account through the tracker first, so an
//! address that is not pinned fails with [`WalletError::UnknownAccount`]
//! before any key is derived.
//!
//! The `*_with_passphrase` variants accept a passphrase and ignore it. They
//! sign exactly like their plain counterparts and perform no additional
//! authentication.

use k256::ecdsa::SigningKey;
use std::sync::Arc;
use tracing::{debug, warn};

use hdvault_core::address::Address;
use hdvault_core::crypto::{self, Signature};
use hdvault_core::transaction::{LegacyTransaction, SignedTransaction};

use crate::error::WalletError;
use crate::tracker::AccountTracker;

/// Signs digests, messages, and transactions with tracked accounts.
#[derive(Debug, Clone)]
pub struct Signer {
    tracker: Arc<AccountTracker>,
}

impl Signer {
    pub fn new(tracker: Arc<AccountTracker>) -> Self {
        Self { tracker }
    }

    fn key_for(&self, account: &Address) -> Result<SigningKey, WalletError> {
        let path = self
            .tracker
            .path_of(account)
            .ok_or(WalletError::UnknownAccount(*account))?;
        self.tracker.keys().derive_private_key(&path)
    }

    /// Sign a caller-hashed 32-byte digest. The digest is signed as given.
    pub fn sign_hash(&self, account: &Address, digest: &[u8]) -> Result<Signature, WalletError> {
        let key = self.key_for(account)?;
        let sig = crypto::sign_hash(&key, digest)?;
        debug!(%account, "signed digest");
        Ok(sig)
    }

    /// Same as [`sign_hash`](Self::sign_hash); the passphrase is unused.
    pub fn sign_hash_with_passphrase(
        &self,
        account: &Address,
        _passphrase: &str,
        digest: &[u8],
    ) -> Result<Signature, WalletError> {
        self.sign_hash(account, digest)
    }

    /// Sign `keccak256(data)`.
    pub fn sign_data(&self, account: &Address, data: &[u8]) -> Result<Signature, WalletError> {
        self.sign_hash(account, crypto::keccak256(data).as_bytes())
    }

    /// Same as [`sign_data`](Self::sign_data); the passphrase is unused.
    pub fn sign_data_with_passphrase(
        &self,
        account: &Address,
        _passphrase: &str,
        data: &[u8],
    ) -> Result<Signature, WalletError> {
        self.sign_data(account, data)
    }

    /// Sign an EIP-191 personal message.
    pub fn sign_text(&self, account: &Address, text: &[u8]) -> Result<Signature, WalletError> {
        self.sign_hash(account, crypto::text_hash(text).as_bytes())
    }

    /// Same as [`sign_text`](Self::sign_text); the passphrase is unused.
    pub fn sign_text_with_passphrase(
        &self,
        account: &Address,
        _passphrase: &str,
        text: &[u8],
    ) -> Result<Signature, WalletError> {
        self.sign_text(account, text)
    }

    /// Sign a legacy transaction under EIP-155 for `chain_id`.
    ///
    /// The sender is recovered from the signed result and must equal
    /// `account`; otherwise nothing is returned.
    pub fn sign_transaction(
        &self,
        account: &Address,
        tx: &LegacyTransaction,
        chain_id: u64,
    ) -> Result<SignedTransaction, WalletError> {
        let key = self.key_for(account)?;
        let signed = tx.sign(&key, chain_id)?;

        let sender = signed.sender(chain_id)?;
        if sender != *account {
            warn!(expected = %account, recovered = %sender, "signer mismatch");
            return Err(WalletError::SignerMismatch {
                expected: *account,
                got: sender,
            });
        }
        debug!(%account, chain_id, nonce = tx.nonce, "signed transaction");
        Ok(signed)
    }

    /// Same as [`sign_transaction`](Self::sign_transaction); the passphrase is unused.
    pub fn sign_transaction_with_passphrase(
        &self,
        account: &Address,
        _passphrase: &str,
        tx: &LegacyTransaction,
        chain_id: u64,
    ) -> Result<SignedTransaction, WalletError> {
        self.sign_transaction(account, tx, chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::HdKeyChain;
    use hdvault_core::error::CryptoError;
    use hdvault_core::path::DerivationPath;
    use hdvault_core::traits::KeyDerivation;

    fn setup() -> (Signer, Address) {
        let keys = HdKeyChain::from_seed_bytes(&[8u8; 32]).unwrap();
        let tracker = Arc::new(AccountTracker::new(Arc::new(keys)));
        let account = tracker.pin(&DerivationPath::default_base()).unwrap();
        (Signer::new(tracker), account.address)
    }

    fn transfer() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 0,
            gas_price: 1_000_000_000,
            gas_limit: 21_000,
            to: Some(Address::from_bytes([0x42; 20])),
            value: 5,
            data: Vec::new(),
        }
    }

    #[test]
    fn sign_hash_recovers_account() {
        let (signer, account) = setup();
        let digest = crypto::keccak256(b"payload");
        let sig = signer.sign_hash(&account, digest.as_bytes()).unwrap();
        assert_eq!(crypto::recover_address(digest.as_bytes(), &sig).unwrap(), account);
    }

    #[test]
    fn sign_hash_does_not_rehash() {
        let (signer, account) = setup();
        let digest = [0x11u8; 32];
        let sig = signer.sign_hash(&account, &digest).unwrap();
        assert_eq!(crypto::recover_address(&digest, &sig).unwrap(), account);
    }

    #[test]
    fn sign_hash_rejects_bad_digest() {
        let (signer, account) = setup();
        let err = signer.sign_hash(&account, b"not a digest").unwrap_err();
        assert_eq!(
            err,
            WalletError::Crypto(CryptoError::InvalidDigestLength {
                expected: 32,
                got: 12
            })
        );
    }

    #[test]
    fn unknown_account_rejected() {
        let (signer, _) = setup();
        let stranger = Address::from_bytes([3u8; 20]);
        assert_eq!(
            signer.sign_hash(&stranger, &[0u8; 32]),
            Err(WalletError::UnknownAccount(stranger))
        );
        assert_eq!(
            signer.sign_text(&stranger, b"hi"),
            Err(WalletError::UnknownAccount(stranger))
        );
        assert!(matches!(
            signer.sign_transaction(&stranger, &transfer(), 1),
            Err(WalletError::UnknownAccount(_))
        ));
    }

    #[test]
    fn data_and_text_hash_first() {
        let (signer, account) = setup();
        let sig = signer.sign_data(&account, b"blob").unwrap();
        let digest = crypto::keccak256(b"blob");
        assert_eq!(crypto::recover_address(digest.as_bytes(), &sig).unwrap(), account);

        let sig = signer.sign_text(&account, b"hello").unwrap();
        let digest = crypto::text_hash(b"hello");
        assert_eq!(crypto::recover_address(digest.as_bytes(), &sig).unwrap(), account);
    }

    #[test]
    fn passphrase_variants_pass_through() {
        let (signer, account) = setup();
        let digest = [0x22u8; 32];
        assert_eq!(
            signer.sign_hash_with_passphrase(&account, "anything", &digest).unwrap(),
            signer.sign_hash(&account, &digest).unwrap()
        );
        assert_eq!(
            signer.sign_data_with_passphrase(&account, "", b"x").unwrap(),
            signer.sign_data(&account, b"x").unwrap()
        );
        assert_eq!(
            signer.sign_text_with_passphrase(&account, "pw", b"x").unwrap(),
            signer.sign_text(&account, b"x").unwrap()
        );
        assert_eq!(
            signer
                .sign_transaction_with_passphrase(&account, "pw", &transfer(), 5)
                .unwrap(),
            signer.sign_transaction(&account, &transfer(), 5).unwrap()
        );
    }

    #[test]
    fn sign_transaction_sender_is_account() {
        let (signer, account) = setup();
        let signed = signer.sign_transaction(&account, &transfer(), 1).unwrap();
        assert_eq!(signed.sender(1).unwrap(), account);
        assert_eq!(signed.chain_id(), Some(1));
    }

    /// Key chain whose advertised addresses do not match its keys.
    struct LyingKeys(HdKeyChain);

    impl KeyDerivation for LyingKeys {
        type Error = WalletError;

        fn derive_private_key(&self, path: &DerivationPath) -> Result<SigningKey, WalletError> {
            self.0.derive_private_key(path)
        }

        fn derive_address(&self, _path: &DerivationPath) -> Result<Address, WalletError> {
            Ok(Address::from_bytes([0xee; 20]))
        }
    }

    #[test]
    fn mismatched_signer_is_refused() {
        let keys = LyingKeys(HdKeyChain::from_seed_bytes(&[8u8; 32]).unwrap());
        let tracker = Arc::new(AccountTracker::new(Arc::new(keys)));
        let claimed = tracker.pin(&DerivationPath::default_base()).unwrap().address;
        let signer = Signer::new(tracker);

        let err = signer.sign_transaction(&claimed, &transfer(), 1).unwrap_err();
        match err {
            WalletError::SignerMismatch { expected, got } => {
                assert_eq!(expected, claimed);
                assert_ne!(got, claimed);
            }
            other => panic!("expected SignerMismatch, got {other:?}"),
        }
    }
}

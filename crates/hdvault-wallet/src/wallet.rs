//! High-level wallet composition.
//!
//! A [`Wallet`] owns the key chain and wires one [`AccountTracker`] into a
//! [`Signer`] and a [`SelfDiscovery`]. It is the unit that is saved to and
//! loaded from disk.
//!
//! # Serialized form
//! ```text
//! {
//!   "wallet": {
//!     "mnemonic": "...", "passphrase": "...",
//!     "paths": { "0x<address>": "m/44'/60'/0'/0/N", ... },
//!     "tracked_accounts": [ { "address": "0x..", "url": "m/..." }, ... ],
//!     "seed": "<hex>"            // only for wallets without a mnemonic
//!   },
//!   "network": "ethereum",
//!   "wallet_type": "*hdwallet.Wallet"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

use hdvault_core::address::Address;
use hdvault_core::constants::NETWORK_ETHEREUM;
use hdvault_core::crypto;
use hdvault_core::path::DerivationPath;
use hdvault_core::traits::{BlockRef, KeyDerivation, LedgerOracle};
use hdvault_core::units;

use crate::discovery::{DiscoveryReport, SelfDiscovery};
use crate::encryption::PasswordCheck;
use crate::error::WalletError;
use crate::keys::{HdKeyChain, Seed};
use crate::mnemonic;
use crate::signer::Signer;
use crate::store;
use crate::tracker::{Account, AccountTracker};

/// `wallet_type` written for hierarchical-deterministic software wallets.
pub const WALLET_TYPE_HD: &str = "*hdwallet.Wallet";

/// Short `wallet_type` written by earlier hdvault releases. Still loaded.
const WALLET_TYPE_HD_SHORT: &str = "hd";

#[derive(Serialize, Deserialize)]
struct WalletFile {
    wallet: HdWalletData,
    network: String,
    wallet_type: String,
}

#[derive(Serialize, Deserialize)]
struct HdWalletData {
    mnemonic: String,
    passphrase: String,
    paths: BTreeMap<Address, DerivationPath>,
    tracked_accounts: Vec<Account>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seed: Option<String>,
}

/// An HD wallet with its tracked accounts.
pub struct Wallet {
    mnemonic: Zeroizing<String>,
    passphrase: Zeroizing<String>,
    keys: Arc<HdKeyChain>,
    tracker: Arc<AccountTracker>,
    signer: Signer,
    discovery: SelfDiscovery,
    /// Present once the wallet was saved or loaded with a password this session.
    password_check: Option<PasswordCheck>,
}

impl Wallet {
    fn assemble(keys: HdKeyChain, mnemonic: String, passphrase: String) -> Self {
        let keys = Arc::new(keys);
        let tracker = Arc::new(AccountTracker::new(keys.clone()));
        Self {
            mnemonic: Zeroizing::new(mnemonic),
            passphrase: Zeroizing::new(passphrase),
            signer: Signer::new(tracker.clone()),
            discovery: SelfDiscovery::new(tracker.clone()),
            keys,
            tracker,
            password_check: None,
        }
    }

    /// Restore from a BIP-39 mnemonic and optional passphrase.
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, WalletError> {
        let seed = mnemonic::mnemonic_to_seed(phrase, passphrase)?;
        let keys = HdKeyChain::new(seed)?;
        info!("wallet opened from mnemonic");
        Ok(Self::assemble(
            keys,
            mnemonic::normalize_phrase(phrase),
            passphrase.to_string(),
        ))
    }

    /// Build from a raw seed. The wallet has no mnemonic to show.
    pub fn from_seed(seed: Seed) -> Result<Self, WalletError> {
        let keys = HdKeyChain::new(seed)?;
        info!("wallet opened from raw seed");
        Ok(Self::assemble(keys, String::new(), String::new()))
    }

    /// Create a wallet with a freshly generated mnemonic of `word_count` words.
    pub fn generate(word_count: usize, passphrase: &str) -> Result<Self, WalletError> {
        let phrase = Zeroizing::new(mnemonic::generate_mnemonic(word_count)?);
        Self::from_mnemonic(&phrase, passphrase)
    }

    /// The mnemonic, if the wallet was built from one.
    pub fn mnemonic(&self) -> Option<&str> {
        (!self.mnemonic.is_empty()).then_some(self.mnemonic.as_str())
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn network(&self) -> &'static str {
        NETWORK_ETHEREUM
    }

    pub fn tracker(&self) -> &Arc<AccountTracker> {
        &self.tracker
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn keys(&self) -> &HdKeyChain {
        &self.keys
    }

    /// Whether this session holds a password check block.
    pub fn is_encrypted(&self) -> bool {
        self.password_check.is_some()
    }

    // ------------------------------------------------------------------
    // Accounts
    // ------------------------------------------------------------------

    pub fn derive(&self, path: &DerivationPath, pin: bool) -> Result<Account, WalletError> {
        self.tracker.derive(path, pin)
    }

    pub fn unpin(&self, address: &Address) -> Result<(), WalletError> {
        self.tracker.unpin(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.tracker.contains(address)
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.tracker.accounts()
    }

    /// Run gap-limit discovery over `bases`.
    pub async fn discover(
        &self,
        bases: &[DerivationPath],
        oracle: &dyn LedgerOracle,
    ) -> Result<DiscoveryReport, WalletError> {
        self.discovery.discover(bases, oracle).await
    }

    // ------------------------------------------------------------------
    // Key export. Keys are derived from the account's URL path.
    // ------------------------------------------------------------------

    pub fn private_key_bytes(&self, account: &Account) -> Result<Zeroizing<Vec<u8>>, WalletError> {
        let key = self.keys.derive_private_key(&account.url)?;
        Ok(Zeroizing::new(key.to_bytes().to_vec()))
    }

    /// Private key as hex without a `0x` prefix.
    pub fn private_key_hex(&self, account: &Account) -> Result<Zeroizing<String>, WalletError> {
        Ok(Zeroizing::new(hex::encode(&*self.private_key_bytes(account)?)))
    }

    /// Uncompressed SEC1 public key, 65 bytes.
    pub fn public_key_bytes(&self, account: &Account) -> Result<Vec<u8>, WalletError> {
        let key = self.keys.derive_public_key(&account.url)?;
        Ok(crypto::uncompressed_public_key(&key))
    }

    /// Public key as hex of the 64-byte `x || y`, without the `04` tag.
    pub fn public_key_hex(&self, account: &Account) -> Result<String, WalletError> {
        Ok(hex::encode(&self.public_key_bytes(account)?[1..]))
    }

    pub fn address(&self, account: &Account) -> Result<Address, WalletError> {
        self.keys.derive_address(&account.url)
    }

    /// EIP-55 checksummed address.
    pub fn address_hex(&self, account: &Account) -> Result<String, WalletError> {
        Ok(self.address(account)?.to_checksum())
    }

    pub fn path(&self, account: &Account) -> String {
        account.url.to_string()
    }

    // ------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------

    /// Balance of `account` in wei at `block`.
    pub async fn account_balance(
        &self,
        oracle: &dyn LedgerOracle,
        account: &Account,
        block: BlockRef,
    ) -> Result<u128, WalletError> {
        Ok(oracle.balance_at(&account.address, block).await?)
    }

    /// Balance of `account` at `block`, formatted in ether.
    pub async fn account_balance_ether(
        &self,
        oracle: &dyn LedgerOracle,
        account: &Account,
        block: BlockRef,
    ) -> Result<String, WalletError> {
        let wei = self.account_balance(oracle, account, block).await?;
        Ok(units::format_ether(wei))
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn to_json(&self) -> Result<Vec<u8>, WalletError> {
        let (paths, tracked_accounts) = self.tracker.snapshot();
        let seed = self
            .mnemonic()
            .is_none()
            .then(|| self.keys.seed().to_hex());
        let file = WalletFile {
            wallet: HdWalletData {
                mnemonic: self.mnemonic.to_string(),
                passphrase: self.passphrase.to_string(),
                paths,
                tracked_accounts,
                seed,
            },
            network: NETWORK_ETHEREUM.to_string(),
            wallet_type: WALLET_TYPE_HD.to_string(),
        };
        serde_json::to_vec(&file).map_err(|e| WalletError::Serialization(e.to_string()))
    }

    fn from_json(data: &[u8]) -> Result<Self, WalletError> {
        let file: WalletFile = serde_json::from_slice(data)
            .map_err(|e| WalletError::Decode(format!("not a wallet: {e}")))?;
        if file.network != NETWORK_ETHEREUM {
            return Err(WalletError::Decode(format!(
                "unsupported network {:?}",
                file.network
            )));
        }
        if file.wallet_type != WALLET_TYPE_HD && file.wallet_type != WALLET_TYPE_HD_SHORT {
            return Err(WalletError::Decode(format!(
                "unsupported wallet type {:?}",
                file.wallet_type
            )));
        }

        let data = file.wallet;
        let keyed = if !data.mnemonic.is_empty() {
            Self::from_mnemonic(&data.mnemonic, &data.passphrase)
        } else if let Some(seed) = &data.seed {
            Seed::from_hex(seed).and_then(Self::from_seed)
        } else {
            Err(WalletError::InvalidInput("neither mnemonic nor seed".into()))
        };
        let wallet = keyed.map_err(|e| WalletError::Decode(format!("key material: {e}")))?;

        wallet.tracker.restore(data.paths, data.tracked_accounts)?;
        Ok(wallet)
    }

    /// Write the wallet to `path`, encrypted when `password` is given.
    ///
    /// After a password was used in this session, later saves must supply
    /// the same password.
    pub fn save(&mut self, path: &Path, password: Option<&[u8]>) -> Result<(), WalletError> {
        let json = Zeroizing::new(self.to_json()?);
        let new_check =
            store::write_wallet_data(path, &json, password, self.password_check.as_ref())?;
        if new_check.is_some() {
            self.password_check = new_check;
        }
        info!(accounts = self.tracker.len(), "wallet saved");
        Ok(())
    }

    /// Load a wallet written by [`save`](Self::save).
    ///
    /// A wrong password decrypts to bytes that do not parse or do not
    /// re-derive, and fails with [`WalletError::Decode`].
    pub fn load(path: &Path, password: Option<&[u8]>) -> Result<Self, WalletError> {
        let (json, check) = store::read_wallet_data(path, password)?;
        let json = Zeroizing::new(json);
        let mut wallet = Self::from_json(&json)?;
        wallet.password_check = check;
        info!(accounts = wallet.tracker.len(), "wallet loaded");
        Ok(wallet)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("network", &NETWORK_ETHEREUM)
            .field("accounts", &self.tracker.len())
            .field("encrypted", &self.is_encrypted())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hdvault_core::constants::WEI_PER_ETHER;
    use hdvault_core::error::OracleError;

    const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";

    fn dev_wallet() -> Wallet {
        Wallet::from_mnemonic(DEV_MNEMONIC, "").unwrap()
    }

    fn path(i: u32) -> DerivationPath {
        DerivationPath::default_base().branch().nth(i as usize).unwrap()
    }

    #[test]
    fn dev_mnemonic_addresses() {
        let w = dev_wallet();
        let expected = [
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC",
        ];
        for (i, want) in expected.iter().enumerate() {
            let acct = w.derive(&path(i as u32), false).unwrap();
            assert_eq!(acct.address.to_string(), *want);
        }
    }

    #[test]
    fn export_keys() {
        let w = dev_wallet();
        let acct = w.derive(&path(0), false).unwrap();
        assert_eq!(
            w.private_key_hex(&acct).unwrap().as_str(),
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
        );
        assert_eq!(w.public_key_bytes(&acct).unwrap().len(), 65);
        assert_eq!(w.public_key_hex(&acct).unwrap().len(), 128);
        assert_eq!(
            w.address_hex(&acct).unwrap(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
        assert_eq!(w.path(&acct), "m/44'/60'/0'/0/0");
    }

    #[test]
    fn empty_inputs_rejected() {
        assert!(matches!(
            Wallet::from_mnemonic("", ""),
            Err(WalletError::InvalidMnemonic(_))
        ));
        assert!(matches!(
            Seed::from_bytes(&[]).and_then(Wallet::from_seed),
            Err(WalletError::InvalidInput(_))
        ));
    }

    #[test]
    fn generate_has_mnemonic() {
        let w = Wallet::generate(24, "").unwrap();
        assert_eq!(w.mnemonic().unwrap().split_whitespace().count(), 24);
    }

    #[test]
    fn json_field_names() {
        let w = dev_wallet();
        w.derive(&path(0), true).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&w.to_json().unwrap()).unwrap();
        assert_eq!(json["network"], "ethereum");
        assert_eq!(json["wallet_type"], "*hdwallet.Wallet");
        assert_eq!(json["wallet"]["mnemonic"], DEV_MNEMONIC);
        assert_eq!(json["wallet"]["passphrase"], "");
        assert_eq!(
            json["wallet"]["paths"]["0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"],
            "m/44'/60'/0'/0/0"
        );
        assert_eq!(
            json["wallet"]["tracked_accounts"][0]["url"],
            "m/44'/60'/0'/0/0"
        );
        assert!(json["wallet"].get("seed").is_none());
    }

    #[test]
    fn save_and_load_plain() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wallet.dat");

        let mut w = dev_wallet();
        for i in [3u32, 0, 7] {
            w.derive(&path(i), true).unwrap();
        }
        w.save(&file, None).unwrap();

        let loaded = Wallet::load(&file, None).unwrap();
        assert_eq!(loaded.accounts(), w.accounts());
        assert_eq!(loaded.mnemonic(), Some(DEV_MNEMONIC));
        assert!(!loaded.is_encrypted());
    }

    #[test]
    fn save_and_load_encrypted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wallet.dat");

        let mut w = Wallet::from_mnemonic(DEV_MNEMONIC, "extra words").unwrap();
        w.derive(&path(1), true).unwrap();
        w.save(&file, Some(b"pw")).unwrap();
        assert!(w.is_encrypted());

        let loaded = Wallet::load(&file, Some(b"pw")).unwrap();
        assert_eq!(loaded.accounts(), w.accounts());
        assert_eq!(loaded.passphrase(), "extra words");
        assert!(loaded.is_encrypted());
    }

    #[test]
    fn load_wrong_password_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wallet.dat");
        let mut w = dev_wallet();
        w.derive(&path(0), true).unwrap();
        w.save(&file, Some(b"correct")).unwrap();

        let err = Wallet::load(&file, Some(b"wrong")).unwrap_err();
        assert!(matches!(err, WalletError::Decode(_)), "got {err:?}");
    }

    #[test]
    fn session_password_enforced_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wallet.dat");
        dev_wallet().save(&file, Some(b"first")).unwrap();

        let mut loaded = Wallet::load(&file, Some(b"first")).unwrap();
        assert_eq!(
            loaded.save(&file, Some(b"other")),
            Err(WalletError::InvalidPassword)
        );
        assert_eq!(loaded.save(&file, None), Err(WalletError::InvalidPassword));
        loaded.save(&file, Some(b"first")).unwrap();
    }

    #[test]
    fn seed_only_wallet_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wallet.dat");

        let mut w = Wallet::from_seed(Seed::from_bytes(&[9u8; 32]).unwrap()).unwrap();
        assert!(w.mnemonic().is_none());
        let acct = w.derive(&path(2), true).unwrap();
        w.save(&file, None).unwrap();

        let loaded = Wallet::load(&file, None).unwrap();
        assert_eq!(loaded.accounts(), vec![acct]);
        assert_eq!(loaded.keys().seed().as_bytes(), &[9u8; 32]);
    }

    #[test]
    fn load_rejects_foreign_network() {
        let json = br#"{"wallet":{"mnemonic":"","passphrase":"","paths":{},"tracked_accounts":[]},"network":"bitcoin","wallet_type":"hd"}"#;
        assert!(matches!(Wallet::from_json(json), Err(WalletError::Decode(_))));
    }

    #[test]
    fn load_accepts_both_hd_type_names() {
        let template = r#"{"wallet":{"mnemonic":"test test test test test test test test test test test junk","passphrase":"","paths":{"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266":"m/44'/60'/0'/0/0"},"tracked_accounts":[{"address":"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266","url":"m/44'/60'/0'/0/0"}]},"network":"ethereum","wallet_type":"TYPE"}"#;
        for wallet_type in ["*hdwallet.Wallet", "hd"] {
            let json = template.replace("TYPE", wallet_type);
            let w = Wallet::from_json(json.as_bytes()).unwrap();
            assert_eq!(w.accounts().len(), 1);
        }
        let other = template.replace("TYPE", "*ledger.Wallet");
        assert!(matches!(
            Wallet::from_json(other.as_bytes()),
            Err(WalletError::Decode(_))
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let dbg = format!("{:?}", dev_wallet());
        assert!(!dbg.contains("junk"));
    }

    struct RichOracle;

    #[async_trait]
    impl LedgerOracle for RichOracle {
        async fn balance_at(&self, _: &Address, block: BlockRef) -> Result<u128, OracleError> {
            match block {
                BlockRef::Pending => Ok(2 * WEI_PER_ETHER),
                _ => Ok(WEI_PER_ETHER + WEI_PER_ETHER / 4),
            }
        }

        async fn transaction_count_at(&self, _: &Address, _: BlockRef) -> Result<u64, OracleError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn balances() {
        let w = dev_wallet();
        let acct = w.derive(&path(0), false).unwrap();
        assert_eq!(
            w.account_balance(&RichOracle, &acct, BlockRef::Latest).await.unwrap(),
            WEI_PER_ETHER + WEI_PER_ETHER / 4
        );
        assert_eq!(
            w.account_balance_ether(&RichOracle, &acct, BlockRef::Pending)
                .await
                .unwrap(),
            "2"
        );
        assert_eq!(
            w.account_balance_ether(&RichOracle, &acct, BlockRef::Latest)
                .await
                .unwrap(),
            "1.25"
        );
    }
}

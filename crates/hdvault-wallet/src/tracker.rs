//! Pinned-account registry.
//!
//! [`AccountTracker`] owns the address-to-path mapping and the ordered list
//! of tracked accounts behind one reader/writer lock. Both collections always
//! hold the same set of addresses, and the list keeps insertion order.
//!
//! Key derivation runs before the lock is taken, so a slow derivation never
//! blocks readers.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use hdvault_core::address::Address;
use hdvault_core::path::DerivationPath;
use hdvault_core::traits::KeyDerivation;

use crate::error::WalletError;

/// Key derivation shared between the tracker, the signer, and discovery.
pub type SharedKeys = Arc<dyn KeyDerivation<Error = WalletError>>;

/// A derived identity: an address and the path that produces it.
///
/// Serialized as `{"address": "0x..", "url": "m/44'/60'/0'/0/N"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Derivation path, used as the account's display URL.
    pub url: DerivationPath,
}

impl Account {
    pub fn path(&self) -> &DerivationPath {
        &self.url
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    paths: HashMap<Address, DerivationPath>,
    accounts: Vec<Account>,
}

/// Concurrency-safe registry of pinned accounts.
pub struct AccountTracker {
    keys: SharedKeys,
    state: RwLock<TrackerState>,
}

impl AccountTracker {
    pub fn new(keys: SharedKeys) -> Self {
        Self {
            keys,
            state: RwLock::new(TrackerState::default()),
        }
    }

    /// The key derivation this tracker resolves paths with.
    pub fn keys(&self) -> &SharedKeys {
        &self.keys
    }

    /// Derive the account at `path`, pinning it when `pin` is set.
    pub fn derive(&self, path: &DerivationPath, pin: bool) -> Result<Account, WalletError> {
        if pin {
            return self.pin(path);
        }
        let address = self.keys.derive_address(path)?;
        Ok(Account {
            address,
            url: path.clone(),
        })
    }

    /// Pin the account at `path`. Pinning an already tracked address returns
    /// the existing account unchanged.
    pub fn pin(&self, path: &DerivationPath) -> Result<Account, WalletError> {
        self.pin_checked(path).map(|(account, _)| account)
    }

    /// Like [`pin`](Self::pin), also reporting whether this call inserted
    /// the account. The check and the insert happen under one write lock.
    pub fn pin_checked(&self, path: &DerivationPath) -> Result<(Account, bool), WalletError> {
        let address = self.keys.derive_address(path)?;

        let mut state = self.state.write();
        if let Some(existing) = state.accounts.iter().find(|a| a.address == address) {
            debug!(%address, "account already pinned");
            return Ok((existing.clone(), false));
        }
        let account = Account {
            address,
            url: path.clone(),
        };
        state.paths.insert(address, path.clone());
        state.accounts.push(account.clone());
        info!(%address, %path, "pinned account");
        Ok((account, true))
    }

    /// Stop tracking `address`.
    pub fn unpin(&self, address: &Address) -> Result<(), WalletError> {
        let mut state = self.state.write();
        let index = state
            .accounts
            .iter()
            .position(|a| a.address == *address)
            .ok_or(WalletError::UnknownAccount(*address))?;
        state.accounts.remove(index);
        state.paths.remove(address);
        info!(%address, "unpinned account");
        Ok(())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.state.read().paths.contains_key(address)
    }

    /// Derivation path of a pinned address.
    pub fn path_of(&self, address: &Address) -> Option<DerivationPath> {
        self.state.read().paths.get(address).cloned()
    }

    /// Snapshot of tracked accounts in pin order.
    pub fn accounts(&self) -> Vec<Account> {
        self.state.read().accounts.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().accounts.is_empty()
    }

    /// Consistent copy of the mapping and the ordered list, taken under one lock.
    pub fn snapshot(&self) -> (BTreeMap<Address, DerivationPath>, Vec<Account>) {
        let state = self.state.read();
        let paths = state
            .paths
            .iter()
            .map(|(a, p)| (*a, p.clone()))
            .collect();
        (paths, state.accounts.clone())
    }

    /// Replace the tracked state with persisted data.
    ///
    /// The mapping and list must describe the same addresses, and every path
    /// must re-derive to its address. On failure the current state is kept.
    pub fn restore(
        &self,
        paths: BTreeMap<Address, DerivationPath>,
        accounts: Vec<Account>,
    ) -> Result<(), WalletError> {
        if paths.len() != accounts.len() {
            return Err(WalletError::Decode(format!(
                "{} paths but {} tracked accounts",
                paths.len(),
                accounts.len()
            )));
        }
        let mut seen = HashSet::with_capacity(accounts.len());
        for account in &accounts {
            if !seen.insert(account.address) {
                return Err(WalletError::Decode(format!(
                    "account {} tracked twice",
                    account.address
                )));
            }
            match paths.get(&account.address) {
                Some(path) if *path == account.url => {}
                Some(path) => {
                    return Err(WalletError::Decode(format!(
                        "account {} has url {} but path {path}",
                        account.address, account.url
                    )));
                }
                None => {
                    return Err(WalletError::Decode(format!(
                        "tracked account {} has no path",
                        account.address
                    )));
                }
            }
            let derived = self.keys.derive_address(&account.url)?;
            if derived != account.address {
                return Err(WalletError::Decode(format!(
                    "path {} derives {derived}, not {}",
                    account.url, account.address
                )));
            }
        }

        let mut state = self.state.write();
        state.paths = paths.into_iter().collect();
        state.accounts = accounts;
        info!(accounts = state.accounts.len(), "restored tracked accounts");
        Ok(())
    }
}

impl std::fmt::Debug for AccountTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountTracker")
            .field("accounts", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::HdKeyChain;

    fn tracker() -> AccountTracker {
        let keys = HdKeyChain::from_seed_bytes(&[7u8; 32]).unwrap();
        AccountTracker::new(Arc::new(keys))
    }

    fn path(i: u32) -> DerivationPath {
        DerivationPath::default_base().branch().nth(i as usize).unwrap()
    }

    #[test]
    fn pin_adds_to_both_collections() {
        let t = tracker();
        let acct = t.pin(&path(0)).unwrap();
        assert!(t.contains(&acct.address));
        assert_eq!(t.path_of(&acct.address), Some(path(0)));
        assert_eq!(t.accounts(), vec![acct]);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn pin_is_idempotent() {
        let t = tracker();
        let a = t.pin(&path(3)).unwrap();
        let b = t.pin(&path(3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn pin_checked_reports_insertion_once() {
        let t = tracker();
        let (first, inserted) = t.pin_checked(&path(2)).unwrap();
        assert!(inserted);
        let (again, inserted) = t.pin_checked(&path(2)).unwrap();
        assert!(!inserted);
        assert_eq!(first, again);
    }

    #[test]
    fn concurrent_pin_checked_inserts_exactly_once() {
        let t = tracker();
        let inserted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| t.pin_checked(&path(4)).unwrap().1))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap() as usize).sum()
        });
        assert_eq!(inserted, 1);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn derive_without_pin_leaves_state() {
        let t = tracker();
        let acct = t.derive(&path(1), false).unwrap();
        assert!(!t.contains(&acct.address));
        assert!(t.is_empty());

        let pinned = t.derive(&path(1), true).unwrap();
        assert_eq!(pinned, acct);
        assert!(t.contains(&acct.address));
    }

    #[test]
    fn accounts_keep_pin_order() {
        let t = tracker();
        let order = [4u32, 0, 2, 9];
        let pinned: Vec<Account> = order.iter().map(|&i| t.pin(&path(i)).unwrap()).collect();
        assert_eq!(t.accounts(), pinned);
    }

    #[test]
    fn accounts_is_a_copy() {
        let t = tracker();
        t.pin(&path(0)).unwrap();
        let mut copy = t.accounts();
        copy.clear();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn unpin_first_middle_last() {
        for victim in 0..3usize {
            let t = tracker();
            let accts: Vec<Account> = (0..3).map(|i| t.pin(&path(i)).unwrap()).collect();
            t.unpin(&accts[victim].address).unwrap();

            let expected: Vec<Account> = accts
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != victim)
                .map(|(_, a)| a.clone())
                .collect();
            assert_eq!(t.accounts(), expected);
            assert!(!t.contains(&accts[victim].address));
            assert_eq!(t.path_of(&accts[victim].address), None);
            for a in &expected {
                assert!(t.contains(&a.address));
            }
        }
    }

    #[test]
    fn unpin_unknown_fails() {
        let t = tracker();
        let stranger = Address::from_bytes([9u8; 20]);
        assert_eq!(t.unpin(&stranger), Err(WalletError::UnknownAccount(stranger)));
    }

    #[test]
    fn repin_after_unpin_appends() {
        let t = tracker();
        let a0 = t.pin(&path(0)).unwrap();
        let a1 = t.pin(&path(1)).unwrap();
        t.unpin(&a0.address).unwrap();
        t.pin(&path(0)).unwrap();
        assert_eq!(t.accounts(), vec![a1, a0]);
    }

    #[test]
    fn restore_roundtrip() {
        let t = tracker();
        t.pin(&path(5)).unwrap();
        t.pin(&path(1)).unwrap();
        let (paths, accounts) = t.snapshot();

        let fresh = tracker();
        fresh.restore(paths, accounts.clone()).unwrap();
        assert_eq!(fresh.accounts(), accounts);
    }

    #[test]
    fn restore_rejects_mismatched_collections() {
        let t = tracker();
        let a = t.pin(&path(0)).unwrap();
        let (mut paths, accounts) = t.snapshot();
        paths.insert(Address::from_bytes([1u8; 20]), path(1));
        assert!(matches!(
            tracker().restore(paths, accounts.clone()),
            Err(WalletError::Decode(_))
        ));

        let mut wrong_path = BTreeMap::new();
        wrong_path.insert(a.address, path(1));
        assert!(matches!(
            tracker().restore(wrong_path, accounts),
            Err(WalletError::Decode(_))
        ));
    }

    #[test]
    fn restore_rejects_duplicate_accounts() {
        let t = tracker();
        let a0 = t.pin(&path(0)).unwrap();
        t.pin(&path(1)).unwrap();
        let (paths, _) = t.snapshot();
        let doubled = vec![a0.clone(), a0];
        assert!(matches!(
            tracker().restore(paths, doubled),
            Err(WalletError::Decode(_))
        ));
    }

    #[test]
    fn restore_rejects_foreign_address() {
        let stranger = Address::from_bytes([2u8; 20]);
        let mut paths = BTreeMap::new();
        paths.insert(stranger, path(0));
        let accounts = vec![Account {
            address: stranger,
            url: path(0),
        }];
        let t = tracker();
        assert!(matches!(t.restore(paths, accounts), Err(WalletError::Decode(_))));
        assert!(t.is_empty());
    }

    #[test]
    fn account_serde_shape() {
        let acct = Account {
            address: Address::from_bytes([0xab; 20]),
            url: path(2),
        };
        let json = serde_json::to_string(&acct).unwrap();
        assert_eq!(
            json,
            format!(
                "{{\"address\":\"0x{}\",\"url\":\"m/44'/60'/0'/0/2\"}}",
                "ab".repeat(20)
            )
        );
    }
}

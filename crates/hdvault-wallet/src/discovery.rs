//! Gap-limit account discovery (BIP-44).
//!
//! For each base path, walk the branch from its first index and ask the
//! ledger whether each address has been used. A used address is pinned; the
//! branch ends after [`GAP_LIMIT`] consecutive unused addresses.
//!
//! "Used" means a non-zero balance or a non-zero transaction count. The
//! balance is asked first; the count is only fetched for empty accounts.
//!
//! An oracle failure aborts the whole scan. Accounts pinned before the
//! failure stay pinned.

use std::sync::Arc;
use tracing::{debug, info};

use hdvault_core::address::Address;
use hdvault_core::constants::GAP_LIMIT;
use hdvault_core::path::DerivationPath;
use hdvault_core::traits::{BlockRef, LedgerOracle};

use crate::error::WalletError;
use crate::tracker::{Account, AccountTracker};

/// Outcome of a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Accounts pinned by this run, in discovery order.
    pub pinned: Vec<Account>,
    /// Number of addresses queried across all branches.
    pub scanned: usize,
}

/// Scans derivation branches against a ledger and pins active accounts.
#[derive(Debug, Clone)]
pub struct SelfDiscovery {
    tracker: Arc<AccountTracker>,
}

impl SelfDiscovery {
    pub fn new(tracker: Arc<AccountTracker>) -> Self {
        Self { tracker }
    }

    /// Scan each base path in order. The tracker lock is only held while pinning.
    pub async fn discover(
        &self,
        bases: &[DerivationPath],
        oracle: &dyn LedgerOracle,
    ) -> Result<DiscoveryReport, WalletError> {
        let mut report = DiscoveryReport::default();
        for base in bases {
            self.scan_branch(base, oracle, &mut report).await?;
        }
        info!(
            branches = bases.len(),
            scanned = report.scanned,
            pinned = report.pinned.len(),
            "discovery finished"
        );
        Ok(report)
    }

    async fn scan_branch(
        &self,
        base: &DerivationPath,
        oracle: &dyn LedgerOracle,
        report: &mut DiscoveryReport,
    ) -> Result<(), WalletError> {
        let mut unused = 0usize;
        for path in base.branch() {
            if unused >= GAP_LIMIT {
                break;
            }
            let address = self.tracker.keys().derive_address(&path)?;
            report.scanned += 1;

            if is_used(oracle, &address).await? {
                debug!(%path, %address, "used");
                let (account, inserted) = self.tracker.pin_checked(&path)?;
                if inserted {
                    report.pinned.push(account);
                }
                unused = 0;
            } else {
                debug!(%path, %address, "unused");
                unused += 1;
            }
        }
        Ok(())
    }
}

async fn is_used(oracle: &dyn LedgerOracle, address: &Address) -> Result<bool, WalletError> {
    if oracle.balance_at(address, BlockRef::Latest).await? > 0 {
        return Ok(true);
    }
    Ok(oracle.transaction_count_at(address, BlockRef::Latest).await? > 0)
}

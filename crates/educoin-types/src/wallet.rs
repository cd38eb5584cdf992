//! Wallet types for the Educoin escrow model.
//!
//! Every wallet has a `balance` (coins owned) and a `locked` amount
//! (coins reserved against open bids). `available = balance - locked`
//! is what can be spent or locked next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GroupId, PeriodId, UserId, WalletId};

/// Natural key of a wallet: one per (student, group, period).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct WalletKey {
    pub student: UserId,
    pub group: GroupId,
    pub period: PeriodId,
}

impl WalletKey {
    #[must_use]
    pub fn new(student: UserId, group: GroupId, period: PeriodId) -> Self {
        Self {
            student,
            group,
            period,
        }
    }
}

/// A per-student, per-group, per-period coin account.
///
/// Invariant: `locked <= balance`. Only the ledger mutates these fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    pub id: WalletId,
    pub key: WalletKey,
    /// Total coins owned.
    pub balance: u64,
    /// Coins reserved against open bids.
    pub locked: u64,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a zero-balance wallet.
    #[must_use]
    pub fn new(key: WalletKey, created_at: DateTime<Utc>) -> Self {
        Self {
            id: WalletId::new(),
            key,
            balance: 0,
            locked: 0,
            created_at,
        }
    }

    /// Coins that can still be locked or withdrawn.
    #[must_use]
    pub fn available(&self) -> u64 {
        self.balance.saturating_sub(self.locked)
    }

    /// Whether `0 <= locked <= balance` holds.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.locked <= self.balance
    }

    #[must_use]
    pub fn snapshot(&self) -> WalletBalance {
        WalletBalance {
            balance: self.balance,
            locked: self.locked,
            available: self.available(),
        }
    }
}

/// Read-only view of a wallet's figures, as served to the presentation layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletBalance {
    pub balance: u64,
    pub locked: u64,
    pub available: u64,
}

/// Dummy wallet for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Wallet {
    pub fn dummy(balance: u64, locked: u64) -> Self {
        let key = WalletKey::new(UserId::new(), GroupId::new(), PeriodId::new());
        Self {
            balance,
            locked,
            ..Self::new(key, Utc::now())
        }
    }
}

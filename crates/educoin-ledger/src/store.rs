//! Ledger Store: wallet rows and their append-only journals.
//!
//! Each wallet lives in its own [`WalletRow`] behind a `parking_lot`
//! mutex. Acquiring a row always goes through [`LedgerStore::lock_row`],
//! which gives up after the configured timeout with `LockTimeout` instead
//! of blocking forever. A caller that times out has applied nothing.
//!
//! Callers that need several rows at once must lock them in ascending
//! [`WalletId`] order.
//!
//! ## Row primitives
//!
//! | Operation  | balance        | locked         | journal        |
//! |------------|----------------|----------------|----------------|
//! | `deposit`  | `+ amount`     | -              | `earn`         |
//! | `withdraw` | `- amount`     | -              | `spend`        |
//! | `lock`     | -              | `+ amount`     | -              |
//! | `unlock`   | -              | `- amount`     | -              |
//! | `settle`   | `- amount`     | `- amount`     | `spend`        |
//! | `reset`    | `0`            | `0`            | `reset`        |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use educoin_types::{
    CoinTransaction, EducoinError, Result, TransactionKind, Wallet, WalletBalance, WalletId,
    WalletKey,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

/// A wallet plus its journal. Only reachable through a row lock.
#[derive(Debug)]
pub struct WalletRow {
    wallet: Wallet,
    journal: Vec<CoinTransaction>,
}

impl WalletRow {
    fn new(wallet: Wallet) -> Self {
        Self {
            wallet,
            journal: Vec::new(),
        }
    }

    #[must_use]
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    #[must_use]
    pub fn journal(&self) -> &[CoinTransaction] {
        &self.journal
    }

    fn append(&mut self, kind: TransactionKind, amount: u64, reason: &str, at: DateTime<Utc>) {
        let prev = self.journal.last().map_or([0u8; 32], |tx| tx.digest);
        let tx = CoinTransaction::chained(
            self.wallet.id,
            self.journal.len() as u64,
            kind,
            amount,
            reason,
            at,
            prev,
        );
        debug!(wallet = %self.wallet.id, seq = tx.sequence, digest = %tx.digest_short(), "Journal entry appended");
        self.journal.push(tx);
    }

    fn require_positive(amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(EducoinError::invalid_amount("amount must be positive"));
        }
        Ok(())
    }

    fn require_available(&self, amount: u64) -> Result<()> {
        let available = self.wallet.available();
        if amount > available {
            return Err(EducoinError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    /// Dry run of [`Self::lock`].
    pub fn check_lock(&self, amount: u64) -> Result<()> {
        Self::require_positive(amount)?;
        self.require_available(amount)
    }

    /// Dry run of [`Self::unlock`]. An unlock larger than `locked` means the
    /// escrow bookkeeping is broken and is reported as a fault.
    pub fn check_unlock(&self, amount: u64) -> Result<()> {
        Self::require_positive(amount)?;
        if amount > self.wallet.locked {
            error!(
                fatal = true,
                wallet = %self.wallet.id,
                locked = self.wallet.locked,
                amount,
                "Unlock would make locked negative"
            );
            return Err(EducoinError::fault(format!(
                "unlock of {amount} exceeds locked {} on {}",
                self.wallet.locked, self.wallet.id
            )));
        }
        Ok(())
    }

    /// Dry run of [`Self::settle`].
    pub fn check_settle(&self, amount: u64) -> Result<()> {
        self.check_unlock(amount)?;
        if amount > self.wallet.balance {
            error!(
                fatal = true,
                wallet = %self.wallet.id,
                balance = self.wallet.balance,
                amount,
                "Settlement exceeds balance"
            );
            return Err(EducoinError::fault(format!(
                "settle of {amount} exceeds balance {} on {}",
                self.wallet.balance, self.wallet.id
            )));
        }
        Ok(())
    }

    /// Credit coins. Returns the new balance.
    pub fn deposit(&mut self, amount: u64, reason: &str, at: DateTime<Utc>) -> Result<u64> {
        Self::require_positive(amount)?;
        let balance = self
            .wallet
            .balance
            .checked_add(amount)
            .ok_or_else(|| EducoinError::invalid_amount("deposit overflows balance"))?;
        self.wallet.balance = balance;
        self.append(TransactionKind::Earn, amount, reason, at);
        info!(wallet = %self.wallet.id, amount, balance, reason, "Deposit");
        Ok(balance)
    }

    /// Debit unreserved coins. Returns the new balance.
    ///
    /// Locked coins can't be withdrawn; they leave only through [`Self::settle`].
    pub fn withdraw(&mut self, amount: u64, reason: &str, at: DateTime<Utc>) -> Result<u64> {
        Self::require_positive(amount)?;
        self.require_available(amount)?;
        self.wallet.balance -= amount;
        self.append(TransactionKind::Spend, amount, reason, at);
        info!(wallet = %self.wallet.id, amount, balance = self.wallet.balance, reason, "Withdraw");
        Ok(self.wallet.balance)
    }

    /// Reserve coins. Returns the new locked amount.
    pub fn lock(&mut self, amount: u64) -> Result<u64> {
        self.check_lock(amount)?;
        self.wallet.locked += amount;
        info!(wallet = %self.wallet.id, amount, locked = self.wallet.locked, "Lock");
        Ok(self.wallet.locked)
    }

    /// Release reserved coins. Returns the new locked amount.
    pub fn unlock(&mut self, amount: u64) -> Result<u64> {
        self.check_unlock(amount)?;
        self.wallet.locked -= amount;
        info!(wallet = %self.wallet.id, amount, locked = self.wallet.locked, "Unlock");
        Ok(self.wallet.locked)
    }

    /// Turn reserved coins into a completed spend. Returns the new balance.
    pub fn settle(&mut self, amount: u64, reason: &str, at: DateTime<Utc>) -> Result<u64> {
        self.check_settle(amount)?;
        self.wallet.locked -= amount;
        self.wallet.balance -= amount;
        self.append(TransactionKind::Spend, amount, reason, at);
        info!(
            wallet = %self.wallet.id,
            amount,
            balance = self.wallet.balance,
            locked = self.wallet.locked,
            reason,
            "Settle"
        );
        Ok(self.wallet.balance)
    }

    /// Zero the wallet. Returns the balance it held before.
    pub fn reset(&mut self, reason: &str, at: DateTime<Utc>) -> u64 {
        let prior = self.wallet.balance;
        if self.wallet.locked > 0 {
            warn!(
                wallet = %self.wallet.id,
                locked = self.wallet.locked,
                "Reset drops outstanding reservations"
            );
        }
        self.wallet.balance = 0;
        self.wallet.locked = 0;
        self.append(TransactionKind::Reset, prior, reason, at);
        info!(wallet = %self.wallet.id, prior, reason, "Reset");
        prior
    }

    /// Check `locked <= balance`, the journal sum, and the hash chain.
    pub fn verify(&self) -> Result<()> {
        let id = self.wallet.id;
        if !self.wallet.is_consistent() {
            return Err(EducoinError::fault(format!(
                "{id}: locked {} exceeds balance {}",
                self.wallet.locked, self.wallet.balance
            )));
        }

        let mut prev = [0u8; 32];
        let mut sum: i128 = 0;
        for (i, tx) in self.journal.iter().enumerate() {
            if tx.sequence != i as u64 || tx.prev_digest != prev || !tx.verify_digest() {
                return Err(EducoinError::fault(format!(
                    "{id}: journal chain broken at entry {i} ({})",
                    tx.digest_short()
                )));
            }
            prev = tx.digest;
            sum = tx.apply_to(sum);
        }

        if sum != i128::from(self.wallet.balance) {
            return Err(EducoinError::fault(format!(
                "{id}: balance {} but journal sums to {sum}",
                self.wallet.balance
            )));
        }
        Ok(())
    }
}

/// Result of a full-ledger audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub wallets: usize,
    pub transactions: usize,
    pub total_balance: u64,
    pub total_locked: u64,
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<WalletId, Arc<Mutex<WalletRow>>>,
    by_key: HashMap<WalletKey, WalletId>,
}

/// In-memory wallet table with per-row locking.
#[derive(Debug)]
pub struct LedgerStore {
    tables: RwLock<Tables>,
    lock_timeout: Duration,
}

impl LedgerStore {
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            lock_timeout,
        }
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Return the wallet for `key`, creating a zero-balance one if needed.
    /// The flag is `true` when the wallet was created by this call.
    pub fn ensure_wallet(&self, key: WalletKey, now: DateTime<Utc>) -> (WalletId, bool) {
        let mut tables = self.tables.write();
        if let Some(id) = tables.by_key.get(&key) {
            return (*id, false);
        }
        let wallet = Wallet::new(key, now);
        let id = wallet.id;
        tables.by_key.insert(key, id);
        tables
            .rows
            .insert(id, Arc::new(Mutex::new(WalletRow::new(wallet))));
        info!(wallet = %id, student = %key.student, group = %key.group, period = %key.period, "Wallet created");
        (id, true)
    }

    #[must_use]
    pub fn find(&self, key: &WalletKey) -> Option<WalletId> {
        self.tables.read().by_key.get(key).copied()
    }

    /// Handle to a wallet row. Lock it with [`Self::lock_row`].
    pub fn row(&self, id: WalletId) -> Result<Arc<Mutex<WalletRow>>> {
        self.tables
            .read()
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| EducoinError::not_found("wallet", id))
    }

    /// Acquire a row lock, waiting at most the configured timeout.
    pub fn lock_row<'a>(
        &self,
        id: WalletId,
        row: &'a Mutex<WalletRow>,
    ) -> Result<MutexGuard<'a, WalletRow>> {
        row.try_lock_for(self.lock_timeout).ok_or_else(|| {
            warn!(wallet = %id, timeout = ?self.lock_timeout, "Wallet lock timed out");
            EducoinError::LockTimeout {
                resource: id.to_string(),
            }
        })
    }

    /// Run `f` with exclusive access to one wallet row.
    pub fn with_row<T>(&self, id: WalletId, f: impl FnOnce(&mut WalletRow) -> Result<T>) -> Result<T> {
        let row = self.row(id)?;
        let mut guard = self.lock_row(id, &row)?;
        f(&mut guard)
    }

    pub fn wallet(&self, id: WalletId) -> Result<Wallet> {
        self.with_row(id, |row| Ok(row.wallet.clone()))
    }

    pub fn balance(&self, id: WalletId) -> Result<WalletBalance> {
        self.with_row(id, |row| Ok(row.wallet.snapshot()))
    }

    pub fn journal(&self, id: WalletId) -> Result<Vec<CoinTransaction>> {
        self.with_row(id, |row| Ok(row.journal.clone()))
    }

    /// Snapshot every wallet whose key matches `filter`.
    pub fn wallets_where(&self, matches: impl Fn(&WalletKey) -> bool) -> Result<Vec<Wallet>> {
        let rows: Vec<(WalletId, Arc<Mutex<WalletRow>>)> = {
            let tables = self.tables.read();
            tables
                .by_key
                .iter()
                .filter(|(key, _)| matches(key))
                .filter_map(|(_, id)| tables.rows.get(id).map(|row| (*id, Arc::clone(row))))
                .collect()
        };
        rows.iter()
            .map(|(id, row)| Ok(self.lock_row(*id, row)?.wallet.clone()))
            .collect()
    }

    #[must_use]
    pub fn wallet_count(&self) -> usize {
        self.tables.read().rows.len()
    }

    /// Verify every wallet. The first violation is returned as an
    /// `InternalConsistencyFault`.
    pub fn audit(&self) -> Result<AuditReport> {
        let mut rows: Vec<(WalletId, Arc<Mutex<WalletRow>>)> = self
            .tables
            .read()
            .rows
            .iter()
            .map(|(id, row)| (*id, Arc::clone(row)))
            .collect();
        rows.sort_by_key(|(id, _)| *id);

        let mut report = AuditReport::default();
        for (id, row) in &rows {
            let guard = self.lock_row(*id, row)?;
            if let Err(err) = guard.verify() {
                error!(fatal = true, wallet = %id, error = %err, "Ledger audit failed");
                return Err(err);
            }
            report.wallets += 1;
            report.transactions += guard.journal.len();
            report.total_balance = report.total_balance.saturating_add(guard.wallet.balance);
            report.total_locked = report.total_locked.saturating_add(guard.wallet.locked);
        }
        Ok(report)
    }
}

//! Wallet Service: the public face of the ledger for single-wallet calls.
//!
//! Every mutating call takes exactly one row lock, applies one primitive
//! and releases the lock before any notification goes out. Two calls on
//! the same wallet serialize; calls on different wallets run in parallel.

use std::sync::Arc;

use educoin_types::{
    CoinTransaction, GroupId, LedgerConfig, Notification, PeriodId, Result, UserId, Wallet,
    WalletBalance, WalletId, WalletKey,
};

use crate::{Clock, LedgerStore, NotificationSink};

pub struct WalletService {
    store: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    history_limit: usize,
}

impl WalletService {
    #[must_use]
    pub fn new(
        store: Arc<LedgerStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationSink>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            history_limit: config.history_limit,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Credit `amount` coins. Returns the new balance.
    pub fn deposit(&self, wallet: WalletId, amount: u64, reason: &str) -> Result<u64> {
        let now = self.clock.now();
        let (student, balance) = self.store.with_row(wallet, |row| {
            let balance = row.deposit(amount, reason, now)?;
            Ok((row.wallet().key.student, balance))
        })?;

        self.notifier.notify(Notification::CoinsEarned {
            student,
            wallet,
            amount,
            reason: reason.to_string(),
            new_balance: balance,
        });
        Ok(balance)
    }

    /// Debit `amount` unreserved coins. Returns the new balance.
    pub fn withdraw(&self, wallet: WalletId, amount: u64, reason: &str) -> Result<u64> {
        let now = self.clock.now();
        self.store
            .with_row(wallet, |row| row.withdraw(amount, reason, now))
    }

    /// Reserve `amount` coins. Returns the new locked total.
    pub fn lock(&self, wallet: WalletId, amount: u64) -> Result<u64> {
        self.store.with_row(wallet, |row| row.lock(amount))
    }

    /// Release `amount` reserved coins. Returns the new locked total.
    pub fn unlock(&self, wallet: WalletId, amount: u64) -> Result<u64> {
        self.store.with_row(wallet, |row| row.unlock(amount))
    }

    /// Unlock and withdraw `amount` as one step. Returns the new balance.
    pub fn settle(&self, wallet: WalletId, amount: u64, reason: &str) -> Result<u64> {
        let now = self.clock.now();
        self.store
            .with_row(wallet, |row| row.settle(amount, reason, now))
    }

    /// Zero `balance` and `locked`. Returns the balance before the reset.
    pub fn reset(&self, wallet: WalletId, reason: &str) -> Result<u64> {
        let now = self.clock.now();
        self.store
            .with_row(wallet, |row| Ok(row.reset(reason, now)))
    }

    pub fn wallet(&self, wallet: WalletId) -> Result<Wallet> {
        self.store.wallet(wallet)
    }

    pub fn balance(&self, wallet: WalletId) -> Result<WalletBalance> {
        self.store.balance(wallet)
    }

    /// Newest-first transaction history, capped at `limit` (or the
    /// configured default).
    pub fn history(&self, wallet: WalletId, limit: Option<usize>) -> Result<Vec<CoinTransaction>> {
        let limit = limit.unwrap_or(self.history_limit);
        let journal = self.store.journal(wallet)?;
        Ok(journal.into_iter().rev().take(limit).collect())
    }

    #[must_use]
    pub fn wallet_for(&self, student: UserId, group: GroupId, period: PeriodId) -> Option<WalletId> {
        self.store.find(&WalletKey::new(student, group, period))
    }

    /// Every wallet the student holds, across groups and periods, oldest first.
    pub fn wallets_for_student(&self, student: UserId) -> Result<Vec<Wallet>> {
        let mut wallets = self.store.wallets_where(|key| key.student == student)?;
        wallets.sort_by_key(|w| w.id);
        Ok(wallets)
    }

    /// Sum of the student's balances across all wallets.
    pub fn total_balance(&self, student: UserId) -> Result<u64> {
        Ok(self
            .wallets_for_student(student)?
            .iter()
            .fold(0u64, |acc, w| acc.saturating_add(w.balance)))
    }

    /// A group's wallets for one period, richest first.
    pub fn group_balances(&self, group: GroupId, period: PeriodId) -> Result<Vec<Wallet>> {
        let mut wallets = self
            .store
            .wallets_where(|key| key.group == group && key.period == period)?;
        wallets.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.id.cmp(&b.id)));
        Ok(wallets)
    }
}

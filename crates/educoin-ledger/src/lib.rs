//! # educoin-ledger
//!
//! **Wallet ledger**: per-student coin accounts, their audit trail, the
//! accounting periods that scope them, and the grading reward pipeline.
//!
//! ## Architecture
//!
//! ```text
//!   Grading ──▶ GradeRewarder ──▶ WalletService ──▶ LedgerStore
//!                    │                                  ▲
//!                    └──────▶ PeriodManager ────────────┘
//! ```
//!
//! - [`LedgerStore`]: wallet rows behind per-row mutexes, each with a
//!   hash-chained journal
//! - [`WalletService`]: deposit / withdraw / lock / unlock / settle / reset
//! - [`PeriodManager`]: one active period per group, wallets on join
//! - [`GradeRewarder`]: grade to coins, deposited into the active wallet
//!
//! Collaborators supplied by the embedding application: a [`Roster`], a
//! [`NotificationSink`], and a [`Clock`].

pub mod clock;
pub mod notify;
pub mod period_manager;
pub mod reward;
pub mod roster;
pub mod store;
pub mod telemetry;
pub mod wallet_service;

use std::sync::Arc;

use educoin_types::{LedgerConfig, Result};

pub use clock::{Clock, ManualClock, SystemClock};
pub use notify::{ChannelNotifier, NotificationSink, NullNotifier};
pub use period_manager::{Activation, PeriodManager};
pub use reward::{GradeRewarder, GradedSubmission, RewardOutcome, coins};
pub use roster::{InMemoryRoster, Roster};
pub use store::{AuditReport, LedgerStore, WalletRow};
pub use wallet_service::WalletService;

/// The ledger's components wired to one shared store.
#[derive(Clone)]
pub struct Ledger {
    pub config: LedgerConfig,
    pub store: Arc<LedgerStore>,
    pub wallets: Arc<WalletService>,
    pub periods: Arc<PeriodManager>,
    pub roster: Arc<dyn Roster>,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
}

impl Ledger {
    /// Validate `config` and build every component.
    pub fn new(
        config: LedgerConfig,
        roster: Arc<dyn Roster>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(LedgerStore::new(config.lock_timeout()));
        let wallets = Arc::new(WalletService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&notifier),
            &config,
        ));
        let periods = Arc::new(PeriodManager::new(
            Arc::clone(&store),
            Arc::clone(&roster),
            Arc::clone(&clock),
        ));
        Ok(Self {
            config,
            store,
            wallets,
            periods,
            roster,
            notifier,
            clock,
        })
    }

    #[must_use]
    pub fn rewarder(&self) -> GradeRewarder {
        GradeRewarder::new(
            Arc::clone(&self.wallets),
            Arc::clone(&self.periods),
            self.config.reward,
        )
    }
}

#[cfg(test)]
mod tests {
    use educoin_types::EducoinError;

    use super::*;

    #[test]
    fn invalid_config_is_rejected() {
        let config = LedgerConfig {
            lock_timeout_ms: 0,
            ..LedgerConfig::default()
        };
        let err = Ledger::new(
            config,
            Arc::new(InMemoryRoster::new()),
            Arc::new(NullNotifier),
            Arc::new(SystemClock),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EducoinError::Configuration(_)));
    }
}

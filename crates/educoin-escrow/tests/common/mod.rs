//! Shared fixture: one group with a teacher, an admin, funded students and
//! an active period, driven by a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use educoin_escrow::AuctionEngine;
use educoin_ledger::{ChannelNotifier, Clock, InMemoryRoster, Ledger, ManualClock, Roster};
use educoin_types::{
    Auction, GroupId, LedgerConfig, NewAuction, Notification, PeriodId, RewardType, UserId,
    WalletBalance, WalletId,
};
use tokio::sync::mpsc::UnboundedReceiver;

pub struct Classroom {
    pub engine: AuctionEngine,
    pub ledger: Ledger,
    pub roster: Arc<InMemoryRoster>,
    pub clock: Arc<ManualClock>,
    pub notices: UnboundedReceiver<Notification>,
    pub group: GroupId,
    pub period: PeriodId,
    pub teacher: UserId,
    pub admin: UserId,
    pub students: Vec<UserId>,
}

impl Classroom {
    /// A group whose students start with the given balances.
    pub fn with_balances(balances: &[u64]) -> Self {
        let roster = Arc::new(InMemoryRoster::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let (notifier, notices) = ChannelNotifier::new();
        let group = GroupId::new();
        let teacher = UserId::new();
        let admin = UserId::new();
        roster.add_group(group, teacher);
        roster.add_admin(admin);
        let students: Vec<UserId> = balances.iter().map(|_| UserId::new()).collect();
        for s in &students {
            roster.add_member(group, *s).unwrap();
        }

        let config = LedgerConfig {
            lock_timeout_ms: 500,
            ..LedgerConfig::default()
        };
        let ledger = Ledger::new(
            config,
            Arc::clone(&roster) as Arc<dyn Roster>,
            Arc::new(notifier),
            Arc::clone(&clock) as Arc<dyn Clock>,
        )
        .unwrap();
        let period = ledger
            .periods
            .create_period(
                group,
                "2025-1",
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            )
            .unwrap();
        ledger.periods.activate(group, period.id).unwrap();

        let engine = AuctionEngine::new(&ledger);
        let mut classroom = Self {
            engine,
            ledger,
            roster,
            clock,
            notices,
            group,
            period: period.id,
            teacher,
            admin,
            students,
        };
        for (i, amount) in balances.iter().enumerate() {
            if *amount > 0 {
                let w = classroom.wallet(i);
                classroom.ledger.wallets.deposit(w, *amount, "seed").unwrap();
            }
        }
        classroom.drain();
        classroom
    }

    pub fn student(&self, i: usize) -> UserId {
        self.students[i]
    }

    pub fn wallet(&self, i: usize) -> WalletId {
        self.ledger
            .wallets
            .wallet_for(self.students[i], self.group, self.period)
            .unwrap()
    }

    pub fn balance(&self, i: usize) -> WalletBalance {
        self.ledger.wallets.balance(self.wallet(i)).unwrap()
    }

    /// An auction closing in one hour.
    pub fn open_auction(&self, min_bid: Option<u64>) -> Auction {
        self.engine
            .create_auction(
                self.teacher,
                NewAuction {
                    group: self.group,
                    title: "Drop lowest quiz".into(),
                    description: "Your lowest quiz score is dropped".into(),
                    reward_type: RewardType::Benefit,
                    min_bid,
                    deadline: self.clock.now() + Duration::hours(1),
                },
            )
            .unwrap()
    }

    /// Take every pending notification.
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notices.try_recv() {
            out.push(n);
        }
        out
    }
}

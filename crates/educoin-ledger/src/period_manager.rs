//! Period Manager: one active accounting period per group.
//!
//! The single-active-period rule is enforced when a period is activated,
//! under the table's write lock, so readers never see zero or two active
//! periods mid-switch. Wallets for the new period are created inside the
//! same critical section; old wallets are left as they are.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use educoin_types::{
    EducoinError, GroupId, Period, PeriodId, Result, UserId, WalletId, WalletKey,
};
use parking_lot::RwLock;
use tracing::info;

use crate::{Clock, LedgerStore, Roster};

/// What an activation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub group: GroupId,
    pub period: PeriodId,
    /// The period that was active before, if different.
    pub previous: Option<PeriodId>,
    /// Zero-balance wallets opened for current group members.
    pub wallets_created: Vec<WalletId>,
}

pub struct PeriodManager {
    periods: RwLock<HashMap<GroupId, Vec<Period>>>,
    store: Arc<LedgerStore>,
    roster: Arc<dyn Roster>,
    clock: Arc<dyn Clock>,
}

impl PeriodManager {
    #[must_use]
    pub fn new(store: Arc<LedgerStore>, roster: Arc<dyn Roster>, clock: Arc<dyn Clock>) -> Self {
        Self {
            periods: RwLock::new(HashMap::new()),
            store,
            roster,
            clock,
        }
    }

    /// Register an inactive period for `group`.
    pub fn create_period(
        &self,
        group: GroupId,
        name: &str,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    ) -> Result<Period> {
        if ends_on < starts_on {
            return Err(EducoinError::invalid_state(format!(
                "period {name} ends ({ends_on}) before it starts ({starts_on})"
            )));
        }
        let period = Period {
            id: PeriodId::new(),
            group,
            name: name.to_string(),
            starts_on,
            ends_on,
            active: false,
            created_at: self.clock.now(),
        };
        self.periods
            .write()
            .entry(group)
            .or_default()
            .push(period.clone());
        info!(group = %group, period = %period.id, name, "Period created");
        Ok(period)
    }

    /// Make `period` the only active period of `group` and open wallets for
    /// every current member who lacks one.
    pub fn activate(&self, group: GroupId, period: PeriodId) -> Result<Activation> {
        let mut table = self.periods.write();
        let periods = table
            .get_mut(&group)
            .ok_or_else(|| EducoinError::not_found("period", period))?;
        if !periods.iter().any(|p| p.id == period) {
            return Err(EducoinError::not_found("period", period));
        }

        let previous = periods
            .iter()
            .find(|p| p.active && p.id != period)
            .map(|p| p.id);
        for p in periods.iter_mut() {
            p.active = p.id == period;
        }

        let now = self.clock.now();
        let wallets_created: Vec<WalletId> = self
            .roster
            .members(group)
            .into_iter()
            .filter_map(|student| {
                let (id, created) = self
                    .store
                    .ensure_wallet(WalletKey::new(student, group, period), now);
                created.then_some(id)
            })
            .collect();

        info!(
            group = %group,
            period = %period,
            previous = ?previous,
            wallets_created = wallets_created.len(),
            "Period activated"
        );
        Ok(Activation {
            group,
            period,
            previous,
            wallets_created,
        })
    }

    /// The group's active period, if any.
    #[must_use]
    pub fn current(&self, group: GroupId) -> Option<Period> {
        self.periods
            .read()
            .get(&group)
            .and_then(|ps| ps.iter().find(|p| p.active).cloned())
    }

    /// Every period of the group, in creation order.
    #[must_use]
    pub fn periods(&self, group: GroupId) -> Vec<Period> {
        self.periods.read().get(&group).cloned().unwrap_or_default()
    }

    /// Hook for a student joining `group`: opens their wallet in the current
    /// period. Idempotent. Returns `None` when the group has no active period.
    pub fn enroll(&self, group: GroupId, student: UserId) -> Result<Option<WalletId>> {
        if !self.roster.is_member(group, student) {
            return Err(EducoinError::NotEligible { student, group });
        }
        // Held across ensure_wallet so a concurrent activation can't slip
        // in between reading the period and opening the wallet.
        let table = self.periods.read();
        let Some(period) = table
            .get(&group)
            .and_then(|ps| ps.iter().find(|p| p.active))
        else {
            return Ok(None);
        };
        let (id, created) = self
            .store
            .ensure_wallet(WalletKey::new(student, group, period.id), self.clock.now());
        if created {
            info!(group = %group, student = %student, wallet = %id, "Enrolled student");
        }
        Ok(Some(id))
    }
}

//! Accounting periods.
//!
//! A group runs one period at a time. Wallets are scoped to a period, so
//! activating a new period starts every member from zero while the old
//! wallets stay behind as an archive.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{GroupId, PeriodId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Period {
    pub id: PeriodId,
    pub group: GroupId,
    /// Human label, e.g. `"2025-1"`.
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    /// At most one period per group has this set.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

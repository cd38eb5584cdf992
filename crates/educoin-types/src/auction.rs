//! # Auction and Bid: the escrow primitives
//!
//! A teacher opens an auction for their group; students bid coins. Every
//! accepted bid reserves (locks) its amount in the bidder's wallet until
//! the auction closes.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐  close / expiry   ┌────────┐
//!   │ ACTIVE ├──────────────────▶│ CLOSED │
//!   └────────┘                   └────────┘
//! ```
//!
//! Bids follow their own monotonic lifecycle:
//!
//! ```text
//!   ┌──────┐  winner pays   ┌─────┐
//!   │ OPEN ├───────────────▶│ WON │
//!   └──┬───┘                └─────┘
//!      │ outbid at close / auction deleted
//!      ▼
//!   ┌──────────┐
//!   │ REFUNDED │
//!   └──────────┘
//! ```
//!
//! The bid status doubles as the per-bid "settled" flag: settlement only
//! touches `OPEN` bids, so replaying it never double-charges a wallet.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuctionId, BidId, EducoinError, GroupId, PeriodId, Result, UserId};

/// Lifecycle state of an auction. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionState {
    Active,
    Closed,
}

impl AuctionState {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Active, Self::Closed))
    }
}

impl fmt::Display for AuctionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// What the winner receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    /// Grade improvement.
    Grade,
    /// Academic benefit (extra time, dropped quiz, ...).
    Benefit,
    #[default]
    Other,
}

/// An auction run for one group within one period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auction {
    pub id: AuctionId,
    pub group: GroupId,
    /// Period active when the auction was created. Bids lock funds in
    /// wallets of this period.
    pub period: PeriodId,
    pub creator: UserId,
    pub title: String,
    pub description: String,
    pub reward_type: RewardType,
    /// Minimum opening bid.
    pub min_bid: u64,
    pub deadline: DateTime<Utc>,
    pub state: AuctionState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub winner: Option<UserId>,
    pub winning_amount: Option<u64>,
}

impl Auction {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == AuctionState::Active
    }

    /// Whether the auction accepts bids at `now`.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now < self.deadline
    }

    /// Whether the expiry sweep should close it at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now >= self.deadline
    }

    /// Transition to CLOSED, recording the result.
    ///
    /// # Errors
    /// Returns `InvalidState` if the auction is already closed.
    pub fn mark_closed(
        &mut self,
        at: DateTime<Utc>,
        winner: Option<(UserId, u64)>,
    ) -> Result<()> {
        if !self.state.can_transition_to(AuctionState::Closed) {
            return Err(EducoinError::invalid_state(format!(
                "Cannot transition {} from {} to CLOSED",
                self.id, self.state
            )));
        }
        self.state = AuctionState::Closed;
        self.closed_at = Some(at);
        self.winner = winner.map(|(student, _)| student);
        self.winning_amount = winner.map(|(_, amount)| amount);
        Ok(())
    }
}

/// Request to open an auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuction {
    pub group: GroupId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reward_type: RewardType,
    /// Falls back to the configured default when absent.
    pub min_bid: Option<u64>,
    pub deadline: DateTime<Utc>,
}

/// Result of closing an auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOutcome {
    pub auction: AuctionId,
    /// Winning student and the amount spent.
    pub winner: Option<(UserId, u64)>,
    /// Losing bidders and the amounts released back to them.
    pub refunded: Vec<(UserId, u64)>,
    /// `true` when the auction was already closed before this call.
    pub already_closed: bool,
}

/// Editable fields of an active auction. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuctionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub reward_type: Option<RewardType>,
    pub deadline: Option<DateTime<Utc>>,
}

/// Settlement status of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    /// Funds locked, auction unresolved.
    Open,
    /// Winning bid: the locked amount was spent.
    Won,
    /// Losing (or cancelled) bid: the locked amount was released.
    Refunded,
}

impl BidStatus {
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Open, Self::Won | Self::Refunded))
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Won => write!(f, "WON"),
            Self::Refunded => write!(f, "REFUNDED"),
        }
    }
}

/// A student's single bid on an auction. Its amount only ever goes up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bid {
    pub id: BidId,
    pub auction: AuctionId,
    pub student: UserId,
    pub amount: u64,
    /// The student, or the teacher who entered the bid for them.
    pub placed_by: UserId,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Engine-wide acceptance counter at the moment the bid reached its
    /// current amount. Lower wins ties.
    pub accepted_seq: u64,
    pub status: BidStatus,
}

impl Bid {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == BidStatus::Open
    }

    /// Raise the amount. The new amount must be strictly higher.
    ///
    /// # Errors
    /// Returns `InvalidState` if the bid is settled or the amount doesn't increase.
    pub fn raise(
        &mut self,
        amount: u64,
        placed_by: UserId,
        at: DateTime<Utc>,
        accepted_seq: u64,
    ) -> Result<()> {
        if !self.is_open() {
            return Err(EducoinError::invalid_state(format!(
                "Bid {} is {}, cannot be raised",
                self.id, self.status
            )));
        }
        if amount <= self.amount {
            return Err(EducoinError::invalid_state(format!(
                "Bid {} can only increase: {} -> {amount}",
                self.id, self.amount
            )));
        }
        self.amount = amount;
        self.placed_by = placed_by;
        self.updated_at = at;
        self.accepted_seq = accepted_seq;
        Ok(())
    }

    /// Record the settlement result.
    ///
    /// # Errors
    /// Returns `InvalidState` if the bid was already settled.
    pub fn mark(&mut self, status: BidStatus) -> Result<()> {
        if !self.status.can_transition_to(status) {
            return Err(EducoinError::invalid_state(format!(
                "Cannot transition bid {} from {} to {status}",
                self.id, self.status
            )));
        }
        self.status = status;
        Ok(())
    }

    /// Ordering key for picking the winner: highest amount, then earliest.
    #[must_use]
    pub fn outranks(&self, other: &Self) -> bool {
        self.amount > other.amount
            || (self.amount == other.amount && self.accepted_seq < other.accepted_seq)
    }
}

/// Dummy auction for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Auction {
    pub fn dummy(creator: UserId, deadline: DateTime<Utc>) -> Self {
        Self {
            id: AuctionId::new(),
            group: GroupId::new(),
            period: PeriodId::new(),
            creator,
            title: "Extra credit".into(),
            description: String::new(),
            reward_type: RewardType::Grade,
            min_bid: crate::constants::DEFAULT_MIN_BID,
            deadline,
            state: AuctionState::Active,
            created_at: Utc::now(),
            closed_at: None,
            winner: None,
            winning_amount: None,
        }
    }
}

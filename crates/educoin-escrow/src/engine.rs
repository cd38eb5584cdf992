//! Auction table, lifecycle operations and read-only queries.
//!
//! Each auction and its bids live in one [`AuctionRow`] behind a
//! `parking_lot` mutex, acquired with the ledger's lock timeout. Every
//! state transition holds the row for its whole read-check-write, so the
//! "current high" a bid is validated against is always the last committed
//! one.
//!
//! Lock order, everywhere: auction row, then wallet rows by ascending
//! [`WalletId`](educoin_types::WalletId). Wallet Service calls only ever
//! hold a single wallet row, so no cycle is possible.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use educoin_ledger::Ledger;
use educoin_types::{
    Auction, AuctionId, AuctionState, AuctionUpdate, Bid, BidStatus, Capability, CloseOutcome,
    EducoinError, GroupId, NewAuction, Notification, Result, UserId,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::Authority;

/// An auction and its bids, keyed by student.
#[derive(Debug)]
pub(crate) struct AuctionRow {
    pub(crate) auction: Auction,
    pub(crate) bids: HashMap<UserId, Bid>,
    /// Set by `delete` before the row leaves the table, so a caller still
    /// holding the handle sees it as gone.
    pub(crate) deleted: bool,
}

impl AuctionRow {
    /// Current high bid: highest amount, earliest acceptance on ties.
    pub(crate) fn highest(&self) -> Option<&Bid> {
        self.bids.values().fold(None, |best, bid| match best {
            Some(b) if !bid.outranks(b) => Some(b),
            _ => Some(bid),
        })
    }

    /// Bids ordered highest first.
    pub(crate) fn ranked_bids(&self) -> Vec<Bid> {
        let mut bids: Vec<Bid> = self.bids.values().cloned().collect();
        bids.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.accepted_seq.cmp(&b.accepted_seq)));
        bids
    }

    /// The result as recorded on a closed auction.
    pub(crate) fn recorded_outcome(&self) -> CloseOutcome {
        let winner = self.auction.winner.zip(self.auction.winning_amount);
        let refunded = self
            .ranked_bids()
            .into_iter()
            .filter(|b| b.status == BidStatus::Refunded)
            .map(|b| (b.student, b.amount))
            .collect();
        CloseOutcome {
            auction: self.auction.id,
            winner,
            refunded,
            already_closed: true,
        }
    }
}

pub(crate) type AuctionHandle = Arc<Mutex<AuctionRow>>;

/// The Auction Escrow Engine.
pub struct AuctionEngine {
    pub(crate) ledger: Ledger,
    pub(crate) authority: Authority,
    auctions: RwLock<HashMap<AuctionId, AuctionHandle>>,
    seq: AtomicU64,
}

impl AuctionEngine {
    #[must_use]
    pub fn new(ledger: &Ledger) -> Self {
        Self {
            ledger: ledger.clone(),
            authority: Authority::new(Arc::clone(&ledger.roster)),
            auctions: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Next value of the engine-wide bid acceptance counter.
    pub(crate) fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn handle(&self, id: AuctionId) -> Result<AuctionHandle> {
        self.auctions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| EducoinError::not_found("auction", id))
    }

    /// Every auction handle, in id order.
    pub(crate) fn handles(&self) -> Vec<(AuctionId, AuctionHandle)> {
        let mut all: Vec<(AuctionId, AuctionHandle)> = self
            .auctions
            .read()
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub(crate) fn forget(&self, id: AuctionId) {
        self.auctions.write().remove(&id);
    }

    /// Acquire an auction row, waiting at most the ledger's lock timeout.
    pub(crate) fn lock_auction<'a>(
        &self,
        id: AuctionId,
        handle: &'a Mutex<AuctionRow>,
    ) -> Result<MutexGuard<'a, AuctionRow>> {
        let timeout = self.ledger.store.lock_timeout();
        let guard = handle.try_lock_for(timeout).ok_or_else(|| {
            warn!(auction = %id, timeout = ?timeout, "Auction lock timed out");
            EducoinError::LockTimeout {
                resource: id.to_string(),
            }
        })?;
        if guard.deleted {
            return Err(EducoinError::not_found("auction", id));
        }
        Ok(guard)
    }

    fn with_auction<T>(&self, id: AuctionId, f: impl FnOnce(&AuctionRow) -> T) -> Result<T> {
        let handle = self.handle(id)?;
        let guard = self.lock_auction(id, &handle)?;
        Ok(f(&guard))
    }

    /// Open an auction for `req.group` in the group's current period.
    pub fn create_auction(&self, actor: UserId, req: NewAuction) -> Result<Auction> {
        self.authority
            .require(actor, Capability::CreateAuction { group: req.group })?;

        let now = self.ledger.clock.now();
        let period = self.ledger.periods.current(req.group).ok_or_else(|| {
            EducoinError::invalid_state(format!("{} has no active period", req.group))
        })?;
        if req.deadline <= now {
            return Err(EducoinError::invalid_state(format!(
                "deadline {} is not in the future",
                req.deadline
            )));
        }
        let min_bid = req.min_bid.unwrap_or(self.ledger.config.default_min_bid);
        if min_bid == 0 {
            return Err(EducoinError::invalid_amount("min_bid must be positive"));
        }

        let auction = Auction {
            id: AuctionId::new(),
            group: req.group,
            period: period.id,
            creator: actor,
            title: req.title,
            description: req.description,
            reward_type: req.reward_type,
            min_bid,
            deadline: req.deadline,
            state: AuctionState::Active,
            created_at: now,
            closed_at: None,
            winner: None,
            winning_amount: None,
        };
        self.auctions.write().insert(
            auction.id,
            Arc::new(Mutex::new(AuctionRow {
                auction: auction.clone(),
                bids: HashMap::new(),
                deleted: false,
            })),
        );
        info!(
            auction = %auction.id,
            group = %auction.group,
            period = %auction.period,
            min_bid,
            deadline = %auction.deadline,
            "Auction created"
        );

        self.ledger.notifier.notify(Notification::AuctionOpened {
            auction: auction.id,
            group: auction.group,
            title: auction.title.clone(),
            deadline: auction.deadline,
            recipients: self.ledger.roster.members(auction.group),
        });
        Ok(auction)
    }

    /// Edit an active auction's descriptive fields or deadline.
    pub fn update_auction(
        &self,
        id: AuctionId,
        actor: UserId,
        update: AuctionUpdate,
    ) -> Result<Auction> {
        let handle = self.handle(id)?;
        let mut row = self.lock_auction(id, &handle)?;
        self.authority.require(
            actor,
            Capability::ManageAuction {
                creator: row.auction.creator,
            },
        )?;
        if !row.auction.is_active() {
            return Err(EducoinError::invalid_state(format!(
                "{id} is {}, only active auctions can be edited",
                row.auction.state
            )));
        }
        if let Some(deadline) = update.deadline {
            if deadline <= self.ledger.clock.now() {
                return Err(EducoinError::invalid_state(format!(
                    "deadline {deadline} is not in the future"
                )));
            }
        }

        let auction = &mut row.auction;
        if let Some(title) = update.title {
            auction.title = title;
        }
        if let Some(description) = update.description {
            auction.description = description;
        }
        if let Some(reward_type) = update.reward_type {
            auction.reward_type = reward_type;
        }
        if let Some(deadline) = update.deadline {
            auction.deadline = deadline;
        }
        info!(auction = %id, actor = %actor, "Auction updated");
        Ok(auction.clone())
    }

    pub fn auction(&self, id: AuctionId) -> Result<Auction> {
        self.with_auction(id, |row| row.auction.clone())
    }

    /// A group's auctions, newest first.
    pub fn auctions_for_group(&self, group: GroupId) -> Result<Vec<Auction>> {
        let mut auctions = Vec::new();
        for (id, handle) in self.handles() {
            let row = match self.lock_auction(id, &handle) {
                Ok(row) => row,
                Err(EducoinError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            };
            if row.auction.group == group {
                auctions.push(row.auction.clone());
            }
        }
        auctions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(auctions)
    }

    pub fn highest_bid(&self, id: AuctionId) -> Result<Option<Bid>> {
        self.with_auction(id, |row| row.highest().cloned())
    }

    /// All bids on an auction, highest first.
    pub fn bids(&self, id: AuctionId) -> Result<Vec<Bid>> {
        self.with_auction(id, AuctionRow::ranked_bids)
    }

    /// Every bid a student holds, across auctions, newest first.
    pub fn bids_for_student(&self, student: UserId) -> Result<Vec<Bid>> {
        let mut bids = Vec::new();
        for (id, handle) in self.handles() {
            let row = match self.lock_auction(id, &handle) {
                Ok(row) => row,
                Err(EducoinError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            };
            if let Some(bid) = row.bids.get(&student) {
                bids.push(bid.clone());
            }
        }
        bids.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.accepted_seq.cmp(&a.accepted_seq)));
        Ok(bids)
    }

    /// Winner and refunds of a closed auction; `None` while it is active.
    pub fn close_outcome(&self, id: AuctionId) -> Result<Option<CloseOutcome>> {
        self.with_auction(id, |row| {
            (!row.auction.is_active()).then(|| row.recorded_outcome())
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use educoin_types::BidId;

    use super::*;

    fn bid(auction: &Auction, amount: u64, seq: u64) -> Bid {
        let student = UserId::new();
        Bid {
            id: BidId::new(),
            auction: auction.id,
            student,
            amount,
            placed_by: student,
            placed_at: auction.created_at,
            updated_at: auction.created_at,
            accepted_seq: seq,
            status: BidStatus::Open,
        }
    }

    fn row_with(amounts: &[(u64, u64)]) -> AuctionRow {
        let auction = Auction::dummy(UserId::new(), Utc::now() + Duration::hours(1));
        let bids = amounts
            .iter()
            .map(|&(amount, seq)| {
                let b = bid(&auction, amount, seq);
                (b.student, b)
            })
            .collect();
        AuctionRow {
            auction,
            bids,
            deleted: false,
        }
    }

    #[test]
    fn highest_prefers_amount_then_earliest() {
        let row = row_with(&[(10, 1), (30, 4), (30, 2), (20, 3)]);
        let high = row.highest().unwrap();
        assert_eq!((high.amount, high.accepted_seq), (30, 2));

        let ranked: Vec<(u64, u64)> = row
            .ranked_bids()
            .iter()
            .map(|b| (b.amount, b.accepted_seq))
            .collect();
        assert_eq!(ranked, vec![(30, 2), (30, 4), (20, 3), (10, 1)]);
    }

    #[test]
    fn empty_row_has_no_high() {
        assert!(row_with(&[]).highest().is_none());
    }

    #[test]
    fn recorded_outcome_lists_refunds_highest_first() {
        let mut row = row_with(&[(5, 1), (9, 2), (7, 3)]);
        let winner = row.highest().unwrap().student;
        for b in row.bids.values_mut() {
            b.status = if b.student == winner {
                BidStatus::Won
            } else {
                BidStatus::Refunded
            };
        }
        row.auction.mark_closed(Utc::now(), Some((winner, 9))).unwrap();

        let outcome = row.recorded_outcome();
        assert!(outcome.already_closed);
        assert_eq!(outcome.winner, Some((winner, 9)));
        let amounts: Vec<u64> = outcome.refunded.iter().map(|(_, a)| *a).collect();
        assert_eq!(amounts, vec![7, 5]);
    }
}

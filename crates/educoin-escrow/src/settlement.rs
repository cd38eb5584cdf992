//! Close-and-settle, deletion and the expiry sweep.
//!
//! Settlement touches one wallet per open bid. Every wallet row is locked
//! (ascending id) and checked before the first one is changed, so a close
//! either settles every bid or changes nothing and leaves the auction
//! active. Bid status is the per-bid settled flag: only `OPEN` bids are
//! settled, so running settlement again on a closed auction is a no-op.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use educoin_types::{
    AuctionId, BidStatus, Capability, CloseOutcome, EducoinError, Notification, Result, UserId,
    WalletId, WalletKey, constants,
};
use tracing::{error, info, warn};

use crate::AuctionEngine;
use crate::engine::{AuctionHandle, AuctionRow};

/// One wallet movement of a settlement.
struct Movement {
    wallet: WalletId,
    student: UserId,
    amount: u64,
    wins: bool,
}

/// What a settlement pass changed.
#[derive(Default)]
struct Settled {
    winner: Option<(UserId, u64)>,
    refunded: Vec<(UserId, u64)>,
}

impl AuctionEngine {
    /// Close an auction: the highest bid pays, every other bid is released.
    ///
    /// Closing an already closed auction changes nothing and returns the
    /// recorded result with `already_closed` set.
    pub fn close(&self, auction: AuctionId, actor: UserId) -> Result<CloseOutcome> {
        let handle = self.handle(auction)?;
        let mut row = self.lock_auction(auction, &handle)?;
        self.authority.require(
            actor,
            Capability::ManageAuction {
                creator: row.auction.creator,
            },
        )?;
        let (outcome, notice) = self.close_locked(&mut row)?;
        drop(row);

        if let Some(notice) = notice {
            self.ledger.notifier.notify(notice);
        }
        Ok(outcome)
    }

    /// Close every active auction whose deadline has passed.
    ///
    /// Each auction is closed on its own. One whose auction or wallet rows
    /// can't be locked in time is skipped and picked up by the next sweep.
    /// One whose settlement faults stays active and is logged. Neither stops
    /// the sweep: every committed close is returned and notified.
    pub fn close_expired(&self) -> Result<Vec<CloseOutcome>> {
        let now = self.ledger.clock.now();
        let mut outcomes = Vec::new();
        let mut notices = Vec::new();

        for (id, handle) in self.handles() {
            match self.close_if_expired(id, &handle, now) {
                Ok(Some((outcome, notice))) => {
                    outcomes.push(outcome);
                    notices.extend(notice);
                }
                Ok(None) | Err(EducoinError::NotFound { .. }) => {}
                Err(err) if err.is_fault() => {
                    error!(fatal = true, auction = %id, error = %err, "Expiry sweep left auction active");
                }
                Err(err) => {
                    warn!(auction = %id, error = %err, "Expiry sweep skipped auction");
                }
            }
        }

        for notice in notices {
            self.ledger.notifier.notify(notice);
        }
        Ok(outcomes)
    }

    fn close_if_expired(
        &self,
        id: AuctionId,
        handle: &AuctionHandle,
        now: DateTime<Utc>,
    ) -> Result<Option<(CloseOutcome, Option<Notification>)>> {
        let mut row = self.lock_auction(id, handle)?;
        if !row.auction.is_expired_at(now) {
            return Ok(None);
        }
        let closed = self.close_locked(&mut row)?;
        info!(auction = %id, "Auction expired");
        Ok(Some(closed))
    }

    /// Delete an active auction, releasing every bid's reservation.
    /// Returns the released amounts.
    pub fn delete(&self, auction: AuctionId, actor: UserId) -> Result<Vec<(UserId, u64)>> {
        let handle = self.handle(auction)?;
        let mut row = self.lock_auction(auction, &handle)?;
        self.authority.require(
            actor,
            Capability::ManageAuction {
                creator: row.auction.creator,
            },
        )?;
        if !row.auction.is_active() {
            return Err(EducoinError::invalid_state(format!(
                "{auction} is {}, closed auctions can't be deleted",
                row.auction.state
            )));
        }

        let settled = self.settle_open_bids(&mut row, None, self.ledger.clock.now())?;
        row.deleted = true;
        drop(row);
        self.forget(auction);

        info!(auction = %auction, actor = %actor, refunded = settled.refunded.len(), "Auction deleted");
        Ok(settled.refunded)
    }

    /// Check that every wallet's `locked` covers the open bids it backs
    /// across all active auctions.
    pub fn verify_escrow(&self) -> Result<()> {
        let handles = self.handles();
        // Hold every auction row (in id order) so no bid moves while the
        // wallets are read.
        let mut rows = Vec::with_capacity(handles.len());
        for (id, handle) in &handles {
            match self.lock_auction(*id, handle) {
                Ok(row) => rows.push(row),
                Err(EducoinError::NotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }

        let mut reserved: HashMap<WalletId, u64> = HashMap::new();
        for row in &rows {
            if !row.auction.is_active() {
                continue;
            }
            for bid in row.bids.values().filter(|b| b.is_open()) {
                let wallet = self.bid_wallet(row, bid.student)?;
                let total = reserved.entry(wallet).or_default();
                *total = total.saturating_add(bid.amount);
            }
        }

        for (wallet, total) in reserved {
            let locked = self.ledger.store.balance(wallet)?.locked;
            if total > locked {
                error!(fatal = true, wallet = %wallet, reserved = total, locked, "Escrow under-reserved");
                return Err(EducoinError::fault(format!(
                    "{wallet}: open bids total {total} but only {locked} locked"
                )));
            }
        }
        Ok(())
    }

    /// Settle and close a locked, possibly already closed, auction row.
    fn close_locked(&self, row: &mut AuctionRow) -> Result<(CloseOutcome, Option<Notification>)> {
        let now = self.ledger.clock.now();

        if !row.auction.is_active() {
            // Replay: finishes any bid a previous pass left open.
            let winner = row.auction.winner;
            self.settle_open_bids(row, winner, now)?;
            return Ok((row.recorded_outcome(), None));
        }

        let winner = row.highest().map(|b| (b.student, b.amount));
        let settled = self.settle_open_bids(row, winner.map(|(student, _)| student), now)?;
        row.auction.mark_closed(now, winner)?;

        let auction = row.auction.id;
        info!(
            auction = %auction,
            winner = ?winner.map(|(student, _)| student.to_string()),
            amount = ?winner.map(|(_, amount)| amount),
            refunded = settled.refunded.len(),
            "Auction closed"
        );

        let mut recipients: Vec<UserId> = row.bids.keys().copied().collect();
        recipients.sort();
        let notice = Notification::AuctionClosed {
            auction,
            winner: winner.map(|(student, _)| student),
            winning_amount: winner.map(|(_, amount)| amount),
            recipients,
        };
        let outcome = CloseOutcome {
            auction,
            winner,
            refunded: settled.refunded,
            already_closed: false,
        };
        Ok((outcome, Some(notice)))
    }

    /// The wallet a bid's coins are reserved in.
    fn bid_wallet(&self, row: &AuctionRow, student: UserId) -> Result<WalletId> {
        let key = WalletKey::new(student, row.auction.group, row.auction.period);
        self.ledger.store.find(&key).ok_or_else(|| {
            error!(fatal = true, auction = %row.auction.id, student = %student, "Bid has no wallet");
            EducoinError::fault(format!(
                "{}: bid by {student} has no wallet",
                row.auction.id
            ))
        })
    }

    /// Settle every open bid: `winner`'s bid pays, the rest are released.
    /// All wallets are checked before any is changed.
    fn settle_open_bids(
        &self,
        row: &mut AuctionRow,
        winner: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Settled> {
        let mut movements = Vec::new();
        for bid in row.bids.values().filter(|b| b.is_open()) {
            movements.push(Movement {
                wallet: self.bid_wallet(row, bid.student)?,
                student: bid.student,
                amount: bid.amount,
                wins: Some(bid.student) == winner,
            });
        }
        movements.sort_by_key(|m| m.wallet);

        let handles = movements
            .iter()
            .map(|m| self.ledger.store.row(m.wallet))
            .collect::<Result<Vec<_>>>()?;
        let mut guards = Vec::with_capacity(handles.len());
        for (m, handle) in movements.iter().zip(&handles) {
            guards.push(self.ledger.store.lock_row(m.wallet, handle)?);
        }

        for (m, guard) in movements.iter().zip(&guards) {
            let checked = if m.wins {
                guard.check_settle(m.amount)
            } else {
                guard.check_unlock(m.amount)
            };
            if let Err(err) = checked {
                error!(
                    fatal = true,
                    auction = %row.auction.id,
                    wallet = %m.wallet,
                    amount = m.amount,
                    error = %err,
                    "Settlement aborted, nothing applied"
                );
                return Err(err);
            }
        }

        let mut settled = Settled::default();
        for (m, guard) in movements.iter().zip(guards.iter_mut()) {
            if m.wins {
                guard.settle(m.amount, constants::AUCTION_PAYMENT_REASON, now)?;
                settled.winner = Some((m.student, m.amount));
            } else {
                guard.unlock(m.amount)?;
                settled.refunded.push((m.student, m.amount));
            }
        }
        drop(guards);

        for m in &movements {
            if let Some(bid) = row.bids.get_mut(&m.student) {
                bid.mark(if m.wins {
                    BidStatus::Won
                } else {
                    BidStatus::Refunded
                })?;
            }
        }
        settled
            .refunded
            .sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(settled)
    }
}

//! Bid placement: validate against the current high, reserve the delta,
//! record the bid. All under the auction row lock.

use educoin_types::{
    AuctionId, Bid, BidId, BidStatus, Capability, EducoinError, Notification, Result, UserId,
    WalletKey,
};
use tracing::info;

use crate::AuctionEngine;

impl AuctionEngine {
    /// Place `student`'s first bid, or raise their existing one, to `amount`.
    ///
    /// A first bid must reach the auction's `min_bid` when nobody has bid
    /// yet, and beat the current high otherwise. A raise must beat both the
    /// student's own previous amount and the current high. Only the
    /// difference to the previous amount is locked.
    ///
    /// On any error the bid and the wallet are left as they were.
    pub fn place_or_raise_bid(
        &self,
        auction: AuctionId,
        student: UserId,
        amount: u64,
        actor: UserId,
    ) -> Result<Bid> {
        if amount == 0 {
            return Err(EducoinError::invalid_amount("bid must be positive"));
        }

        let handle = self.handle(auction)?;
        let mut row = self.lock_auction(auction, &handle)?;
        let now = self.ledger.clock.now();

        if !row.auction.is_open_at(now) {
            return Err(EducoinError::invalid_state(format!(
                "{auction} is not accepting bids ({}, deadline {})",
                row.auction.state, row.auction.deadline
            )));
        }
        let group = row.auction.group;
        self.authority
            .require(actor, Capability::PlaceBidAs { student, group })?;
        if !self.ledger.roster.is_member(group, student) {
            return Err(EducoinError::NotEligible { student, group });
        }

        let current = self
            .ledger
            .periods
            .current(group)
            .ok_or(EducoinError::NoActiveWallet { student, group })?;
        if current.id != row.auction.period {
            return Err(EducoinError::invalid_state(format!(
                "{auction} belongs to {}, but {group} is now in {}",
                row.auction.period, current.id
            )));
        }
        let wallet = self
            .ledger
            .store
            .find(&WalletKey::new(student, group, current.id))
            .ok_or(EducoinError::NoActiveWallet { student, group })?;

        let minimum = row
            .highest()
            .map_or(row.auction.min_bid, |high| high.amount.saturating_add(1));
        if amount < minimum {
            return Err(EducoinError::BidTooLow {
                minimum,
                offered: amount,
            });
        }

        // Build the new bid before touching the wallet, so a failure here
        // leaves nothing to roll back.
        let seq = self.next_seq();
        let previous = row.bids.get(&student).map(|b| b.amount);
        let bid = match row.bids.get(&student) {
            Some(existing) => {
                let mut raised = existing.clone();
                raised.raise(amount, actor, now, seq)?;
                raised
            }
            None => Bid {
                id: BidId::new(),
                auction,
                student,
                amount,
                placed_by: actor,
                placed_at: now,
                updated_at: now,
                accepted_seq: seq,
                status: BidStatus::Open,
            },
        };
        let delta = amount - previous.unwrap_or(0);

        {
            let wallet_row = self.ledger.store.row(wallet)?;
            let mut wallet_guard = self.ledger.store.lock_row(wallet, &wallet_row)?;
            wallet_guard.lock(delta)?;
        }
        row.bids.insert(student, bid.clone());

        info!(
            auction = %auction,
            student = %student,
            actor = %actor,
            amount,
            locked_delta = delta,
            seq,
            "Bid accepted"
        );

        let teacher = self
            .ledger
            .roster
            .teacher_of(group)
            .unwrap_or(row.auction.creator);
        drop(row);

        self.ledger.notifier.notify(Notification::BidPlaced {
            auction,
            teacher,
            student,
            amount,
            raised: previous.is_some(),
        });
        Ok(bid)
    }
}

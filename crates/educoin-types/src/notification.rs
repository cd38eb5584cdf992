//! Events pushed to users after a successful operation.
//!
//! Notifications are emitted only once the change they describe is
//! committed and every lock is released. Delivery is best-effort: a lost
//! notification never rolls anything back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuctionId, GroupId, UserId, WalletId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A new auction is open. Sent to every student of the group.
    AuctionOpened {
        auction: AuctionId,
        group: GroupId,
        title: String,
        deadline: DateTime<Utc>,
        recipients: Vec<UserId>,
    },
    /// A bid was placed or raised. Sent to the auction's creator.
    BidPlaced {
        auction: AuctionId,
        teacher: UserId,
        student: UserId,
        amount: u64,
        raised: bool,
    },
    /// A student earned coins. Sent to the student.
    CoinsEarned {
        student: UserId,
        wallet: WalletId,
        amount: u64,
        reason: String,
        new_balance: u64,
    },
    /// An auction closed. Sent to every bidder.
    AuctionClosed {
        auction: AuctionId,
        winner: Option<UserId>,
        winning_amount: Option<u64>,
        recipients: Vec<UserId>,
    },
}

impl Notification {
    /// Users this notification is addressed to.
    #[must_use]
    pub fn recipients(&self) -> Vec<UserId> {
        match self {
            Self::AuctionOpened { recipients, .. } | Self::AuctionClosed { recipients, .. } => {
                recipients.clone()
            }
            Self::BidPlaced { teacher, .. } => vec![*teacher],
            Self::CoinsEarned { student, .. } => vec![*student],
        }
    }
}

//! Globally unique identifiers used throughout Educoin.
//!
//! All entity IDs wrap a UUIDv7, so they sort by creation time. The
//! escrow engine relies on that ordering when it acquires several wallet
//! locks at once (ascending [`WalletId`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// A student, teacher, or admin account.
    UserId,
    "user"
);

uuid_id!(
    /// A classroom group: the scope of auctions and wallets.
    GroupId,
    "group"
);

uuid_id!(
    /// A group's accounting period.
    PeriodId,
    "period"
);

uuid_id!(
    /// One wallet per (student, group, period).
    WalletId,
    "wallet"
);

uuid_id!(
    /// An auction run by a teacher for their group.
    AuctionId,
    "auction"
);

uuid_id!(
    /// A student's single bid on an auction.
    BidId,
    "bid"
);

uuid_id!(
    /// An immutable ledger entry.
    TransactionId,
    "tx"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(WalletId::new(), WalletId::new());
    }

    #[test]
    fn ids_sort_by_creation() {
        let a = WalletId::new();
        let b = WalletId::new();
        assert!(a < b);
    }

    #[test]
    fn display_carries_prefix() {
        let id = AuctionId::from_bytes([0u8; 16]);
        assert_eq!(
            id.to_string(),
            "auction:00000000-0000-0000-0000-000000000000"
        );
        assert!(GroupId::new().to_string().starts_with("group:"));
    }

    #[test]
    fn serde_is_transparent_uuid() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}

//! # educoin-types
//!
//! Shared types, errors, and configuration for the **Educoin** ledger.
//!
//! This crate is the leaf dependency of the workspace. Every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`GroupId`], [`PeriodId`], [`WalletId`], [`AuctionId`], [`BidId`], [`TransactionId`]
//! - **Wallet model**: [`Wallet`], [`WalletKey`], [`WalletBalance`]
//! - **Transaction model**: [`CoinTransaction`], [`TransactionKind`]
//! - **Period model**: [`Period`]
//! - **Auction model**: [`Auction`], [`AuctionState`], [`Bid`], [`BidStatus`], [`RewardType`]
//! - **Access model**: [`Capability`]
//! - **Notifications**: [`Notification`]
//! - **Configuration**: [`LedgerConfig`], [`RewardPolicy`]
//! - **Errors**: [`EducoinError`] with `EC_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod access;
pub mod auction;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod notification;
pub mod period;
pub mod transaction;
pub mod wallet;

pub use access::*;
pub use auction::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use notification::*;
pub use period::*;
pub use transaction::*;
pub use wallet::*;

// Constants are accessed via `educoin_types::constants::FOO`
// (not re-exported to avoid name collisions).

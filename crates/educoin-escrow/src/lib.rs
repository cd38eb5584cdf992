//! # educoin-escrow
//!
//! **Auction Escrow Engine**: ascending-price auctions paid in Educoins.
//!
//! ## Lifecycle
//!
//! 1. A teacher opens an auction for their group ([`AuctionEngine::create_auction`])
//! 2. Students (or their teacher on their behalf) bid; each accepted bid
//!    locks its coins in the bidder's wallet ([`AuctionEngine::place_or_raise_bid`])
//! 3. On close, the highest bid is settled (locked coins spent) and every
//!    other bid is released, all or nothing ([`AuctionEngine::close`])
//! 4. Past-deadline auctions are closed by [`AuctionEngine::close_expired`]
//!
//! An active auction can instead be deleted, which releases every bid.

pub mod authority;
mod bidding;
pub mod engine;
mod settlement;

pub use authority::Authority;
pub use engine::AuctionEngine;

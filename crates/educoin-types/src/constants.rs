//! System-wide constants for the Educoin ledger.

/// Opening minimum for an auction that doesn't set its own `min_bid`.
pub const DEFAULT_MIN_BID: u64 = 1;

/// How long a call waits for a wallet or auction row lock (milliseconds).
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2000;

/// Default page size for transaction history queries.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// A grade at or above this share of the maximum earns the bonus (percent).
pub const DEFAULT_BONUS_THRESHOLD_PERCENT: u32 = 90;

/// Bonus paid on top of the base reward (percent of base).
pub const DEFAULT_BONUS_RATE_PERCENT: u32 = 10;

/// Domain separator for the transaction hash chain.
pub const TRANSACTION_DIGEST_DOMAIN: &[u8] = b"educoin:tx:v1:";

/// Reason recorded on the winner's `spend` transaction at settlement.
pub const AUCTION_PAYMENT_REASON: &str = "auction payment";

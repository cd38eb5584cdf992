//! Immutable ledger entries.
//!
//! Every balance mutation appends exactly one [`CoinTransaction`] to the
//! wallet's journal. Entries are hash-chained per wallet: each one commits
//! to its predecessor's digest, so editing or dropping an entry breaks
//! every digest after it.
//!
//! Locks and unlocks are reservations, not movements, and have no entry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{TransactionId, WalletId, constants};

/// What a transaction did to the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Coins credited (grading reward, manual award).
    Earn,
    /// Coins debited (auction settlement, withdrawal).
    Spend,
    /// Balance zeroed at period rollover; amount is the prior balance.
    Reset,
}

impl TransactionKind {
    fn tag(self) -> u8 {
        match self {
            Self::Earn => 0,
            Self::Spend => 1,
            Self::Reset => 2,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Earn => write!(f, "EARN"),
            Self::Spend => write!(f, "SPEND"),
            Self::Reset => write!(f, "RESET"),
        }
    }
}

/// An append-only journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoinTransaction {
    pub id: TransactionId,
    pub wallet: WalletId,
    /// Position in the wallet's journal, starting at 0.
    pub sequence: u64,
    pub kind: TransactionKind,
    /// Always positive; `kind` carries the direction.
    pub amount: u64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    /// Digest of the previous entry (all zeros for the first).
    pub prev_digest: [u8; 32],
    pub digest: [u8; 32],
}

impl CoinTransaction {
    /// Build the next entry of a journal whose last digest is `prev_digest`.
    #[must_use]
    pub fn chained(
        wallet: WalletId,
        sequence: u64,
        kind: TransactionKind,
        amount: u64,
        reason: &str,
        created_at: DateTime<Utc>,
        prev_digest: [u8; 32],
    ) -> Self {
        let mut tx = Self {
            id: TransactionId::new(),
            wallet,
            sequence,
            kind,
            amount,
            reason: reason.to_string(),
            created_at,
            prev_digest,
            digest: [0u8; 32],
        };
        tx.digest = tx.compute_digest();
        tx
    }

    /// SHA-256 over the domain tag, the previous digest, and every field
    /// except `id` and `digest`.
    #[must_use]
    pub fn compute_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(constants::TRANSACTION_DIGEST_DOMAIN);
        hasher.update(self.prev_digest);
        hasher.update(self.wallet.0.as_bytes());
        hasher.update(self.sequence.to_le_bytes());
        hasher.update([self.kind.tag()]);
        hasher.update(self.amount.to_le_bytes());
        hasher.update((self.reason.len() as u64).to_le_bytes());
        hasher.update(self.reason.as_bytes());
        hasher.update(self.created_at.timestamp_micros().to_le_bytes());

        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    /// Whether the stored digest matches the entry's contents.
    #[must_use]
    pub fn verify_digest(&self) -> bool {
        self.compute_digest() == self.digest
    }

    /// Short hex form of the digest, for logs.
    #[must_use]
    pub fn digest_short(&self) -> String {
        hex::encode(&self.digest[..8])
    }

    /// Effect of this entry on the balance, given the balance before it.
    #[must_use]
    pub fn apply_to(&self, balance: i128) -> i128 {
        match self.kind {
            TransactionKind::Earn => balance + i128::from(self.amount),
            TransactionKind::Spend | TransactionKind::Reset => balance - i128::from(self.amount),
        }
    }
}

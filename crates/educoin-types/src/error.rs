//! Error types for the Educoin ledger.
//!
//! All errors use the `EC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Wallet errors
//! - 2xx: Auction / bid errors
//! - 3xx: Access errors
//! - 4xx: Concurrency errors
//! - 9xx: General / internal errors

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GroupId, UserId};

/// Central error enum for all Educoin operations.
#[derive(Debug, Error)]
pub enum EducoinError {
    // =================================================================
    // Wallet Errors (1xx)
    // =================================================================
    /// Not enough spendable coins for the requested lock or withdrawal.
    #[error("EC_ERR_100: Insufficient funds: need {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    /// Zero amount, or an amount that would overflow the wallet.
    #[error("EC_ERR_101: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The student has no wallet in the group's active period.
    #[error("EC_ERR_102: No active wallet for {student} in {group}")]
    NoActiveWallet { student: UserId, group: GroupId },

    // =================================================================
    // Auction / Bid Errors (2xx)
    // =================================================================
    /// Operation not allowed in the entity's current state.
    #[error("EC_ERR_200: Invalid state: {reason}")]
    InvalidState { reason: String },

    /// The bid doesn't beat the current high (or the opening minimum).
    #[error("EC_ERR_201: Bid too low: need at least {minimum}, offered {offered}")]
    BidTooLow { minimum: u64, offered: u64 },

    // =================================================================
    // Access Errors (3xx)
    // =================================================================
    /// The actor doesn't hold the capability the operation requires.
    #[error("EC_ERR_300: Permission denied: {actor} lacks {capability}")]
    PermissionDenied { actor: UserId, capability: String },

    /// The student is not on the group's roster.
    #[error("EC_ERR_301: {student} is not a member of {group}")]
    NotEligible { student: UserId, group: GroupId },

    // =================================================================
    // Concurrency Errors (4xx)
    // =================================================================
    /// A row lock wasn't acquired within the configured timeout.
    /// Nothing was applied.
    #[error("EC_ERR_400: Timed out waiting for lock on {resource}")]
    LockTimeout { resource: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// The referenced entity doesn't exist.
    #[error("EC_ERR_900: {entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A ledger invariant would be (or was) violated. Indicates a bug.
    #[error("EC_ERR_901: Internal consistency fault: {reason}")]
    InternalConsistencyFault { reason: String },

    /// Configuration error (invalid config file, bad values, etc.).
    #[error("EC_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// Serialization / deserialization error.
    #[error("EC_ERR_903: Serialization error: {0}")]
    Serialization(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, EducoinError>;

/// Coarse error classification reported to the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InsufficientFunds,
    InvalidState,
    PermissionDenied,
    NotEligible,
    NoActiveWallet,
    NotFound,
    InternalConsistencyFault,
    /// Malformed request: bad amount, bid too low, bad config.
    InvalidInput,
    /// Transient: retrying may succeed.
    Unavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::InvalidState => "INVALID_STATE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotEligible => "NOT_ELIGIBLE",
            Self::NoActiveWallet => "NO_ACTIVE_WALLET",
            Self::NotFound => "NOT_FOUND",
            Self::InternalConsistencyFault => "INTERNAL_CONSISTENCY_FAULT",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Unavailable => "UNAVAILABLE",
        };
        f.write_str(s)
    }
}

impl EducoinError {
    /// Classify this error for the caller.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NotEligible { .. } => ErrorKind::NotEligible,
            Self::NoActiveWallet { .. } => ErrorKind::NoActiveWallet,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InternalConsistencyFault { .. } => ErrorKind::InternalConsistencyFault,
            Self::InvalidAmount { .. }
            | Self::BidTooLow { .. }
            | Self::Configuration(_)
            | Self::Serialization(_) => ErrorKind::InvalidInput,
            Self::LockTimeout { .. } => ErrorKind::Unavailable,
        }
    }

    /// `true` when the error signals a bug rather than a user mistake.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::InternalConsistencyFault { .. })
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            reason: reason.into(),
        }
    }

    pub fn fault(reason: impl Into<String>) -> Self {
        Self::InternalConsistencyFault {
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for EducoinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_display() {
        let err = EducoinError::InsufficientFunds {
            needed: 80,
            available: 50,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("EC_ERR_100"), "Got: {msg}");
        assert!(msg.contains("80"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn all_errors_have_ec_err_prefix() {
        let errors: Vec<EducoinError> = vec![
            EducoinError::invalid_state("closed"),
            EducoinError::BidTooLow {
                minimum: 11,
                offered: 10,
            },
            EducoinError::NotEligible {
                student: UserId::new(),
                group: GroupId::new(),
            },
            EducoinError::LockTimeout {
                resource: "wallet".into(),
            },
            EducoinError::fault("unlock underflow"),
            EducoinError::Configuration("bad".into()),
        ];
        for err in errors {
            let msg = err.to_string();
            assert!(msg.starts_with("EC_ERR_"), "Error missing prefix: {msg}");
        }
    }

    #[test]
    fn kinds_follow_propagation_policy() {
        assert_eq!(
            EducoinError::invalid_state("x").kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            EducoinError::BidTooLow {
                minimum: 2,
                offered: 1
            }
            .kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            EducoinError::LockTimeout {
                resource: "auction".into()
            }
            .kind(),
            ErrorKind::Unavailable
        );
        assert!(EducoinError::fault("x").is_fault());
        assert!(!EducoinError::invalid_state("x").is_fault());
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::InternalConsistencyFault.to_string(),
            "INTERNAL_CONSISTENCY_FAULT"
        );
        assert_eq!(ErrorKind::NoActiveWallet.to_string(), "NO_ACTIVE_WALLET");
    }
}

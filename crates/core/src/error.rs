//! Domain error model.

use thiserror::Error;

use crate::id::SplitId;
use crate::money::{Currency, Money};

/// Result type used across the domain layer.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A monetary value was malformed, non-positive where positivity is
    /// required, or otherwise unusable.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A split request was structurally invalid (no participants, duplicate
    /// participants, wrong number of shares, non-member participant).
    #[error("invalid split: {0}")]
    InvalidSplit(String),

    /// Share amounts or percentage weights do not reconstruct the expense total.
    #[error("split mismatch: {0}")]
    SplitMismatch(String),

    /// Two monetary values of different currencies were combined.
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    /// A settlement payment would push a split past its share amount.
    #[error("overpayment on split {split_id}: {remaining} remaining, attempted {attempted}")]
    Overpayment {
        split_id: SplitId,
        remaining: Money,
        attempted: Money,
    },

    /// Minor-unit arithmetic left the representable range.
    #[error("amount overflow")]
    AmountOverflow,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (duplicate id, stale version, group mismatch).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl LedgerError {
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn invalid_split(msg: impl Into<String>) -> Self {
        Self::InvalidSplit(msg.into())
    }

    pub fn split_mismatch(msg: impl Into<String>) -> Self {
        Self::SplitMismatch(msg.into())
    }

    pub fn currency_mismatch(expected: Currency, found: Currency) -> Self {
        Self::CurrencyMismatch { expected, found }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}

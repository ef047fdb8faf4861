//! Split strategies and per-participant split state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{Money, PaymentId, SplitId, UserId};

/// How an expense's total is divided among its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SplitStrategy {
    /// Everyone owes the same share; leftover minor units go to the earliest
    /// participants, one unit each.
    Equal,
    /// Caller-provided amounts, one per participant, which must reconstruct
    /// the expense total exactly.
    Exact { amounts: Vec<Money> },
    /// Integer percentage weights, one per participant, summing to 100.
    /// Leftover minor units go to the largest truncated fractions first.
    Percentage { weights: Vec<u32> },
}

impl SplitStrategy {
    /// Stable name for logging and read models.
    pub fn name(&self) -> &'static str {
        match self {
            SplitStrategy::Equal => "EQUAL",
            SplitStrategy::Exact { .. } => "EXACT",
            SplitStrategy::Percentage { .. } => "PERCENTAGE",
        }
    }
}

/// One participant's share of an expense and how much of it is settled.
///
/// Invariants (enforced by the expense aggregate):
/// - `0 <= settled_amount <= share_amount`
/// - `is_settled` exactly when `settled_amount == share_amount`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub split_id: SplitId,
    pub user_id: UserId,
    pub share_amount: Money,
    pub settled_amount: Money,
    pub is_settled: bool,
}

impl Split {
    /// Unsettled portion of the share.
    pub fn remaining(&self) -> Money {
        Money::from_minor_units(
            self.share_amount
                .minor_units()
                .saturating_sub(self.settled_amount.minor_units()),
            self.share_amount.currency(),
        )
    }
}

/// An individual settlement payment recorded against a split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPayment {
    pub payment_id: PaymentId,
    pub split_id: SplitId,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

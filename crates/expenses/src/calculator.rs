//! Share computation for each split strategy.
//!
//! All three strategies produce shares that sum to the expense total exactly,
//! and remainder distribution is deterministic, so replaying the same command
//! always yields the same splits.

use std::collections::HashSet;

use splitledger_core::{LedgerError, LedgerResult, Money, UserId};

use crate::split::SplitStrategy;

/// Compute one share per participant.
///
/// Shares are returned in participant order and always sum to `total`.
pub fn compute_shares(
    total: Money,
    strategy: &SplitStrategy,
    participants: &[UserId],
) -> LedgerResult<Vec<Money>> {
    if participants.is_empty() {
        return Err(LedgerError::invalid_split(
            "expense requires at least one participant",
        ));
    }
    let mut seen = HashSet::with_capacity(participants.len());
    for user in participants {
        if !seen.insert(*user) {
            return Err(LedgerError::invalid_split(format!(
                "duplicate participant: {user}"
            )));
        }
    }
    if !total.is_positive() {
        return Err(LedgerError::invalid_amount(
            "expense amount must be positive",
        ));
    }

    match strategy {
        SplitStrategy::Equal => equal_shares(total, participants.len()),
        SplitStrategy::Exact { amounts } => exact_shares(total, amounts, participants.len()),
        SplitStrategy::Percentage { weights } => {
            percentage_shares(total, weights, participants.len())
        }
    }
}

/// Equal division. The first `total % n` participants absorb one extra minor
/// unit each, so a share never differs from another by more than one unit.
fn equal_shares(total: Money, n: usize) -> LedgerResult<Vec<Money>> {
    let currency = total.currency();
    let n = n as i64;
    let quotient = total.minor_units() / n;
    let remainder = total.minor_units() % n;

    Ok((0..n)
        .map(|i| {
            let extra = if i < remainder { 1 } else { 0 };
            Money::from_minor_units(quotient + extra, currency)
        })
        .collect())
}

fn exact_shares(total: Money, amounts: &[Money], n: usize) -> LedgerResult<Vec<Money>> {
    if amounts.len() != n {
        return Err(LedgerError::invalid_split(format!(
            "expected {n} exact amounts, got {}",
            amounts.len()
        )));
    }

    let mut sum: i128 = 0;
    for amount in amounts {
        total.ensure_same_currency(amount)?;
        if amount.is_negative() {
            return Err(LedgerError::invalid_amount(
                "exact share amounts must not be negative",
            ));
        }
        sum += amount.minor_units() as i128;
    }
    if sum != total.minor_units() as i128 {
        return Err(LedgerError::split_mismatch(format!(
            "exact shares sum to {sum} minor units, expense total is {} minor units",
            total.minor_units()
        )));
    }

    Ok(amounts.to_vec())
}

/// Percentage division with largest-remainder rounding.
///
/// Each participant's floor share is `total * weight / 100`; leftover minor
/// units go to the largest truncated fractions, ties broken by participant
/// order.
fn percentage_shares(total: Money, weights: &[u32], n: usize) -> LedgerResult<Vec<Money>> {
    if weights.len() != n {
        return Err(LedgerError::invalid_split(format!(
            "expected {n} percentage weights, got {}",
            weights.len()
        )));
    }
    let weight_sum: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if weight_sum != 100 {
        return Err(LedgerError::split_mismatch(format!(
            "percentage weights sum to {weight_sum}, must be 100"
        )));
    }

    let currency = total.currency();
    let total_minor = total.minor_units() as i128;

    let mut floors = Vec::with_capacity(n);
    let mut fractions = Vec::with_capacity(n);
    let mut floor_sum: i128 = 0;
    for (idx, weight) in weights.iter().enumerate() {
        let scaled = total_minor * i128::from(*weight);
        floors.push(scaled / 100);
        fractions.push((scaled % 100, idx));
        floor_sum += scaled / 100;
    }

    let mut leftover = total_minor - floor_sum;
    fractions.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, idx) in fractions {
        if leftover == 0 {
            break;
        }
        floors[idx] += 1;
        leftover -= 1;
    }

    floors
        .into_iter()
        .map(|minor| {
            i64::try_from(minor)
                .map(|m| Money::from_minor_units(m, currency))
                .map_err(|_| LedgerError::AmountOverflow)
        })
        .collect()
}

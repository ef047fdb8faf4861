//! Pairwise debt netting over a group's expenses.
//!
//! Balances are recomputed from scratch on every call rather than maintained
//! incrementally. The ledger (the expense aggregates) is the source of truth;
//! this keeps the computation stateless and trivially consistent with it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use splitledger_core::{Currency, LedgerError, LedgerResult, Money, UserId};
use splitledger_expenses::Expense;

/// One directed debt remaining between two users after netting.
///
/// For any pair of users at most one edge exists, in one direction only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEdge {
    pub debtor: UserId,
    pub creditor: UserId,
    pub amount: Money,
}

/// Aggregated position of one user across all edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: UserId,
    /// What this user still owes others.
    pub total_owed: Money,
    /// What others still owe this user.
    pub total_due: Money,
}

/// Net debts of a group: who owes whom, and per-user totals.
///
/// Edges and users are ordered by id bytes, so two computations over the same
/// ledger produce identical summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBalanceSummary {
    pub edges: Vec<BalanceEdge>,
    pub users: Vec<UserBalance>,
}

fn user_key(user: &UserId) -> [u8; 16] {
    *user.as_uuid().as_bytes()
}

impl GroupBalanceSummary {
    /// Net the outstanding split remainders of `expenses` into directed debts.
    ///
    /// Each unsettled split contributes its remaining amount as a debt from
    /// the split's user to the expense's payer; opposite debts between the
    /// same two users cancel. A payer's own split never contributes.
    pub fn project(expenses: &[Expense]) -> LedgerResult<Self> {
        let mut currency: Option<Currency> = None;
        // Net per unordered pair (a, b), a ordered before b by id bytes.
        // Positive means a owes b.
        let mut pair_nets: HashMap<(UserId, UserId), i128> = HashMap::new();

        for expense in expenses {
            let Some(payer) = expense.paid_by_user_id() else {
                continue;
            };
            for split in expense.splits() {
                let split_currency = split.share_amount.currency();
                match currency {
                    None => currency = Some(split_currency),
                    Some(expected) if expected != split_currency => {
                        return Err(LedgerError::currency_mismatch(expected, split_currency));
                    }
                    Some(_) => {}
                }

                if split.user_id == payer {
                    continue;
                }
                let remaining = split.remaining().minor_units();
                if remaining == 0 {
                    continue;
                }

                let (a, b, signed) = if user_key(&split.user_id) < user_key(&payer) {
                    (split.user_id, payer, i128::from(remaining))
                } else {
                    (payer, split.user_id, -i128::from(remaining))
                };
                *pair_nets.entry((a, b)).or_insert(0) += signed;
            }
        }

        let Some(currency) = currency else {
            return Ok(Self::default());
        };

        let mut edges = Vec::with_capacity(pair_nets.len());
        let mut totals: HashMap<UserId, (i128, i128)> = HashMap::new();
        for ((a, b), net) in pair_nets {
            if net == 0 {
                continue;
            }
            let (debtor, creditor, minor) = if net > 0 { (a, b, net) } else { (b, a, -net) };
            let minor = i64::try_from(minor).map_err(|_| LedgerError::AmountOverflow)?;
            let debtor_totals = totals.entry(debtor).or_default();
            debtor_totals.0 += i128::from(minor);
            let creditor_totals = totals.entry(creditor).or_default();
            creditor_totals.1 += i128::from(minor);
            edges.push(BalanceEdge {
                debtor,
                creditor,
                amount: Money::from_minor_units(minor, currency),
            });
        }
        edges.sort_by_key(|e| (user_key(&e.debtor), user_key(&e.creditor)));

        let mut users = Vec::with_capacity(totals.len());
        for (user_id, (owed, due)) in totals {
            let total_owed = i64::try_from(owed).map_err(|_| LedgerError::AmountOverflow)?;
            let total_due = i64::try_from(due).map_err(|_| LedgerError::AmountOverflow)?;
            users.push(UserBalance {
                user_id,
                total_owed: Money::from_minor_units(total_owed, currency),
                total_due: Money::from_minor_units(total_due, currency),
            });
        }
        users.sort_by_key(|u| user_key(&u.user_id));

        Ok(Self { edges, users })
    }
}

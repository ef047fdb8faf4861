//! `splitledger-balances` — who-owes-whom netting.
//!
//! A stateless engine that folds a group's expenses into a deterministic debt
//! graph: one directed edge per pair of users, plus per-user totals.

pub mod engine;

pub use engine::{BalanceEdge, GroupBalanceSummary, UserBalance};

//! `splitledger-expenses` — the expense aggregate and split computation.
//!
//! An expense records who paid, how the total divides among participants, and
//! how far each resulting split has been settled. Expenses are event-sourced:
//! `ExpenseCreated` fixes the splits forever, `SettlementRecorded` advances
//! settlement one payment at a time.

pub mod calculator;
pub mod expense;
pub mod split;

pub use calculator::compute_shares;
pub use expense::{
    CreateExpense, Expense, ExpenseCommand, ExpenseCreated, ExpenseEvent, ExpenseId, RecordPayment,
    SettlementRecorded,
};
pub use split::{SettlementPayment, Split, SplitStrategy};

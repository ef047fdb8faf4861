//! `splitledger-service` — the application layer tying the ledger together.
//!
//! `LedgerService` wires command dispatch, the expense feed projection, the
//! balance engine and the membership port into one API: create expenses,
//! record settlement payments, query feeds, balances and payment histories.

pub mod error;
pub mod membership;
pub mod service;

pub use error::ServiceError;
pub use membership::{InMemoryMembershipDirectory, MembershipDirectory};
pub use service::{LedgerService, NewExpense, PaymentView};

// Read-model shapes returned by the query APIs.
pub use splitledger_infra::projections::{ExpenseReadModel, SplitReadModel};

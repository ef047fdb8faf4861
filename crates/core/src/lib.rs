//! `splitledger-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod member;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{LedgerError, LedgerResult};
pub use id::{AggregateId, GroupId, PaymentId, SplitId, UserId};
pub use member::Member;
pub use money::{Currency, Money};
pub use value_object::ValueObject;

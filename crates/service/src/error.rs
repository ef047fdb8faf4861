use splitledger_core::{GroupId, LedgerError, UserId};
use splitledger_infra::command_dispatcher::DispatchError;
use splitledger_infra::event_store::EventStoreError;
use splitledger_infra::projections::ExpenseFeedError;
use thiserror::Error;

/// Application-facing failure taxonomy.
///
/// Domain rejections pass through unflattened so callers can still match on
/// `LedgerError` (overpayment, currency mismatch, ...); infrastructure
/// failures keep their own variants.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("user {user_id} is not a member of group {group_id}")]
    NotAMember { group_id: GroupId, user_id: UserId },

    #[error(transparent)]
    Domain(#[from] LedgerError),

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("group isolation violation: {0}")]
    GroupIsolation(String),

    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),

    #[error("event publication failed: {0}")]
    Publish(String),

    #[error("projection failure: {0}")]
    Projection(String),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Concurrency(msg) => ServiceError::Concurrency(msg),
            DispatchError::GroupIsolation(msg) => ServiceError::GroupIsolation(msg),
            DispatchError::Domain(err) => ServiceError::Domain(err),
            DispatchError::Deserialize(msg) => ServiceError::Deserialize(msg),
            DispatchError::Store(err) => ServiceError::Store(err),
            DispatchError::Publish(msg) => ServiceError::Publish(msg),
        }
    }
}

impl From<EventStoreError> for ServiceError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => ServiceError::Concurrency(msg),
            EventStoreError::GroupIsolation(msg) => ServiceError::GroupIsolation(msg),
            EventStoreError::Publish(msg) => ServiceError::Publish(msg),
            other => ServiceError::Store(other),
        }
    }
}

impl From<ExpenseFeedError> for ServiceError {
    fn from(value: ExpenseFeedError) -> Self {
        match value {
            ExpenseFeedError::GroupIsolation(msg) => ServiceError::GroupIsolation(msg),
            other => ServiceError::Projection(other.to_string()),
        }
    }
}

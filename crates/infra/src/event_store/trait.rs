use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use splitledger_core::{AggregateId, ExpectedVersion, GroupId};
use std::sync::Arc;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Events go through this lifecycle:
///
/// 1. **Domain event**: Created by an aggregate's `handle()` method
/// 2. **UncommittedEvent**: Wrapped with metadata (group_id, aggregate_id, etc.)
/// 3. **StoredEvent**: Persisted with assigned sequence_number
/// 4. **EventEnvelope**: Published to the event bus for consumers
///
/// Use `UncommittedEvent::from_typed()` to build one from a typed domain
/// event; it serializes the payload to JSON and captures the event metadata
/// needed for later deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub group_id: GroupId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers are assigned by the event store during append and are:
/// - **Monotonically increasing**: Each event gets the next sequence number (last + 1)
/// - **Stream-scoped**: Per `(group_id, aggregate_id)` stream
/// - **Immutable**: Once assigned, sequence numbers never change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub group_id: GroupId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into a group-scoped event envelope for publication.
    pub fn to_envelope(&self) -> splitledger_events::EventEnvelope<JsonValue> {
        splitledger_events::EventEnvelope::new(
            self.event_id,
            self.group_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, isolation) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("group isolation violation: {0}")]
    GroupIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Append-only, group-scoped event store.
///
/// Events are organized into **streams**, one stream per aggregate instance,
/// keyed by `(group_id, aggregate_id)`. Within a stream, sequence numbers are
/// monotonically increasing (1, 2, 3, ...).
///
/// Implementations must:
/// - Enforce group isolation (reject cross-group operations)
/// - Enforce optimistic concurrency (check version before append)
/// - Assign sequence numbers monotonically (no gaps, no duplicates)
/// - Ensure atomicity (all events in a batch are persisted or none are)
pub trait EventStore: Send + Sync {
    /// Append events to an aggregate stream (append-only).
    ///
    /// Implementations must:
    /// - enforce group isolation
    /// - enforce optimistic concurrency against the current stream version
    /// - assign monotonically increasing `sequence_number`s starting at `current_version + 1`
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for a group + aggregate.
    ///
    /// Returns an empty vector if the stream doesn't exist yet.
    fn load_stream(
        &self,
        group_id: GroupId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every event of every stream belonging to a group, ordered by
    /// (aggregate id bytes, sequence number).
    ///
    /// This is the input for whole-group computations such as balance
    /// netting and projection rebuilds.
    fn load_group(&self, group_id: GroupId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Total number of events ever appended for a group.
    ///
    /// Monotonically increasing; two equal readings bracket an unchanged
    /// ledger, which makes this usable as a cache validity token.
    fn group_version(&self, group_id: GroupId) -> Result<u64, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        group_id: GroupId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(group_id, aggregate_id)
    }

    fn load_group(&self, group_id: GroupId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_group(group_id)
    }

    fn group_version(&self, group_id: GroupId) -> Result<u64, EventStoreError> {
        (**self).group_version(group_id)
    }
}

impl UncommittedEvent {
    /// Convenience constructor from a typed envelope payload.
    ///
    /// Keeps infra decoupled from business, while still capturing event metadata
    /// needed for future deserialization.
    pub fn from_typed<E>(
        group_id: GroupId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: splitledger_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            group_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

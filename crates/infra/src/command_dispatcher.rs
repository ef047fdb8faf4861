//! Command execution pipeline (application-level orchestration).
//!
//! This module implements the **command dispatch pattern** for event-sourced
//! aggregates. Every command goes through the same lifecycle:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store (group-scoped)
//!   ↓
//! 2. Rehydrate aggregate (apply historical events to rebuild state)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events to store (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (for projections, feeds, etc.)
//! ```
//!
//! Group isolation, optimistic concurrency, and event ordering are enforced
//! here so domain code never has to. The dispatcher composes the `EventStore`
//! and `EventBus` traits and contains no IO of its own, which keeps it fully
//! testable with the in-memory implementations.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use splitledger_core::{Aggregate, AggregateId, ExpectedVersion, GroupId, LedgerError};
use splitledger_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Group isolation violation (cross-group or cross-aggregate stream mixing).
    #[error("group isolation violation: {0}")]
    GroupIsolation(String),

    /// Deterministic domain rejection (validation, invariants, overpayment, ...).
    #[error(transparent)]
    Domain(LedgerError),

    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    /// Persisting to the event store failed.
    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg.clone()),
            EventStoreError::GroupIsolation(msg) => DispatchError::GroupIsolation(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<LedgerError> for DispatchError {
    fn from(value: LedgerError) -> Self {
        DispatchError::Domain(value)
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// The dispatcher sits between the service layer and the infrastructure layer
/// (event store, event bus) and provides a consistent execution model for all
/// commands while keeping domain code pure.
///
/// ## Execution Guarantees
///
/// - **Atomicity**: events are persisted before publication (if append fails, nothing is published)
/// - **Consistency**: group isolation and optimistic concurrency are enforced
/// - **Isolation**: each command operates on a single aggregate instance
///
/// ## At-Least-Once Delivery
///
/// If publication fails after a successful append, the error is returned but
/// the events are already persisted. Consumers are idempotent (cursor-guarded
/// projections), so republishing is safe.
///
/// ## Generic Parameters
///
/// - `S`: event store implementation
/// - `B`: event bus implementation
///
/// Use `InMemoryEventStore` / `InMemoryEventBus` in tests; swap in durable
/// backends without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full event-sourcing pipeline.
    ///
    /// The `make_aggregate` closure builds a fresh (empty) aggregate instance
    /// for rehydration, e.g. `|_, id| Expense::empty(ExpenseId(id))`. This
    /// keeps the dispatcher generic over aggregate types and leaves
    /// construction with the domain code.
    ///
    /// Returns the committed `StoredEvent`s (with assigned sequence numbers).
    /// On a concurrency conflict the caller should reload and re-execute the
    /// command, or surface the conflict.
    ///
    /// Group isolation is validated in depth: events are loaded scoped to
    /// `group_id`, the loaded stream is re-checked, and new events are stamped
    /// with the same `group_id`. A buggy backend cannot leak another group's
    /// events through this path.
    pub fn dispatch<A>(
        &self,
        group_id: GroupId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(GroupId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = LedgerError>,
        A::Event: splitledger_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history (group-scoped)
        let history = self.store.load_stream(group_id, aggregate_id)?;
        validate_loaded_stream(group_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(group_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    group_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    group_id: GroupId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Enforce group isolation even if a buggy backend returns cross-group data.
    // Also ensure the stream is monotonically increasing by sequence number.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.group_id != group_id {
            return Err(DispatchError::GroupIsolation(format!(
                "loaded stream contains wrong group_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::GroupIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

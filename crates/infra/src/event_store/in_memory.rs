use std::collections::HashMap;
use std::sync::RwLock;

use splitledger_core::{AggregateId, ExpectedVersion, GroupId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Stream identity: one stream per aggregate instance, scoped to a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    group_id: GroupId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamKey, Vec<StoredEvent>>,
    /// Total events appended per group, across all streams.
    group_versions: HashMap<GroupId, u64>,
}

/// In-memory event store for testing and development.
///
/// Enforces the same invariants a durable implementation would: group
/// isolation, aggregate type stability, optimistic concurrency, and
/// monotonic sequence numbers. Streams and the per-group event counter
/// live behind one lock so appends update both atomically.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that every event in a batch targets the same stream.
    fn validate_batch(events: &[UncommittedEvent]) -> Result<StreamKey, EventStoreError> {
        let first = events
            .first()
            .ok_or_else(|| EventStoreError::InvalidAppend("empty event batch".into()))?;

        let key = StreamKey {
            group_id: first.group_id,
            aggregate_id: first.aggregate_id,
        };

        for event in events {
            if event.group_id != key.group_id {
                return Err(EventStoreError::GroupIsolation(format!(
                    "batch mixes groups {} and {}",
                    key.group_id, event.group_id
                )));
            }
            if event.aggregate_id != key.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch mixes aggregates {} and {}",
                    key.aggregate_id, event.aggregate_id
                )));
            }
            if event.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch mixes aggregate types '{}' and '{}'",
                    first.aggregate_type, event.aggregate_type
                )));
            }
        }

        Ok(key)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = Self::validate_batch(&events)?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("event store lock poisoned".into()))?;

        let stream = inner.streams.entry(key.clone()).or_default();

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != events[0].aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream {} holds '{}' events, append offered '{}'",
                    key.aggregate_id, existing.aggregate_type, events[0].aggregate_type
                )));
            }
        }

        let current_version = stream.last().map(StoredEvent::stream_version).unwrap_or(0);

        match expected_version {
            ExpectedVersion::Any => {}
            ExpectedVersion::Exact(expected) if expected == current_version => {}
            ExpectedVersion::Exact(expected) => {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {} is at version {current_version}, append expected {expected}",
                    key.aggregate_id
                )));
            }
        }

        let appended_count = events.len() as u64;
        let mut stored = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            let stored_event = StoredEvent {
                event_id: event.event_id,
                group_id: event.group_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                sequence_number: current_version + offset as u64 + 1,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                payload: event.payload,
            };
            stream.push(stored_event.clone());
            stored.push(stored_event);
        }

        *inner.group_versions.entry(key.group_id).or_insert(0) += appended_count;

        Ok(stored)
    }

    fn load_stream(
        &self,
        group_id: GroupId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("event store lock poisoned".into()))?;

        let key = StreamKey {
            group_id,
            aggregate_id,
        };

        Ok(inner.streams.get(&key).cloned().unwrap_or_default())
    }

    fn load_group(&self, group_id: GroupId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("event store lock poisoned".into()))?;

        let mut events: Vec<StoredEvent> = inner
            .streams
            .iter()
            .filter(|(key, _)| key.group_id == group_id)
            .flat_map(|(_, stream)| stream.iter().cloned())
            .collect();

        events.sort_by(|a, b| {
            a.aggregate_id
                .as_uuid()
                .as_bytes()
                .cmp(b.aggregate_id.as_uuid().as_bytes())
                .then(a.sequence_number.cmp(&b.sequence_number))
        });

        Ok(events)
    }

    fn group_version(&self, group_id: GroupId) -> Result<u64, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("event store lock poisoned".into()))?;

        Ok(inner.group_versions.get(&group_id).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn make_event(group_id: GroupId, aggregate_id: AggregateId, n: u64) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            group_id,
            aggregate_id,
            aggregate_type: "expenses.expense".to_string(),
            event_type: "expenses.expense.created".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({ "n": n }),
        }
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let group_id = GroupId::new();
        let aggregate_id = AggregateId::new();

        let first = store
            .append(
                vec![
                    make_event(group_id, aggregate_id, 1),
                    make_event(group_id, aggregate_id, 2),
                ],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        assert_eq!(
            first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let second = store
            .append(
                vec![make_event(group_id, aggregate_id, 3)],
                ExpectedVersion::Exact(2),
            )
            .unwrap();
        assert_eq!(second[0].sequence_number, 3);

        let stream = store.load_stream(group_id, aggregate_id).unwrap();
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let group_id = GroupId::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                vec![make_event(group_id, aggregate_id, 1)],
                ExpectedVersion::Exact(0),
            )
            .unwrap();

        let result = store.append(
            vec![make_event(group_id, aggregate_id, 2)],
            ExpectedVersion::Exact(0),
        );
        assert!(matches!(result, Err(EventStoreError::Concurrency(_))));
    }

    #[test]
    fn batches_mixing_groups_are_rejected() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let result = store.append(
            vec![
                make_event(GroupId::new(), aggregate_id, 1),
                make_event(GroupId::new(), aggregate_id, 2),
            ],
            ExpectedVersion::Any,
        );
        assert!(matches!(result, Err(EventStoreError::GroupIsolation(_))));
    }

    #[test]
    fn aggregate_type_is_stable_per_stream() {
        let store = InMemoryEventStore::new();
        let group_id = GroupId::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                vec![make_event(group_id, aggregate_id, 1)],
                ExpectedVersion::Any,
            )
            .unwrap();

        let mut foreign = make_event(group_id, aggregate_id, 2);
        foreign.aggregate_type = "parties.customer".to_string();
        let result = store.append(vec![foreign], ExpectedVersion::Any);
        assert!(matches!(
            result,
            Err(EventStoreError::AggregateTypeMismatch(_))
        ));
    }

    #[test]
    fn empty_batches_are_invalid() {
        let store = InMemoryEventStore::new();
        let result = store.append(vec![], ExpectedVersion::Any);
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[test]
    fn load_group_orders_by_aggregate_then_sequence() {
        let store = InMemoryEventStore::new();
        let group_id = GroupId::new();
        let first_aggregate = AggregateId::new();
        let second_aggregate = AggregateId::new();

        store
            .append(
                vec![make_event(group_id, second_aggregate, 1)],
                ExpectedVersion::Any,
            )
            .unwrap();
        store
            .append(
                vec![
                    make_event(group_id, first_aggregate, 2),
                    make_event(group_id, first_aggregate, 3),
                ],
                ExpectedVersion::Any,
            )
            .unwrap();
        store
            .append(
                vec![make_event(group_id, second_aggregate, 4)],
                ExpectedVersion::Any,
            )
            .unwrap();

        let events = store.load_group(group_id).unwrap();
        assert_eq!(events.len(), 4);

        let keys: Vec<_> = events
            .iter()
            .map(|e| (*e.aggregate_id.as_uuid().as_bytes(), e.sequence_number))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        let other_group = store.load_group(GroupId::new()).unwrap();
        assert!(other_group.is_empty());
    }

    #[test]
    fn group_version_counts_every_append_in_the_group() {
        let store = InMemoryEventStore::new();
        let group_id = GroupId::new();

        assert_eq!(store.group_version(group_id).unwrap(), 0);

        store
            .append(
                vec![
                    make_event(group_id, AggregateId::new(), 1),
                    make_event(group_id, AggregateId::new(), 2),
                ],
                ExpectedVersion::Any,
            )
            .unwrap_err();

        // A rejected batch must not advance the counter.
        assert_eq!(store.group_version(group_id).unwrap(), 0);

        let aggregate_id = AggregateId::new();
        store
            .append(
                vec![
                    make_event(group_id, aggregate_id, 1),
                    make_event(group_id, aggregate_id, 2),
                ],
                ExpectedVersion::Any,
            )
            .unwrap();
        store
            .append(
                vec![make_event(group_id, AggregateId::new(), 3)],
                ExpectedVersion::Any,
            )
            .unwrap();

        assert_eq!(store.group_version(group_id).unwrap(), 3);
    }
}

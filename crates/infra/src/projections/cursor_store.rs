//! Projection cursor/offset persistence.
//!
//! Cursors (checkpoints) track the last processed sequence_number per
//! (group, aggregate) stream. This enables:
//! - Idempotent projections (replays <= cursor are ignored)
//! - Resume after crash (projections can continue from last offset)
//! - Deterministic rebuilds (clear offsets and replay from scratch)

use splitledger_core::{AggregateId, GroupId};

/// Projection cursor store for persisting offsets.
pub trait ProjectionCursorStore: Send + Sync {
    /// Get the last processed sequence_number for a (group, aggregate, projection) stream.
    fn get_cursor(
        &self,
        group_id: GroupId,
        aggregate_id: AggregateId,
        projection_name: &str,
    ) -> Option<u64>;

    /// Update the cursor to a new sequence_number.
    fn update_cursor(
        &self,
        group_id: GroupId,
        aggregate_id: AggregateId,
        projection_name: &str,
        sequence_number: u64,
    );

    /// Clear all cursors for a group + projection (for rebuilds).
    fn clear_cursors(&self, group_id: GroupId, projection_name: &str);
}

/// No-op cursor store.
///
/// Used as the default type parameter when a projection tracks cursors
/// in-process only. A durable implementation would persist offsets so a
/// restarted projection resumes instead of replaying.
pub struct InMemoryCursorStore;

impl ProjectionCursorStore for InMemoryCursorStore {
    fn get_cursor(
        &self,
        _group_id: GroupId,
        _aggregate_id: AggregateId,
        _projection_name: &str,
    ) -> Option<u64> {
        None
    }

    fn update_cursor(
        &self,
        _group_id: GroupId,
        _aggregate_id: AggregateId,
        _projection_name: &str,
        _sequence_number: u64,
    ) {
    }

    fn clear_cursors(&self, _group_id: GroupId, _projection_name: &str) {}
}

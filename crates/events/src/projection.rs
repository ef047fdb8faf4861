use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Projections implement the **CQRS read model pattern**: they transform
/// events (write model) into queryable state (read model). Read models are
/// **disposable** - they can be deleted and rebuilt from events at any time,
/// because events are the source of truth.
///
/// ## Idempotency
///
/// Projections must be **idempotent**: applying the same event multiple times
/// must produce the same result. This enables at-least-once delivery, replay,
/// and crash recovery. The concrete projections in this workspace enforce this
/// with per-stream sequence cursors (replays at or below the cursor are
/// skipped; gaps are rejected).
///
/// ## Group Isolation
///
/// The envelope carries `group_id`, which scopes every read model update.
/// Projections must only update read models for the event's group, preventing
/// cross-group data leaks.
///
/// ## Persistence
///
/// This trait doesn't define how read models are stored - that's an
/// infrastructure concern. Projections are pure event consumers; persistence
/// lives outside this crate.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}

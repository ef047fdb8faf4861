//! Event publishing/subscription abstraction (mechanics only).
//!
//! This module provides the **event bus pattern** - a pub/sub mechanism for distributing
//! events to multiple consumers (projections, handlers, workers, etc.).
//!
//! ## Design Philosophy
//!
//! The event bus is intentionally **lightweight** and makes minimal assumptions:
//!
//! - **Transport-agnostic**: Works with in-memory channels, message queues, etc.
//! - **At-least-once delivery**: Events may be delivered multiple times; consumers must be idempotent
//! - **No persistence**: Bus is for distribution, not storage (event store is source of truth)
//!
//! At-least-once is acceptable because events are appended to the event store
//! *before* publication, and every consumer in this workspace is idempotent
//! (cursor-guarded projections). If publication fails, the events are still in
//! the store and can be republished.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of all events published to the bus
/// (broadcast semantics).
///
/// ## Usage Pattern
///
/// ```ignore
/// let bus: Arc<dyn EventBus<EventEnvelope>> = ...;
/// let subscription = bus.subscribe();
///
/// loop {
///     match subscription.recv_timeout(Duration::from_secs(1)) {
///         Ok(event) => process(event)?,
///         Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,  // Check for shutdown
///         Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,  // Bus closed
///     }
/// }
/// ```
///
/// Subscriptions are designed for single-threaded consumption. Each
/// subscription should be used by one thread (or use a mutex/channel to
/// distribute events to multiple threads).
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// The bus sits between the event store and event consumers:
///
/// ```text
/// Command → Event Store (append events) → Event Bus (publish) → Consumers
///                                                                    ├─ Projections
///                                                                    └─ Workers
/// ```
///
/// Events are **stored first** (in the event store), then **published** (via
/// the bus). This ensures events are never lost - if publication fails, events
/// are still in the store and can be republished.
///
/// `publish()` can fail (e.g., bus lock poisoned). Failures are surfaced to
/// the caller (typically the command dispatcher) which may retry or surface
/// the error. Since events are already persisted, retrying publication is safe.
///
/// The trait requires `Send + Sync`; multiple threads can publish events
/// concurrently.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

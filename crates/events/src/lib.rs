//! `splitledger-events` — event abstractions for the ledger.
//!
//! Defines the event contract (`Event`), the persisted envelope
//! (`EventEnvelope`), the pub/sub seam (`EventBus`) with an in-memory
//! implementation, and the read-model `Projection` contract.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod projection;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;

//! Domain events and their distribution.
//!
//! Aggregates emit typed events; the infra layer wraps committed events in
//! [`EventEnvelope`]s and publishes them on an [`EventBus`] for external
//! consumers (schedulers, audit, notification fan-out).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};

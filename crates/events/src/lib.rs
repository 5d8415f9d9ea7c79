//! `batchpipe-events` — the event stream contract.
//!
//! The wire envelope shared by producer and consumer, plus the transport
//! abstraction (`EventBus`) and its in-memory implementation.

pub mod bus;
pub mod envelope;
pub mod memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::{BatchEvent, BatchPayload, EventType, ObjectType};
pub use memory_bus::InMemoryEventBus;

//! Append-only event store boundary.
//!
//! Ledger streams are keyed by `(tenant_id, aggregate_id)`. Everything one
//! ledger command decides is appended as a single batch, so a posting and the
//! accounts it opens are committed together or not at all.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

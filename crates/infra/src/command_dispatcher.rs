//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the tenant-scoped stream
//!   ↓
//! 2. Rehydrate the aggregate (apply history in sequence order)
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append the whole batch with ExpectedVersion::Exact(current)
//!   ↓
//! 5. Publish the committed events to the bus
//! ```
//!
//! Step 4 is the transaction boundary: if it fails nothing is written and
//! nothing is published. Steps 4 and 5 run under the dispatcher's commit
//! lock, so subscribers receive every stream in sequence order. A publish
//! failure after a successful append is logged, not returned: the events are
//! committed and projections catch up by replaying the store.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use ledgerforge_accounting::{ErrorClass, LedgerError};
use ledgerforge_core::{Aggregate, AggregateId, ExpectedVersion, TenantId};
use ledgerforge_events::{Event, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The ledger rejected the command.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Stale stream version (a concurrent writer won). Safe to retry.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// Historical payload no longer matches the aggregate's event type.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),

    #[error("unexpected command outcome: {0}")]
    Unexpected(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl DispatchError {
    /// Error class for callers mapping failures to responses. Infrastructure
    /// failures have no class.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            DispatchError::Ledger(e) => Some(e.class()),
            DispatchError::Concurrency(_) => Some(ErrorClass::Conflict),
            DispatchError::TenantIsolation(_) => Some(ErrorClass::Inconsistency),
            DispatchError::Deserialize(_)
            | DispatchError::Store(_)
            | DispatchError::Unexpected(_) => None,
        }
    }
}

/// Committed outcome of one dispatch: the stored events and their typed form.
#[derive(Debug, Clone)]
pub struct Dispatched<E> {
    pub committed: Vec<StoredEvent>,
    pub events: Vec<E>,
}

impl<E> Dispatched<E> {
    /// Stream version after the append.
    pub fn version(&self) -> Option<u64> {
        self.committed.last().map(|e| e.sequence_number)
    }
}

/// Reusable command engine over an [`EventStore`] and an [`EventBus`].
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    commit_lock: Mutex<()>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load and rehydrate an aggregate without handling a command.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Run `command` through the full pipeline (see module docs).
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Dispatched<A::Event>, DispatchError>
    where
        A: Aggregate<Error = LedgerError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let current = history.last().map(|e| e.sequence_number).unwrap_or(0);

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(Dispatched {
                committed: vec![],
                events: vec![],
            });
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = {
            // Guards ordering only, so a poisoned lock is still usable.
            let _commit = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let committed = self
                .store
                .append(uncommitted, ExpectedVersion::Exact(current))?;
            self.publish_committed(&committed);
            committed
        };

        debug!(
            tenant_id = %tenant_id,
            aggregate_id = %aggregate_id,
            from_version = current,
            events = committed.len(),
            "batch appended"
        );

        Ok(Dispatched {
            committed,
            events: decided,
        })
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn publish_committed(&self, committed: &[StoredEvent]) {
        for stored in committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                warn!(
                    tenant_id = %stored.tenant_id,
                    aggregate_id = %stored.aggregate_id,
                    sequence_number = stored.sequence_number,
                    error = ?e,
                    "committed event was not published; projections must replay"
                );
            }
        }
    }
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "sequence gap in loaded stream (last={last}, found={})",
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
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

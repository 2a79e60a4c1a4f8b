//! Infrastructure wiring: event store, bus, ledger service and read models.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use ledgerforge_accounting::PostingPolicy;
use ledgerforge_events::{EventEnvelope, InMemoryEventBus};
use ledgerforge_infra::{
    command_dispatcher::CommandDispatcher,
    event_store::InMemoryEventStore,
    ledger_service::LedgerService,
    projections::LedgerProjections,
    workers::{ProjectionWorker, WorkerHandle},
};

type InMemoryBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

pub type InMemoryLedgerService = LedgerService<Arc<InMemoryEventStore>, InMemoryBus>;

/// Shared state behind every route.
pub struct AppServices {
    pub ledger: InMemoryLedgerService,
    pub projections: Arc<LedgerProjections>,
    // Held so the projection thread lives as long as the router.
    _projection_worker: WorkerHandle,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("policy", self.ledger.policy())
            .finish_non_exhaustive()
    }
}

pub fn build_services(policy: PostingPolicy) -> std::io::Result<AppServices> {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: InMemoryBus = Arc::new(InMemoryEventBus::new());
    let projections = Arc::new(LedgerProjections::in_memory());

    // Subscribed before the first command can be dispatched.
    let projection_worker = {
        let projections = projections.clone();
        let store = store.clone();
        ProjectionWorker::spawn("ledger.projections", &bus, None, move |env: EventEnvelope<JsonValue>| {
            projections.apply_or_replay(store.as_ref(), &env)
        })?
    };

    let ledger = LedgerService::new(CommandDispatcher::new(store, bus), policy);

    tracing::info!(worker = projection_worker.name(), "ledger services started");

    Ok(AppServices {
        ledger,
        projections,
        _projection_worker: projection_worker,
    })
}

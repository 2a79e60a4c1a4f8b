use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use ledgerforge_core::TenantId;
use ledgerforge_events::{EventBus, Subscription, TenantScoped};

/// Handle to stop and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Projection worker loop: bus subscription → idempotent handler.
///
/// Handler failures are logged and the loop keeps going; projections are
/// repaired by replaying from the event store.
#[derive(Debug)]
pub struct ProjectionWorker;

impl ProjectionWorker {
    /// Subscribe to `bus` now and process messages on a named thread.
    ///
    /// With `tenant_id` set, messages of other tenants are ignored.
    pub fn spawn<M, B, H, E>(
        name: &'static str,
        bus: &B,
        tenant_id: Option<TenantId>,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        M: TenantScoped + Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Display + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, tenant_id, &mut handler))?;

        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    tenant_id: Option<TenantId>,
    handler: &mut H,
) where
    M: TenantScoped,
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Display,
{
    let tick = Duration::from_millis(100);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            debug!(worker = name, "shutdown requested");
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if tenant_id.is_some_and(|t| msg.tenant_id() != t) {
                    continue;
                }
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = %err, "projection worker handler failed");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use ledgerforge_core::AggregateId;
    use ledgerforge_events::{EventEnvelope, InMemoryEventBus};
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId) -> EventEnvelope<u32> {
        EventEnvelope::new(Uuid::now_v7(), tenant_id, AggregateId::new(), "accounting.ledger", 1, 7)
    }

    #[test]
    fn worker_filters_tenants_and_stops_on_shutdown() {
        let bus: InMemoryEventBus<EventEnvelope<u32>> = InMemoryEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (mine, other) = (TenantId::new(), TenantId::new());

        let sink = seen.clone();
        let handle = ProjectionWorker::spawn("test.worker", &bus, Some(mine), move |env: EventEnvelope<u32>| {
            sink.lock().unwrap().push(env.tenant_id());
            Ok::<(), String>(())
        })
        .unwrap();

        bus.publish(envelope(other)).unwrap();
        bus.publish(envelope(mine)).unwrap();

        for _ in 0..100 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![mine]);
    }
}

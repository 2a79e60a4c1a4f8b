use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use ledgerforge_accounting::{JournalEntry, SourceDocument};
use ledgerforge_core::TenantId;
use ledgerforge_events::EventEnvelope;

use super::{LedgerProjection, ProjectionError, StreamCursors, decode_ledger_event};
use crate::read_model::TenantStore;

/// Projection: every posted entry (originals and reversals).
#[derive(Debug)]
pub struct JournalProjection<S>
where
    S: TenantStore<Uuid, JournalEntry>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> JournalProjection<S>
where
    S: TenantStore<Uuid, JournalEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, entry_id: Uuid) -> Option<JournalEntry> {
        self.store.get(tenant_id, &entry_id)
    }

    /// Entries dated within `[from, to]` (either bound optional), ordered by
    /// date then posting order.
    pub fn list(
        &self,
        tenant_id: TenantId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|e| from.is_none_or(|f| e.entry_date >= f))
            .filter(|e| to.is_none_or(|t| e.entry_date <= t))
            .collect();
        // v7 ids are time-ordered.
        entries.sort_by_key(|e| (e.entry_date, e.entry_id));
        entries
    }

    /// Every entry posted for a source document, in posting order.
    pub fn by_source(&self, tenant_id: TenantId, source: &SourceDocument) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|e| &e.source == source)
            .collect();
        entries.sort_by_key(|e| e.entry_id);
        entries
    }
}

impl<S> LedgerProjection for JournalProjection<S>
where
    S: TenantStore<Uuid, JournalEntry>,
{
    fn name(&self) -> &'static str {
        "accounting.journal"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = decode_ledger_event(envelope)? else {
            return Ok(());
        };
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        if let Some(entry) = ev.posted_entry() {
            self.store
                .upsert(envelope.tenant_id(), entry.entry_id, entry.clone());
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

//! The ledger read-model bundle, and rebuilding it from the event store.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use ledgerforge_accounting::{
    AccountCode, JournalEntry, LedgerError, ProfitAndLoss, TrialBalance,
};
use ledgerforge_core::TenantId;
use ledgerforge_events::EventEnvelope;

use super::balances::{AccountBalance, AccountBalancesProjection};
use super::cash_book::{CashBookProjection, CashRegister};
use super::journal::JournalProjection;
use super::party_ledger::{PartyAccount, PartyKey, PartyLedgerProjection};
use super::{LedgerProjection, ProjectionError};
use crate::event_store::{EventStore, EventStoreError};
use crate::read_model::InMemoryTenantStore;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("projection {projection} failed: {source}")]
    Projection {
        projection: &'static str,
        #[source]
        source: ProjectionError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    pub tenant_id: TenantId,
    pub events: usize,
}

pub type BalancesStore = Arc<InMemoryTenantStore<AccountCode, AccountBalance>>;
pub type CashBookStore = Arc<InMemoryTenantStore<AccountCode, CashRegister>>;
pub type PartyLedgerStore = Arc<InMemoryTenantStore<PartyKey, PartyAccount>>;
pub type JournalStore = Arc<InMemoryTenantStore<Uuid, JournalEntry>>;

/// All ledger read models, fed together.
#[derive(Debug)]
pub struct LedgerProjections {
    pub balances: AccountBalancesProjection<BalancesStore>,
    pub cash_book: CashBookProjection<CashBookStore>,
    pub party_ledger: PartyLedgerProjection<PartyLedgerStore>,
    pub journal: JournalProjection<JournalStore>,
}

impl Default for LedgerProjections {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl LedgerProjections {
    pub fn in_memory() -> Self {
        Self {
            balances: AccountBalancesProjection::new(Arc::new(InMemoryTenantStore::new())),
            cash_book: CashBookProjection::new(Arc::new(InMemoryTenantStore::new())),
            party_ledger: PartyLedgerProjection::new(Arc::new(InMemoryTenantStore::new())),
            journal: JournalProjection::new(Arc::new(InMemoryTenantStore::new())),
        }
    }

    fn each(&self) -> [&dyn LedgerProjection; 4] {
        [&self.balances, &self.cash_book, &self.party_ledger, &self.journal]
    }

    /// Apply one envelope to every projection.
    ///
    /// A failing projection does not stop the others; the first failure is
    /// returned after all have been tried.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ReplayError> {
        let mut first_err = None;
        for projection in self.each() {
            if let Err(source) = projection.apply_envelope(envelope) {
                warn!(
                    projection = projection.name(),
                    tenant_id = %envelope.tenant_id(),
                    sequence_number = envelope.sequence_number(),
                    error = %source,
                    "projection apply failed"
                );
                first_err.get_or_insert(ReplayError::Projection {
                    projection: projection.name(),
                    source,
                });
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Apply one envelope; if a read model finds a gap in the stream, rebuild
    /// the envelope's tenant from `store` instead.
    ///
    /// Envelopes already covered by the rebuild are skipped when they arrive.
    pub fn apply_or_replay<S: EventStore + ?Sized>(
        &self,
        store: &S,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ReplayError> {
        match self.apply_envelope(envelope) {
            Err(ReplayError::Projection {
                projection,
                source: ProjectionError::NonMonotonicSequence { last, found },
            }) if found > last => {
                warn!(
                    projection,
                    tenant_id = %envelope.tenant_id(),
                    last,
                    found,
                    "stream gap in read model, replaying tenant"
                );
                self.replay_tenant(store, envelope.tenant_id()).map(|_| ())
            }
            other => other,
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        for projection in self.each() {
            projection.clear_tenant(tenant_id);
        }
    }

    /// Clear the tenants present in `envelopes` and replay them in stream order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<usize, ReplayError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        let mut tenants: Vec<TenantId> = envs.iter().map(|e| e.tenant_id()).collect();
        tenants.sort();
        tenants.dedup();
        for t in tenants {
            self.clear_tenant(t);
        }

        envs.sort_by_key(|e| (e.tenant_id(), e.aggregate_id(), e.sequence_number()));
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(envs.len())
    }

    /// Rebuild one tenant's read models from the event store.
    pub fn replay_tenant<S: EventStore + ?Sized>(
        &self,
        store: &S,
        tenant_id: TenantId,
    ) -> Result<ReplayReport, ReplayError> {
        let stored = store.load_tenant(tenant_id)?;
        self.clear_tenant(tenant_id);
        let events = self.rebuild_from_scratch(stored.iter().map(|e| e.to_envelope()))?;

        info!(tenant_id = %tenant_id, events, "ledger read models rebuilt");
        Ok(ReplayReport { tenant_id, events })
    }

    pub fn trial_balance(&self, tenant_id: TenantId) -> TrialBalance {
        TrialBalance::from_balances(
            self.balances
                .list(tenant_id)
                .into_iter()
                .map(|b| (b.account, b.balance)),
        )
    }

    pub fn profit_and_loss(
        &self,
        tenant_id: TenantId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ProfitAndLoss, LedgerError> {
        let entries = self.journal.list(tenant_id, Some(from), Some(to));
        ProfitAndLoss::from_entries(&entries, from, to)
    }
}

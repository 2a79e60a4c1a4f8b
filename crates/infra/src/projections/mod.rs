//! Read models built from committed ledger events.
//!
//! Every projection is:
//! - rebuildable from the event store
//! - tenant-isolated
//! - idempotent under at-least-once delivery (per-stream cursors skip
//!   sequence numbers already applied and reject gaps)

use serde_json::Value as JsonValue;
use thiserror::Error;

use ledgerforge_accounting::{LEDGER_AGGREGATE_TYPE, LedgerEvent};
use ledgerforge_core::TenantId;
use ledgerforge_events::EventEnvelope;

pub mod balances;
pub mod cash_book;
pub mod cursor;
pub mod journal;
pub mod party_ledger;
pub mod replay;

pub use balances::{AccountBalance, AccountBalancesProjection};
pub use cash_book::{CashBookProjection, CashBookRow, CashDirection, CashRegister};
pub use cursor::StreamCursors;
pub use journal::JournalProjection;
pub use party_ledger::{PartyAccount, PartyKey, PartyLedgerProjection, PartyLedgerRow};
pub use replay::{LedgerProjections, ReplayError, ReplayReport};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// A read model fed from ledger envelopes.
pub trait LedgerProjection: Send + Sync {
    /// Stable name, used in logs.
    fn name(&self) -> &'static str;

    /// Apply one envelope. Envelopes of other aggregate types are ignored.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Forget everything about a tenant, cursors included.
    fn clear_tenant(&self, tenant_id: TenantId);
}

/// Decode a ledger envelope, checking the payload belongs to the envelope's
/// tenant. Returns `None` for envelopes of other aggregates.
pub(crate) fn decode_ledger_event(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<Option<LedgerEvent>, ProjectionError> {
    if envelope.aggregate_type() != LEDGER_AGGREGATE_TYPE {
        return Ok(None);
    }

    let ev: LedgerEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

    if ev.tenant_id() != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    Ok(Some(ev))
}

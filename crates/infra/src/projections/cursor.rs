use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use ledgerforge_core::{AggregateId, TenantId};
use ledgerforge_events::EventEnvelope;

use super::ProjectionError;

type CursorKey = (TenantId, AggregateId);

/// Last applied sequence number per `(tenant, aggregate)` stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|c| c.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0)
    }

    /// Whether the envelope is the next one to apply.
    ///
    /// `Ok(false)` means it was already applied (redelivery). A zero sequence
    /// number or a gap is an error: the projection must be rebuilt.
    pub fn admit(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let (tenant_id, aggregate_id) = envelope.stream();
        let last = self.position(tenant_id, aggregate_id);
        let seq = envelope.sequence_number();

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if !envelope.follows(last) {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(envelope.stream(), envelope.sequence_number());
        }
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.retain(|(t, _), _| *t != tenant_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn envelope(tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), tenant_id, aggregate_id, "accounting.ledger", seq, JsonValue::Null)
    }

    #[test]
    fn redelivery_is_skipped_and_gaps_fail() {
        let cursors = StreamCursors::new();
        let (t, a) = (TenantId::new(), AggregateId::new());

        assert!(cursors.admit(&envelope(t, a, 1)).unwrap());
        cursors.advance(&envelope(t, a, 1));

        assert!(!cursors.admit(&envelope(t, a, 1)).unwrap());
        assert!(cursors.admit(&envelope(t, a, 2)).unwrap());
        assert!(matches!(
            cursors.admit(&envelope(t, a, 4)),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 4 })
        ));
        assert!(cursors.admit(&envelope(t, a, 0)).is_err());
    }

    #[test]
    fn first_event_must_be_sequence_one() {
        let cursors = StreamCursors::new();
        let (t, a) = (TenantId::new(), AggregateId::new());
        assert!(cursors.admit(&envelope(t, a, 3)).is_err());
    }

    #[test]
    fn clearing_a_tenant_resets_its_streams_only() {
        let cursors = StreamCursors::new();
        let (t1, t2, a) = (TenantId::new(), TenantId::new(), AggregateId::new());
        cursors.advance(&envelope(t1, a, 5));
        cursors.advance(&envelope(t2, a, 7));

        cursors.clear_tenant(t1);

        assert_eq!(cursors.position(t1, a), 0);
        assert_eq!(cursors.position(t2, a), 7);
    }
}

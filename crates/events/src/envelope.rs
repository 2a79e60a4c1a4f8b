use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerforge_core::{AggregateId, TenantId};

/// A committed event as it travels on the bus.
///
/// `sequence_number` is the 1-based position in the `(tenant_id, aggregate_id)`
/// stream; consumers use it to skip duplicates and detect gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// The stream this event belongs to.
    pub fn stream(&self) -> (TenantId, AggregateId) {
        (self.tenant_id, self.aggregate_id)
    }

    /// True when this is the event right after position `last` of its stream.
    pub fn follows(&self, last: u64) -> bool {
        self.sequence_number == last + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_only_the_previous_position() {
        let env = EventEnvelope::new(Uuid::now_v7(), TenantId::new(), AggregateId::new(), "accounting.ledger", 3, ());
        assert!(env.follows(2));
        assert!(!env.follows(3));
        assert!(!env.follows(1));
        assert_eq!(env.stream(), (env.tenant_id(), env.aggregate_id()));
    }
}

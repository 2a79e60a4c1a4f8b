use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use ledgerforge_accounting::{Account, AccountCode, JournalEntry, SourceDocument};
use ledgerforge_core::TenantId;
use ledgerforge_events::EventEnvelope;

use super::{LedgerProjection, ProjectionError, StreamCursors, decode_ledger_event};
use crate::read_model::TenantStore;

/// `(control account, normalized party name)`.
pub type PartyKey = (AccountCode, String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyLedgerRow {
    pub entry_id: Uuid,
    pub entry_date: NaiveDate,
    pub source: SourceDocument,
    pub description: Option<String>,
    pub debit: i64,
    pub credit: i64,
    /// Outstanding amount after this row, in the control account's natural sign.
    pub balance: i128,
    pub reversal: bool,
}

/// A customer's receivable or a vendor's payable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyAccount {
    pub control: Account,
    pub party: String,
    /// Positive: the customer owes us (AR) or we owe the vendor (AP).
    pub balance: i128,
    pub rows: Vec<PartyLedgerRow>,
}

pub fn party_key(control: &AccountCode, party: &str) -> PartyKey {
    (control.clone(), party.trim().to_lowercase())
}

/// Projection: per-party sub-ledgers of the receivable and payable accounts.
#[derive(Debug)]
pub struct PartyLedgerProjection<S>
where
    S: TenantStore<PartyKey, PartyAccount>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PartyLedgerProjection<S>
where
    S: TenantStore<PartyKey, PartyAccount>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, control: &AccountCode, party: &str) -> Option<PartyAccount> {
        self.store.get(tenant_id, &party_key(control, party))
    }

    /// Parties on one control account, ordered by name.
    pub fn list(&self, tenant_id: TenantId, control: &AccountCode) -> Vec<PartyAccount> {
        let mut parties: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| &p.control.code == control)
            .collect();
        parties.sort_by(|a, b| a.party.to_lowercase().cmp(&b.party.to_lowercase()));
        parties
    }

    fn record(&self, tenant_id: TenantId, entry: &JournalEntry) {
        let Some(party) = entry.counterparty.as_deref().map(str::trim).filter(|p| !p.is_empty()) else {
            return;
        };

        for line in entry.lines.iter().filter(|l| l.account.role.is_control()) {
            let control = line.account.clone();
            self.store.update(
                tenant_id,
                party_key(&line.account.code, party),
                &|| PartyAccount {
                    control: control.clone(),
                    party: party.to_string(),
                    balance: 0,
                    rows: Vec::new(),
                },
                &mut |account: &mut PartyAccount| {
                    account.balance += line.account.natural_balance(line.signed_amount());
                    account.rows.push(PartyLedgerRow {
                        entry_id: entry.entry_id,
                        entry_date: entry.entry_date,
                        source: entry.source.clone(),
                        description: entry.description.clone(),
                        debit: line.debit(),
                        credit: line.credit(),
                        balance: account.balance,
                        reversal: entry.reverses.is_some(),
                    });
                },
            );
        }
    }
}

impl<S> LedgerProjection for PartyLedgerProjection<S>
where
    S: TenantStore<PartyKey, PartyAccount>,
{
    fn name(&self) -> &'static str {
        "accounting.party_ledger"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = decode_ledger_event(envelope)? else {
            return Ok(());
        };
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        if let Some(entry) = ev.posted_entry() {
            self.record(envelope.tenant_id(), entry);
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

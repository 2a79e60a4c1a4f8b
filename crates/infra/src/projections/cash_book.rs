use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use ledgerforge_accounting::{Account, AccountCode, JournalEntry, LedgerEvent, Side, SourceDocument};
use ledgerforge_core::TenantId;
use ledgerforge_events::EventEnvelope;

use super::{LedgerProjection, ProjectionError, StreamCursors, decode_ledger_event};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CashDirection {
    In,
    Out,
}

/// One movement on a cash or bank account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashBookRow {
    pub entry_id: Uuid,
    pub entry_date: NaiveDate,
    pub source: SourceDocument,
    pub description: Option<String>,
    pub counterparty: Option<String>,
    pub direction: CashDirection,
    pub amount: i64,
    /// Money held after this row, in posting order.
    pub running_balance: i128,
    /// Row belongs to a reversing entry.
    pub reversal: bool,
}

/// Register of a money account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashRegister {
    pub account: Account,
    pub balance: i128,
    pub rows: Vec<CashBookRow>,
}

impl CashRegister {
    fn empty(account: Account) -> Self {
        Self {
            account,
            balance: 0,
            rows: Vec::new(),
        }
    }
}

/// Projection: cash and bank registers (accounts whose role is a money role).
#[derive(Debug)]
pub struct CashBookProjection<S>
where
    S: TenantStore<AccountCode, CashRegister>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> CashBookProjection<S>
where
    S: TenantStore<AccountCode, CashRegister>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, code: &AccountCode) -> Option<CashRegister> {
        self.store.get(tenant_id, code)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<CashRegister> {
        let mut registers = self.store.list(tenant_id);
        registers.sort_by(|a, b| a.account.code.cmp(&b.account.code));
        registers
    }

    fn open(&self, tenant_id: TenantId, account: &Account) {
        if !account.role.is_money() {
            return;
        }
        let seed = account.clone();
        self.store.update(
            tenant_id,
            account.code.clone(),
            &|| CashRegister::empty(seed.clone()),
            &mut |_| {},
        );
    }

    fn record(&self, tenant_id: TenantId, entry: &JournalEntry) {
        for line in entry.lines.iter().filter(|l| l.account.role.is_money()) {
            let seed = line.account.clone();
            self.store.update(
                tenant_id,
                line.account.code.clone(),
                &|| CashRegister::empty(seed.clone()),
                &mut |register: &mut CashRegister| {
                    register.balance += line.signed_amount();
                    register.rows.push(CashBookRow {
                        entry_id: entry.entry_id,
                        entry_date: entry.entry_date,
                        source: entry.source.clone(),
                        description: entry.description.clone(),
                        counterparty: entry.counterparty.clone(),
                        direction: match line.side {
                            Side::Debit => CashDirection::In,
                            Side::Credit => CashDirection::Out,
                        },
                        amount: line.amount,
                        running_balance: register.balance,
                        reversal: entry.reverses.is_some(),
                    });
                },
            );
        }
    }
}

impl<S> LedgerProjection for CashBookProjection<S>
where
    S: TenantStore<AccountCode, CashRegister>,
{
    fn name(&self) -> &'static str {
        "accounting.cash_book"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(ev) = decode_ledger_event(envelope)? else {
            return Ok(());
        };
        if !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        match &ev {
            LedgerEvent::LedgerOpened(e) => {
                for account in &e.accounts {
                    self.open(tenant_id, account);
                }
            }
            LedgerEvent::AccountOpened(e) => self.open(tenant_id, &e.account),
            LedgerEvent::JournalEntryPosted(e) => self.record(tenant_id, &e.entry),
            LedgerEvent::JournalEntryReversed(e) => self.record(tenant_id, &e.reversal),
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

use serde::Serialize;
use serde_json::Value as JsonValue;

use ledgerforge_accounting::{Account, AccountCode, JournalEntry, LedgerEvent};
use ledgerforge_core::TenantId;
use ledgerforge_events::EventEnvelope;

use super::{LedgerProjection, ProjectionError, StreamCursors, decode_ledger_event};
use crate::read_model::TenantStore;

/// Read model: one chart account and its balance.
///
/// `balance` is debit-positive: the sum of every posted debit minus every
/// posted credit on the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountBalance {
    pub account: Account,
    pub balance: i128,
}

impl AccountBalance {
    fn zero(account: Account) -> Self {
        Self { account, balance: 0 }
    }

    /// Balance in the account's natural sign (positive = normal balance).
    pub fn natural_balance(&self) -> i128 {
        self.account.natural_balance(self.balance)
    }
}

/// Projection: ledger → per-account balances.
///
/// Accounts appear as soon as they are opened, so the read model doubles as
/// the chart-of-accounts listing.
#[derive(Debug)]
pub struct AccountBalancesProjection<S>
where
    S: TenantStore<AccountCode, AccountBalance>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> AccountBalancesProjection<S>
where
    S: TenantStore<AccountCode, AccountBalance>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, code: &AccountCode) -> Option<AccountBalance> {
        self.store.get(tenant_id, code)
    }

    /// All accounts of a tenant, ordered by code.
    pub fn list(&self, tenant_id: TenantId) -> Vec<AccountBalance> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.account.code.cmp(&b.account.code));
        rows
    }

    fn open(&self, tenant_id: TenantId, account: &Account) {
        let seed = account.clone();
        self.store.update(
            tenant_id,
            account.code.clone(),
            &|| AccountBalance::zero(seed.clone()),
            &mut |_| {},
        );
    }

    fn post(&self, tenant_id: TenantId, entry: &JournalEntry) {
        for line in &entry.lines {
            let seed = line.account.clone();
            let delta = line.signed_amount();
            self.store.update(
                tenant_id,
                line.account.code.clone(),
                &|| AccountBalance::zero(seed.clone()),
                &mut |rm: &mut AccountBalance| rm.balance += delta,
            );
        }
    }
}

impl<S> LedgerProjection for AccountBalancesProjection<S>
where
    S: TenantStore<AccountCode, AccountBalance>,
{
    fn name(&self) -> &'static str {
        "accounting.balances"
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
            LedgerEvent::JournalEntryPosted(e) => self.post(tenant_id, &e.entry),
            LedgerEvent::JournalEntryReversed(e) => self.post(tenant_id, &e.reversal),
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

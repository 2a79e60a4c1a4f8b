//! Ledger operations over the command pipeline.
//!
//! Each tenant has one ledger stream whose aggregate id is derived from the
//! tenant id. Every method is one command, hence one atomic append.

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use ledgerforge_accounting::{
    Account, AccountCode, AmendFinancialEvent, ChartOfAccounts, FinancialEvent, JournalEntry,
    LEDGER_AGGREGATE_TYPE, Ledger, LedgerCommand, LedgerError, LedgerEvent, LedgerId, OpenAccount,
    OpenLedger, PostJournalEntry, PostingPolicy, RecordFinancialEvent, ReverseFinancialEvent, Side,
    SourceDocument, SourceKind,
};
use ledgerforge_core::{AggregateId, TenantId};
use ledgerforge_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::event_store::EventStore;

/// A manual journal entry as submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualEntry {
    /// Voucher number; becomes the `manual/<reference>` source document.
    pub reference: String,
    pub entry_date: NaiveDate,
    pub description: Option<String>,
    pub lines: Vec<(AccountCode, Side, i64)>,
}

pub struct LedgerService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    policy: PostingPolicy,
}

impl<S, B> LedgerService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: CommandDispatcher<S, B>, policy: PostingPolicy) -> Self {
        Self { dispatcher, policy }
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    pub fn policy(&self) -> &PostingPolicy {
        &self.policy
    }

    pub fn ledger_id(tenant_id: TenantId) -> LedgerId {
        LedgerId::new(AggregateId::from_uuid(*tenant_id.as_uuid()))
    }

    fn execute(
        &self,
        tenant_id: TenantId,
        command: LedgerCommand,
    ) -> Result<Dispatched<LedgerEvent>, DispatchError> {
        let ledger_id = Self::ledger_id(tenant_id);
        let policy = self.policy.clone();
        let span = info_span!(
            "ledger_command",
            tenant_id = %tenant_id,
            command = command_name(&command)
        );
        span.in_scope(|| {
            self.dispatcher
                .dispatch(tenant_id, ledger_id.0, LEDGER_AGGREGATE_TYPE, command, |_, id| {
                    Ledger::with_policy(LedgerId::new(id), policy)
                })
                .inspect_err(|err| {
                    warn!(error = %err, "ledger command rejected");
                })
        })
    }

    /// Current ledger state (chart, posted entries) for a tenant.
    pub fn ledger(&self, tenant_id: TenantId) -> Result<Ledger, DispatchError> {
        let policy = self.policy.clone();
        self.dispatcher
            .load(tenant_id, Self::ledger_id(tenant_id).0, |_, id| {
                Ledger::with_policy(LedgerId::new(id), policy)
            })
    }

    /// Open the tenant's ledger with `accounts`, or the standard chart.
    pub fn open(&self, tenant_id: TenantId, accounts: Option<Vec<Account>>) -> Result<(), DispatchError> {
        let accounts = accounts.unwrap_or_else(|| ChartOfAccounts::standard().iter().cloned().collect());
        let count = accounts.len();
        self.execute(
            tenant_id,
            LedgerCommand::OpenLedger(OpenLedger {
                tenant_id,
                ledger_id: Self::ledger_id(tenant_id),
                accounts,
                occurred_at: Utc::now(),
            }),
        )?;
        info!(tenant_id = %tenant_id, accounts = count, "ledger opened");
        Ok(())
    }

    /// Add an account; a non-zero opening balance also posts its opening entry.
    pub fn open_account(
        &self,
        tenant_id: TenantId,
        account: Account,
        opening_balance: i64,
        opened_on: NaiveDate,
    ) -> Result<Option<JournalEntry>, DispatchError> {
        let code = account.code.clone();
        let dispatched = self.execute(
            tenant_id,
            LedgerCommand::OpenAccount(OpenAccount {
                tenant_id,
                ledger_id: Self::ledger_id(tenant_id),
                account,
                opening_balance,
                opened_on,
                entry_id: Uuid::now_v7(),
                occurred_at: Utc::now(),
            }),
        )?;
        info!(tenant_id = %tenant_id, account = %code, opening_balance, "account opened");
        Ok(last_posted(&dispatched))
    }

    /// Post a financial event: open whatever accounts it needs and post its
    /// balanced entry, atomically.
    pub fn post(&self, tenant_id: TenantId, event: FinancialEvent) -> Result<JournalEntry, DispatchError> {
        let dispatched = self.execute(
            tenant_id,
            LedgerCommand::RecordFinancialEvent(RecordFinancialEvent {
                tenant_id,
                ledger_id: Self::ledger_id(tenant_id),
                event,
                entry_id: Uuid::now_v7(),
                occurred_at: Utc::now(),
            }),
        )?;
        let entry = require_posted(&dispatched)?;
        let opened = dispatched
            .events
            .iter()
            .filter(|e| matches!(e, LedgerEvent::AccountOpened(_)))
            .count();
        info!(
            tenant_id = %tenant_id,
            source = %entry.source,
            entry_id = %entry.entry_id,
            amount = entry.total_debits() as i64,
            accounts_opened = opened,
            "journal entry posted"
        );
        Ok(entry)
    }

    /// Reverse the active entry of a source document.
    pub fn reverse(
        &self,
        tenant_id: TenantId,
        source: SourceDocument,
        reversal_date: Option<NaiveDate>,
        reason: Option<String>,
    ) -> Result<JournalEntry, DispatchError> {
        let dispatched = self.execute(
            tenant_id,
            LedgerCommand::ReverseFinancialEvent(ReverseFinancialEvent {
                tenant_id,
                ledger_id: Self::ledger_id(tenant_id),
                source,
                reversal_id: Uuid::now_v7(),
                reversal_date,
                reason,
                occurred_at: Utc::now(),
            }),
        )?;
        let reversal = require_posted(&dispatched)?;
        info!(
            tenant_id = %tenant_id,
            source = %reversal.source,
            entry_id = %reversal.entry_id,
            reverses = ?reversal.reverses,
            "journal entry reversed"
        );
        Ok(reversal)
    }

    /// Replace the active entry of a source document with one for `event`.
    pub fn amend(&self, tenant_id: TenantId, event: FinancialEvent) -> Result<JournalEntry, DispatchError> {
        let dispatched = self.execute(
            tenant_id,
            LedgerCommand::AmendFinancialEvent(AmendFinancialEvent {
                tenant_id,
                ledger_id: Self::ledger_id(tenant_id),
                event,
                reversal_id: Uuid::now_v7(),
                entry_id: Uuid::now_v7(),
                occurred_at: Utc::now(),
            }),
        )?;
        let entry = require_posted(&dispatched)?;
        info!(
            tenant_id = %tenant_id,
            source = %entry.source,
            entry_id = %entry.entry_id,
            "journal entry amended"
        );
        Ok(entry)
    }

    /// Post a manual entry against existing chart accounts.
    pub fn post_manual(&self, tenant_id: TenantId, manual: ManualEntry) -> Result<JournalEntry, DispatchError> {
        let ledger = self.ledger(tenant_id)?;
        if !ledger.is_opened() {
            return Err(LedgerError::LedgerNotOpened.into());
        }

        let legs = manual
            .lines
            .into_iter()
            .map(|(code, side, amount)| {
                ledger
                    .chart()
                    .get(&code)
                    .cloned()
                    .map(|account| (account, side, amount))
                    .ok_or(LedgerError::UnknownAccount(code))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let entry = JournalEntry::balanced(
            Uuid::now_v7(),
            manual.entry_date,
            SourceDocument::new(SourceKind::Manual, manual.reference)?,
            legs,
        )?
        .with_description(manual.description);

        let dispatched = self.execute(
            tenant_id,
            LedgerCommand::PostJournalEntry(PostJournalEntry {
                tenant_id,
                ledger_id: Self::ledger_id(tenant_id),
                entry,
                occurred_at: Utc::now(),
            }),
        )?;
        let entry = require_posted(&dispatched)?;
        info!(
            tenant_id = %tenant_id,
            source = %entry.source,
            entry_id = %entry.entry_id,
            lines = entry.lines.len(),
            "manual journal entry posted"
        );
        Ok(entry)
    }
}

fn command_name(command: &LedgerCommand) -> &'static str {
    match command {
        LedgerCommand::OpenLedger(_) => "open_ledger",
        LedgerCommand::OpenAccount(_) => "open_account",
        LedgerCommand::PostJournalEntry(_) => "post_manual",
        LedgerCommand::RecordFinancialEvent(_) => "post",
        LedgerCommand::ReverseFinancialEvent(_) => "reverse",
        LedgerCommand::AmendFinancialEvent(_) => "amend",
    }
}

/// The last entry a batch posted (a replacement comes after its reversal).
fn last_posted(dispatched: &Dispatched<LedgerEvent>) -> Option<JournalEntry> {
    dispatched
        .events
        .iter()
        .rev()
        .find_map(|e| e.posted_entry().cloned())
}

fn require_posted(dispatched: &Dispatched<LedgerEvent>) -> Result<JournalEntry, DispatchError> {
    last_posted(dispatched).ok_or_else(|| {
        DispatchError::Unexpected("committed batch contains no journal entry".to_string())
    })
}

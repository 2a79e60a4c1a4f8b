use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerforge_core::{Aggregate, AggregateId, AggregateRoot, TenantId};
use ledgerforge_events::Event;

use crate::account::Account;
use crate::chart::{ChartOfAccounts, PostingPolicy, SystemAccount};
use crate::error::LedgerError;
use crate::financial_event::FinancialEvent;
use crate::journal::{JournalEntry, SourceDocument, SourceKind};
use crate::poster::JournalPoster;

/// Aggregate type tag used for ledger streams.
pub const LEDGER_AGGREGATE_TYPE: &str = "accounting.ledger";

/// Ledger identifier (aggregate id).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(pub AggregateId);

impl LedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PostedEntry {
    entry: JournalEntry,
    reversed_by: Option<Uuid>,
}

/// Aggregate root: Ledger (chart of accounts + double-entry journal).
///
/// The ledger owns the consistency boundary: everything one command changes
/// (accounts opened on demand, the entry, its reversal) is emitted as one
/// batch of events. Balances are not held here; projections derive them from
/// `JournalEntryPosted` / `JournalEntryReversed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    id: LedgerId,
    tenant_id: Option<TenantId>,
    version: u64,
    opened: bool,
    policy: PostingPolicy,
    chart: ChartOfAccounts,
    entries: HashMap<Uuid, PostedEntry>,
    active_by_source: HashMap<SourceDocument, Uuid>,
}

impl Ledger {
    /// Empty aggregate for rehydration, using the default posting policy.
    pub fn empty(id: LedgerId) -> Self {
        Self::with_policy(id, PostingPolicy::default())
    }

    pub fn with_policy(id: LedgerId, policy: PostingPolicy) -> Self {
        Self {
            id,
            tenant_id: None,
            version: 0,
            opened: false,
            policy,
            chart: ChartOfAccounts::new(),
            entries: HashMap::new(),
            active_by_source: HashMap::new(),
        }
    }

    pub fn id_typed(&self) -> LedgerId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    pub fn policy(&self) -> &PostingPolicy {
        &self.policy
    }

    pub fn entry(&self, entry_id: Uuid) -> Option<&JournalEntry> {
        self.entries.get(&entry_id).map(|p| &p.entry)
    }

    /// The entry currently standing for a source document (not reversed).
    pub fn active_entry(&self, source: &SourceDocument) -> Option<&JournalEntry> {
        self.active_by_source
            .get(source)
            .and_then(|id| self.entry(*id))
    }

    pub fn is_reversed(&self, entry_id: Uuid) -> bool {
        self.entries
            .get(&entry_id)
            .is_some_and(|p| p.reversed_by.is_some())
    }
}

impl AggregateRoot for Ledger {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenLedger (initial chart of accounts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLedger {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub accounts: Vec<Account>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: OpenAccount, optionally with an opening balance.
///
/// `opening_balance` is in the account's natural sign: positive increases the
/// account, negative is a contra balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccount {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub account: Account,
    pub opening_balance: i64,
    pub opened_on: NaiveDate,
    pub entry_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PostJournalEntry (manual entry against existing accounts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostJournalEntry {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub entry: JournalEntry,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordFinancialEvent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFinancialEvent {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub event: FinancialEvent,
    pub entry_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseFinancialEvent (void / delete of the source document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseFinancialEvent {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub source: SourceDocument,
    pub reversal_id: Uuid,
    /// Defaults to the original entry date.
    pub reversal_date: Option<NaiveDate>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendFinancialEvent (update of the source document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendFinancialEvent {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub event: FinancialEvent,
    pub reversal_id: Uuid,
    pub entry_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    OpenLedger(OpenLedger),
    OpenAccount(OpenAccount),
    PostJournalEntry(PostJournalEntry),
    RecordFinancialEvent(RecordFinancialEvent),
    ReverseFinancialEvent(ReverseFinancialEvent),
    AmendFinancialEvent(AmendFinancialEvent),
}

impl LedgerCommand {
    fn tenant_id(&self) -> TenantId {
        match self {
            LedgerCommand::OpenLedger(c) => c.tenant_id,
            LedgerCommand::OpenAccount(c) => c.tenant_id,
            LedgerCommand::PostJournalEntry(c) => c.tenant_id,
            LedgerCommand::RecordFinancialEvent(c) => c.tenant_id,
            LedgerCommand::ReverseFinancialEvent(c) => c.tenant_id,
            LedgerCommand::AmendFinancialEvent(c) => c.tenant_id,
        }
    }
}

/// Event: LedgerOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOpened {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub accounts: Vec<Account>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AccountOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub account: Account,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JournalEntryPosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryPosted {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub entry: JournalEntry,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JournalEntryReversed. `reversal.reverses == Some(original_entry_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryReversed {
    pub tenant_id: TenantId,
    pub ledger_id: LedgerId,
    pub original_entry_id: Uuid,
    pub reversal: JournalEntry,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    LedgerOpened(LedgerOpened),
    AccountOpened(AccountOpened),
    JournalEntryPosted(JournalEntryPosted),
    JournalEntryReversed(JournalEntryReversed),
}

impl LedgerEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            LedgerEvent::LedgerOpened(e) => e.tenant_id,
            LedgerEvent::AccountOpened(e) => e.tenant_id,
            LedgerEvent::JournalEntryPosted(e) => e.tenant_id,
            LedgerEvent::JournalEntryReversed(e) => e.tenant_id,
        }
    }

    /// The journal entry this event posts, if any (original or reversal).
    pub fn posted_entry(&self) -> Option<&JournalEntry> {
        match self {
            LedgerEvent::JournalEntryPosted(e) => Some(&e.entry),
            LedgerEvent::JournalEntryReversed(e) => Some(&e.reversal),
            _ => None,
        }
    }
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::LedgerOpened(_) => "accounting.ledger.opened",
            LedgerEvent::AccountOpened(_) => "accounting.ledger.account_opened",
            LedgerEvent::JournalEntryPosted(_) => "accounting.ledger.journal_entry_posted",
            LedgerEvent::JournalEntryReversed(_) => "accounting.ledger.journal_entry_reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::LedgerOpened(e) => e.occurred_at,
            LedgerEvent::AccountOpened(e) => e.occurred_at,
            LedgerEvent::JournalEntryPosted(e) => e.occurred_at,
            LedgerEvent::JournalEntryReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Ledger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::LedgerOpened(e) => {
                self.id = e.ledger_id;
                self.tenant_id = Some(e.tenant_id);
                self.opened = true;
                for account in &e.accounts {
                    // Replay must not fail; duplicates were rejected when decided.
                    let _ = self.chart.insert(account.clone());
                }
            }
            LedgerEvent::AccountOpened(e) => {
                let _ = self.chart.insert(e.account.clone());
            }
            LedgerEvent::JournalEntryPosted(e) => {
                let entry = e.entry.clone();
                self.active_by_source
                    .insert(entry.source.clone(), entry.entry_id);
                self.entries.insert(
                    entry.entry_id,
                    PostedEntry {
                        entry,
                        reversed_by: None,
                    },
                );
            }
            LedgerEvent::JournalEntryReversed(e) => {
                if let Some(original) = self.entries.get_mut(&e.original_entry_id) {
                    original.reversed_by = Some(e.reversal.entry_id);
                    let source = original.entry.source.clone();
                    if self.active_by_source.get(&source) == Some(&e.original_entry_id) {
                        self.active_by_source.remove(&source);
                    }
                }
                self.entries.insert(
                    e.reversal.entry_id,
                    PostedEntry {
                        entry: e.reversal.clone(),
                        reversed_by: None,
                    },
                );
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_tenant(command.tenant_id())?;

        match command {
            LedgerCommand::OpenLedger(cmd) => self.handle_open_ledger(cmd),
            LedgerCommand::OpenAccount(cmd) => self.handle_open_account(cmd),
            LedgerCommand::PostJournalEntry(cmd) => self.handle_post_manual(cmd),
            LedgerCommand::RecordFinancialEvent(cmd) => self.handle_record(cmd),
            LedgerCommand::ReverseFinancialEvent(cmd) => self.handle_reverse(cmd),
            LedgerCommand::AmendFinancialEvent(cmd) => self.handle_amend(cmd),
        }
    }
}

impl Ledger {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), LedgerError> {
        match self.tenant_id {
            Some(t) if t != tenant_id => Err(LedgerError::TenantMismatch),
            _ => Ok(()),
        }
    }

    fn ensure_opened(&self) -> Result<(), LedgerError> {
        if self.opened {
            Ok(())
        } else {
            Err(LedgerError::LedgerNotOpened)
        }
    }

    fn ensure_not_posted(&self, source: &SourceDocument) -> Result<(), LedgerError> {
        if self.active_by_source.contains_key(source) {
            return Err(LedgerError::DuplicatePosting(source.clone()));
        }
        Ok(())
    }

    fn handle_open_ledger(&self, cmd: &OpenLedger) -> Result<Vec<LedgerEvent>, LedgerError> {
        if self.opened {
            return Err(LedgerError::AlreadyOpened);
        }
        for account in &cmd.accounts {
            account.validate()?;
        }
        // Validates duplicate codes.
        ChartOfAccounts::from_accounts(cmd.accounts.iter().cloned())?;

        Ok(vec![LedgerEvent::LedgerOpened(LedgerOpened {
            tenant_id: cmd.tenant_id,
            ledger_id: cmd.ledger_id,
            accounts: cmd.accounts.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_open_account(&self, cmd: &OpenAccount) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_opened()?;
        if self.chart.contains(&cmd.account.code) {
            return Err(LedgerError::DuplicateAccount(cmd.account.code.clone()));
        }
        cmd.account.validate()?;

        let mut events = vec![LedgerEvent::AccountOpened(AccountOpened {
            tenant_id: cmd.tenant_id,
            ledger_id: cmd.ledger_id,
            account: cmd.account.clone(),
            occurred_at: cmd.occurred_at,
        })];

        if cmd.opening_balance != 0 {
            let equity = self.chart.system(SystemAccount::OpeningBalanceEquity)?.clone();
            let source = SourceDocument::new(SourceKind::OpeningBalance, cmd.account.code.as_str())?;
            self.ensure_not_posted(&source)?;

            let normal = cmd.account.kind.normal_side();
            let side = if cmd.opening_balance > 0 { normal } else { normal.opposite() };
            let amount = cmd
                .opening_balance
                .checked_abs()
                .ok_or_else(|| LedgerError::validation("opening balance out of range"))?;

            let entry = JournalEntry::balanced(
                cmd.entry_id,
                cmd.opened_on,
                source,
                [
                    (cmd.account.clone(), side, amount),
                    (equity, side.opposite(), amount),
                ],
            )?
            .with_description(Some(format!("Opening balance: {}", cmd.account.name)));

            events.push(LedgerEvent::JournalEntryPosted(JournalEntryPosted {
                tenant_id: cmd.tenant_id,
                ledger_id: cmd.ledger_id,
                entry,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_post_manual(&self, cmd: &PostJournalEntry) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_opened()?;
        cmd.entry.validate()?;
        if cmd.entry.source.kind != SourceKind::Manual {
            return Err(LedgerError::validation(format!(
                "{} cannot be posted as a manual entry",
                cmd.entry.source
            )));
        }
        self.ensure_not_posted(&cmd.entry.source)?;
        if cmd.entry.reverses.is_some() {
            return Err(LedgerError::validation(
                "reversing entries are posted through reversal, not manually",
            ));
        }

        // Lines must reference chart accounts; use the chart's canonical metadata.
        let mut entry = cmd.entry.clone();
        for line in &mut entry.lines {
            let account = self
                .chart
                .get(&line.account.code)
                .ok_or_else(|| LedgerError::UnknownAccount(line.account.code.clone()))?;
            line.account = account.clone();
        }

        Ok(vec![LedgerEvent::JournalEntryPosted(JournalEntryPosted {
            tenant_id: cmd.tenant_id,
            ledger_id: cmd.ledger_id,
            entry,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn plan_events(
        &self,
        tenant_id: TenantId,
        ledger_id: LedgerId,
        event: &FinancialEvent,
        entry_id: Uuid,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let plan = JournalPoster::new(&self.policy).plan(&self.chart, event, entry_id)?;

        let mut events: Vec<LedgerEvent> = plan
            .accounts_to_open
            .into_iter()
            .map(|account| {
                LedgerEvent::AccountOpened(AccountOpened {
                    tenant_id,
                    ledger_id,
                    account,
                    occurred_at,
                })
            })
            .collect();

        events.push(LedgerEvent::JournalEntryPosted(JournalEntryPosted {
            tenant_id,
            ledger_id,
            entry: plan.entry,
            occurred_at,
        }));
        Ok(events)
    }

    fn handle_record(&self, cmd: &RecordFinancialEvent) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_opened()?;
        let source = cmd.event.source()?;
        self.ensure_not_posted(&source)?;

        self.plan_events(cmd.tenant_id, cmd.ledger_id, &cmd.event, cmd.entry_id, cmd.occurred_at)
    }

    fn reversal_event(
        &self,
        tenant_id: TenantId,
        ledger_id: LedgerId,
        source: &SourceDocument,
        reversal_id: Uuid,
        reversal_date: Option<NaiveDate>,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<LedgerEvent, LedgerError> {
        let original_id = *self
            .active_by_source
            .get(source)
            .ok_or_else(|| LedgerError::NotFound(source.clone()))?;
        let posted = self
            .entries
            .get(&original_id)
            .ok_or_else(|| LedgerError::NotFound(source.clone()))?;
        if posted.reversed_by.is_some() {
            return Err(LedgerError::AlreadyReversed(original_id));
        }

        let date = reversal_date.unwrap_or(posted.entry.entry_date);
        let reversal = posted.entry.reversal(reversal_id, date, reason);
        reversal.validate()?;

        Ok(LedgerEvent::JournalEntryReversed(JournalEntryReversed {
            tenant_id,
            ledger_id,
            original_entry_id: original_id,
            reversal,
            occurred_at,
        }))
    }

    fn handle_reverse(&self, cmd: &ReverseFinancialEvent) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_opened()?;
        if let Some(entry_id) = self.reversed_entry_for(&cmd.source) {
            return Err(LedgerError::AlreadyReversed(entry_id));
        }
        let ev = self.reversal_event(
            cmd.tenant_id,
            cmd.ledger_id,
            &cmd.source,
            cmd.reversal_id,
            cmd.reversal_date,
            cmd.reason.clone(),
            cmd.occurred_at,
        )?;
        Ok(vec![ev])
    }

    fn handle_amend(&self, cmd: &AmendFinancialEvent) -> Result<Vec<LedgerEvent>, LedgerError> {
        self.ensure_opened()?;
        let source = cmd.event.source()?;

        let reversal = self.reversal_event(
            cmd.tenant_id,
            cmd.ledger_id,
            &source,
            cmd.reversal_id,
            None,
            Some(format!("Amendment of {source}")),
            cmd.occurred_at,
        )?;

        // Plan against the current chart; the reversal does not change it.
        let mut events = vec![reversal];
        events.extend(self.plan_events(
            cmd.tenant_id,
            cmd.ledger_id,
            &cmd.event,
            cmd.entry_id,
            cmd.occurred_at,
        )?);
        Ok(events)
    }

    /// Latest reversed entry for a source that has no active entry.
    fn reversed_entry_for(&self, source: &SourceDocument) -> Option<Uuid> {
        if self.active_by_source.contains_key(source) {
            return None;
        }
        self.entries
            .values()
            .filter(|p| &p.entry.source == source && p.entry.reverses.is_none())
            .filter(|p| p.reversed_by.is_some())
            .map(|p| p.entry.entry_id)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountCode, AccountKind, AccountRole, Side};
    use crate::financial_event::{EventDetail, PaymentMethod};
    use ledgerforge_core::AggregateId;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_ledger_id() -> LedgerId {
        LedgerId::new(AggregateId::new())
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn execute(ledger: &mut Ledger, cmd: LedgerCommand) -> Result<Vec<LedgerEvent>, LedgerError> {
        let events = ledger.handle(&cmd)?;
        for e in &events {
            ledger.apply(e);
        }
        Ok(events)
    }

    fn opened_ledger(tenant_id: TenantId) -> Ledger {
        let ledger_id = test_ledger_id();
        let mut ledger = Ledger::empty(ledger_id);
        execute(
            &mut ledger,
            LedgerCommand::OpenLedger(OpenLedger {
                tenant_id,
                ledger_id,
                accounts: ChartOfAccounts::standard().iter().cloned().collect(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        ledger
    }

    fn expense(id: &str, amount: i64, payment: PaymentMethod) -> FinancialEvent {
        FinancialEvent {
            id: id.to_string(),
            date: date(10),
            amount,
            description: None,
            reference: None,
            detail: EventDetail::Expense {
                category: "Utilities".to_string(),
                payment,
            },
        }
    }

    fn record(ledger: &Ledger, tenant_id: TenantId, event: FinancialEvent) -> LedgerCommand {
        LedgerCommand::RecordFinancialEvent(RecordFinancialEvent {
            tenant_id,
            ledger_id: ledger.id_typed(),
            event,
            entry_id: Uuid::now_v7(),
            occurred_at: Utc::now(),
        })
    }

    fn reverse(ledger: &Ledger, tenant_id: TenantId, source: SourceDocument) -> LedgerCommand {
        LedgerCommand::ReverseFinancialEvent(ReverseFinancialEvent {
            tenant_id,
            ledger_id: ledger.id_typed(),
            source,
            reversal_id: Uuid::now_v7(),
            reversal_date: None,
            reason: None,
            occurred_at: Utc::now(),
        })
    }

    /// Debit-positive balances from a stream of events.
    fn balances(events: &[LedgerEvent]) -> BTreeMap<AccountCode, i128> {
        let mut out = BTreeMap::new();
        for e in events {
            if let Some(entry) = e.posted_entry() {
                for line in &entry.lines {
                    *out.entry(line.account.code.clone()).or_insert(0) += line.signed_amount();
                }
            }
        }
        out
    }

    #[test]
    fn posting_before_opening_is_rejected() {
        let tenant_id = test_tenant_id();
        let ledger = Ledger::empty(test_ledger_id());
        let err = ledger
            .handle(&record(&ledger, tenant_id, expense("e1", 100, PaymentMethod::Cash)))
            .unwrap_err();
        assert_eq!(err, LedgerError::LedgerNotOpened);
    }

    #[test]
    fn opening_twice_is_a_conflict() {
        let tenant_id = test_tenant_id();
        let ledger = opened_ledger(tenant_id);
        let err = ledger
            .handle(&LedgerCommand::OpenLedger(OpenLedger {
                tenant_id,
                ledger_id: ledger.id_typed(),
                accounts: vec![],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyOpened);
    }

    #[test]
    fn recording_opens_missing_accounts_in_the_same_batch() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        let ev = expense("e1", 1_999, PaymentMethod::Bank { account: "ICICI".to_string() });

        let events = { let cmd = record(&ledger, tenant_id, ev); execute(&mut ledger, cmd) }.unwrap();

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], LedgerEvent::AccountOpened(_)));
        assert!(matches!(events[1], LedgerEvent::AccountOpened(_)));
        let LedgerEvent::JournalEntryPosted(posted) = &events[2] else {
            panic!("expected JournalEntryPosted last");
        };
        assert!(posted.entry.is_balanced());

        let bank = AccountCode::new("1100-ICICI").unwrap();
        assert_eq!(ledger.chart().get(&bank).unwrap().role, AccountRole::Bank);
        assert!(ledger.chart().contains(&AccountCode::new("6200").unwrap()));
    }

    #[test]
    fn duplicate_source_document_is_rejected() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        { let cmd = record(&ledger, tenant_id, expense("e1", 100, PaymentMethod::Cash)); execute(&mut ledger, cmd) }
            .unwrap();

        let err = ledger
            .handle(&record(&ledger, tenant_id, expense("e1", 100, PaymentMethod::Cash)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePosting(_)));
    }

    #[test]
    fn reversal_is_found_by_source_and_restores_balances() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        let ev = expense("e1", 4_200, PaymentMethod::Cash);
        let source = ev.source().unwrap();

        let mut all = { let cmd = record(&ledger, tenant_id, ev); execute(&mut ledger, cmd) }.unwrap();
        // A second expense with identical amount/date must not be touched.
        all.extend(
            { let cmd = record(&ledger, tenant_id, expense("e2", 4_200, PaymentMethod::Cash)); execute(&mut ledger, cmd) }
                .unwrap(),
        );
        let before_second = balances(&all[..all.len() - 1]);

        let reversed = { let cmd = reverse(&ledger, tenant_id, source.clone()); execute(&mut ledger, cmd) }.unwrap();
        let LedgerEvent::JournalEntryReversed(r) = &reversed[0] else {
            panic!("expected reversal");
        };
        assert_eq!(r.reversal.reverses, Some(r.original_entry_id));
        assert_eq!(r.reversal.entry_date, date(10));
        all.extend(reversed);

        let cash = SystemAccount::Cash.code();
        let after = balances(&all);
        assert_eq!(after[&cash], -4_200);
        assert_eq!(before_second[&cash], -4_200);
        assert!(ledger.active_entry(&source).is_none());
        assert!(ledger
            .active_entry(&SourceDocument::new(SourceKind::Expense, "e2").unwrap())
            .is_some());
    }

    #[test]
    fn second_reversal_is_rejected_and_unknown_source_is_not_found() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        let ev = expense("e1", 100, PaymentMethod::Cash);
        let source = ev.source().unwrap();
        { let cmd = record(&ledger, tenant_id, ev); execute(&mut ledger, cmd) }.unwrap();
        { let cmd = reverse(&ledger, tenant_id, source.clone()); execute(&mut ledger, cmd) }.unwrap();

        let err = ledger.handle(&reverse(&ledger, tenant_id, source)).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyReversed(_)));

        let missing = SourceDocument::new(SourceKind::Expense, "nope").unwrap();
        let err = ledger.handle(&reverse(&ledger, tenant_id, missing)).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn reversed_source_can_be_posted_again() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        let ev = expense("e1", 100, PaymentMethod::Cash);
        { let cmd = record(&ledger, tenant_id, ev.clone()); execute(&mut ledger, cmd) }.unwrap();
        { let cmd = reverse(&ledger, tenant_id, ev.source().unwrap()); execute(&mut ledger, cmd) }.unwrap();
        assert!({ let cmd = record(&ledger, tenant_id, ev); execute(&mut ledger, cmd) }.is_ok());
    }

    #[test]
    fn amend_replaces_the_entry_atomically() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        let ev = expense("e1", 1_000, PaymentMethod::Cash);
        let mut all = { let cmd = record(&ledger, tenant_id, ev.clone()); execute(&mut ledger, cmd) }.unwrap();

        let mut amended = ev.clone();
        amended.amount = 1_500;
        let events = { let cmd = LedgerCommand::AmendFinancialEvent(AmendFinancialEvent {
                tenant_id,
                ledger_id: ledger.id_typed(),
                event: amended,
                reversal_id: Uuid::now_v7(),
                entry_id: Uuid::now_v7(),
                occurred_at: Utc::now(),
            }); execute(&mut ledger, cmd) }
        .unwrap();
        assert!(matches!(events[0], LedgerEvent::JournalEntryReversed(_)));
        assert!(matches!(events.last(), Some(LedgerEvent::JournalEntryPosted(_))));
        all.extend(events);

        assert_eq!(balances(&all)[&SystemAccount::Cash.code()], -1_500);
        assert_eq!(
            ledger.active_entry(&ev.source().unwrap()).unwrap().lines[0].amount,
            1_500
        );
    }

    #[test]
    fn amend_without_active_entry_is_not_found() {
        let tenant_id = test_tenant_id();
        let ledger = opened_ledger(tenant_id);
        let err = ledger
            .handle(&LedgerCommand::AmendFinancialEvent(AmendFinancialEvent {
                tenant_id,
                ledger_id: ledger.id_typed(),
                event: expense("ghost", 10, PaymentMethod::Cash),
                reversal_id: Uuid::now_v7(),
                entry_id: Uuid::now_v7(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn opening_balance_posts_against_equity() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        let bank = Account::new(AccountCode::new("1100-SBI").unwrap(), "SBI", AccountKind::Asset)
            .with_role(AccountRole::Bank);

        let events = { let cmd = LedgerCommand::OpenAccount(OpenAccount {
                tenant_id,
                ledger_id: ledger.id_typed(),
                account: bank.clone(),
                opening_balance: 50_000,
                opened_on: date(1),
                entry_id: Uuid::now_v7(),
                occurred_at: Utc::now(),
            }); execute(&mut ledger, cmd) }
        .unwrap();

        let b = balances(&events);
        assert_eq!(b[&bank.code], 50_000);
        assert_eq!(b[&SystemAccount::OpeningBalanceEquity.code()], -50_000);

        let err = ledger
            .handle(&LedgerCommand::OpenAccount(OpenAccount {
                tenant_id,
                ledger_id: ledger.id_typed(),
                account: bank,
                opening_balance: 0,
                opened_on: date(1),
                entry_id: Uuid::now_v7(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAccount(_)));
    }

    #[test]
    fn manual_entry_must_use_chart_accounts() {
        let tenant_id = test_tenant_id();
        let ledger = opened_ledger(tenant_id);
        let stranger = Account::new(AccountCode::new("9999").unwrap(), "?", AccountKind::Asset);
        let entry = JournalEntry::balanced(
            Uuid::now_v7(),
            date(2),
            SourceDocument::new(SourceKind::Manual, "jv-1").unwrap(),
            [
                (stranger, Side::Debit, 10),
                (SystemAccount::Cash.account(), Side::Credit, 10),
            ],
        )
        .unwrap();

        let err = ledger
            .handle(&LedgerCommand::PostJournalEntry(PostJournalEntry {
                tenant_id,
                ledger_id: ledger.id_typed(),
                entry,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount(_)));
    }

    #[test]
    fn manual_entry_cannot_claim_a_document_source() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        let entry = JournalEntry::balanced(
            Uuid::now_v7(),
            date(2),
            SourceDocument::new(SourceKind::Expense, "e1").unwrap(),
            [
                (SystemAccount::OpeningBalanceEquity.account(), Side::Debit, 10),
                (SystemAccount::Cash.account(), Side::Credit, 10),
            ],
        )
        .unwrap();

        let err = ledger
            .handle(&LedgerCommand::PostJournalEntry(PostJournalEntry {
                tenant_id,
                ledger_id: ledger.id_typed(),
                entry,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        // The expense slot is still free for the real document.
        let cmd = record(&ledger, tenant_id, expense("e1", 10, PaymentMethod::Cash));
        execute(&mut ledger, cmd).unwrap();
    }

    #[test]
    fn money_role_on_a_non_asset_account_is_rejected() {
        let tenant_id = test_tenant_id();
        let ledger = opened_ledger(tenant_id);
        let open = |account: Account| {
            ledger.handle(&LedgerCommand::OpenAccount(OpenAccount {
                tenant_id,
                ledger_id: ledger.id_typed(),
                account,
                opening_balance: 0,
                opened_on: date(1),
                entry_id: Uuid::now_v7(),
                occurred_at: Utc::now(),
            }))
        };

        let loan = Account::new(AccountCode::new("1100-LOAN").unwrap(), "Loan", AccountKind::Liability)
            .with_role(AccountRole::Bank);
        assert!(matches!(open(loan).unwrap_err(), LedgerError::Validation(_)));

        let payable = Account::new(AccountCode::new("2100").unwrap(), "Other AP", AccountKind::Asset)
            .with_role(AccountRole::Payable);
        assert!(matches!(open(payable).unwrap_err(), LedgerError::Validation(_)));

        let fresh = Ledger::empty(test_ledger_id());
        let err = fresh
            .handle(&LedgerCommand::OpenLedger(OpenLedger {
                tenant_id,
                ledger_id: fresh.id_typed(),
                accounts: vec![
                    Account::new(AccountCode::new("1000").unwrap(), "Cash", AccountKind::Expense)
                        .with_role(AccountRole::Cash),
                ],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn other_tenant_is_rejected() {
        let ledger = opened_ledger(test_tenant_id());
        let err = ledger
            .handle(&record(&ledger, test_tenant_id(), expense("e1", 1, PaymentMethod::Cash)))
            .unwrap_err();
        assert_eq!(err, LedgerError::TenantMismatch);
    }

    #[test]
    fn events_survive_a_json_round_trip() {
        let tenant_id = test_tenant_id();
        let mut ledger = opened_ledger(tenant_id);
        let events = { let cmd = record(&ledger, tenant_id, expense("e1", 77, PaymentMethod::Bank { account: "Axis".into() })); execute(&mut ledger, cmd) }
        .unwrap();
        let json = serde_json::to_value(&events).unwrap();
        let back: Vec<LedgerEvent> = serde_json::from_value(json).unwrap();
        assert_eq!(back, events);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Every posted entry balances, and each account's balance equals the
        /// signed sum of the legs applied to it.
        #[test]
        fn postings_balance_and_balances_are_leg_sums(
            amounts in prop::collection::vec((1i64..1_000_000i64, any::<bool>()), 1..20)
        ) {
            let tenant_id = test_tenant_id();
            let mut ledger = opened_ledger(tenant_id);
            let mut all = Vec::new();
            let mut expected_cash: i128 = 0;

            for (idx, (amount, pay)) in amounts.iter().enumerate() {
                let ev = if *pay {
                    expense(&format!("e{idx}"), *amount, PaymentMethod::Cash)
                } else {
                    FinancialEvent {
                        id: format!("p{idx}"),
                        date: date(12),
                        amount: *amount,
                        description: None,
                        reference: None,
                        detail: EventDetail::CustomerPayment {
                            customer: "Initech".to_string(),
                            payment: PaymentMethod::Cash,
                        },
                    }
                };
                expected_cash += if *pay { -(*amount as i128) } else { *amount as i128 };

                let events = { let cmd = record(&ledger, tenant_id, ev); execute(&mut ledger, cmd) }.unwrap();
                for e in &events {
                    if let Some(entry) = e.posted_entry() {
                        prop_assert_eq!(entry.total_debits(), entry.total_credits());
                    }
                }
                all.extend(events);
            }

            let b = balances(&all);
            prop_assert_eq!(b.get(&SystemAccount::Cash.code()).copied().unwrap_or(0), expected_cash);
            prop_assert_eq!(b.values().sum::<i128>(), 0);
        }

        /// Reversing any subset of postings restores exactly the balances of
        /// the postings that remain.
        #[test]
        fn reversal_restores_prior_balances(
            amounts in prop::collection::vec((1i64..100_000i64, any::<bool>()), 1..15)
        ) {
            let tenant_id = test_tenant_id();
            let mut ledger = opened_ledger(tenant_id);
            let mut all = Vec::new();
            let mut kept: i128 = 0;

            for (idx, (amount, _)) in amounts.iter().enumerate() {
                let ev = expense(&format!("e{idx}"), *amount, PaymentMethod::Cash);
                all.extend({ let cmd = record(&ledger, tenant_id, ev); execute(&mut ledger, cmd) }.unwrap());
            }
            for (idx, (amount, undo)) in amounts.iter().enumerate() {
                if *undo {
                    let source = SourceDocument::new(SourceKind::Expense, format!("e{idx}")).unwrap();
                    all.extend({ let cmd = reverse(&ledger, tenant_id, source); execute(&mut ledger, cmd) }.unwrap());
                } else {
                    kept += *amount as i128;
                }
            }

            let b = balances(&all);
            prop_assert_eq!(b[&SystemAccount::Cash.code()], -kept);
            prop_assert_eq!(b[&AccountCode::new("6200").unwrap()], kept);
        }
    }
}

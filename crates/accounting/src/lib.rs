//! Accounting module (double-entry ledger, event-sourced).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. Financial
//! events (expenses, payments, refunds, vendor bills, returns) are resolved to
//! accounts by the [`JournalPoster`] and committed through the [`Ledger`]
//! aggregate as balanced journal entries.

pub mod account;
pub mod chart;
pub mod error;
pub mod financial_event;
pub mod journal;
pub mod ledger;
pub mod poster;
pub mod reports;

pub use account::{Account, AccountCode, AccountKind, AccountRole, Side};
pub use chart::{CategoryAccount, ChartOfAccounts, PostingPolicy, SystemAccount};
pub use error::{ErrorClass, LedgerError};
pub use financial_event::{EventDetail, FinancialEvent, PaymentMethod};
pub use journal::{JournalEntry, JournalLine, SourceDocument, SourceKind};
pub use ledger::{
    AccountOpened, AmendFinancialEvent, JournalEntryPosted, JournalEntryReversed, Ledger,
    LedgerCommand, LedgerEvent, LedgerId, LedgerOpened, OpenAccount, OpenLedger,
    PostJournalEntry, RecordFinancialEvent, ReverseFinancialEvent, LEDGER_AGGREGATE_TYPE,
};
pub use poster::{JournalPoster, PostingPlan};
pub use reports::{ProfitAndLoss, ProfitAndLossLine, TrialBalance, TrialBalanceRow};

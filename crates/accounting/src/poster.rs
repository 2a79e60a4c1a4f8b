//! Journal poster: resolves a financial event to accounts and builds its
//! balanced two-line entry.

use uuid::Uuid;

use crate::account::{Account, AccountKind, AccountRole, Side};
use crate::chart::{ChartOfAccounts, PostingPolicy, SystemAccount};
use crate::error::LedgerError;
use crate::financial_event::{EventDetail, FinancialEvent, PaymentMethod};
use crate::journal::JournalEntry;

/// Result of planning a posting: accounts that must be opened first, then the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingPlan {
    pub accounts_to_open: Vec<Account>,
    pub entry: JournalEntry,
}

/// Stateless poster bound to a posting policy.
#[derive(Debug, Clone, Copy)]
pub struct JournalPoster<'a> {
    policy: &'a PostingPolicy,
}

impl<'a> JournalPoster<'a> {
    pub fn new(policy: &'a PostingPolicy) -> Self {
        Self { policy }
    }

    /// Plan the posting of `event` against `chart`.
    ///
    /// | event               | debit            | credit            |
    /// |---------------------|------------------|-------------------|
    /// | Expense             | category expense | cash / bank       |
    /// | CustomerPayment     | cash / bank      | receivable        |
    /// | CustomerRefund      | sales returns    | cash / bank       |
    /// | VendorBill          | category expense | payable           |
    /// | VendorBillPayment   | payable          | cash / bank       |
    /// | PurchaseReturn      | payable          | purchase returns  |
    /// | CustomerInvoice     | receivable       | sales revenue     |
    pub fn plan(
        &self,
        chart: &ChartOfAccounts,
        event: &FinancialEvent,
        entry_id: Uuid,
    ) -> Result<PostingPlan, LedgerError> {
        event.validate()?;

        let mut resolver = Resolver {
            chart,
            policy: self.policy,
            pending: Vec::new(),
        };

        let (debit, credit) = match &event.detail {
            EventDetail::Expense { category, payment } => {
                (resolver.expense(category)?, resolver.money(payment)?)
            }
            EventDetail::CustomerPayment { payment, .. } => (
                resolver.money(payment)?,
                resolver.system(SystemAccount::AccountsReceivable)?,
            ),
            EventDetail::CustomerRefund { payment, .. } => (
                resolver.system(SystemAccount::SalesReturns)?,
                resolver.money(payment)?,
            ),
            EventDetail::VendorBill { category, .. } => (
                resolver.expense(category)?,
                resolver.system(SystemAccount::AccountsPayable)?,
            ),
            EventDetail::VendorBillPayment { payment, .. } => (
                resolver.system(SystemAccount::AccountsPayable)?,
                resolver.money(payment)?,
            ),
            EventDetail::PurchaseReturn { .. } => (
                resolver.system(SystemAccount::AccountsPayable)?,
                resolver.system(SystemAccount::PurchaseReturns)?,
            ),
            EventDetail::CustomerInvoice { .. } => (
                resolver.system(SystemAccount::AccountsReceivable)?,
                resolver.system(SystemAccount::SalesRevenue)?,
            ),
        };

        let entry = JournalEntry::balanced(
            entry_id,
            event.date,
            event.source()?,
            [
                (debit, Side::Debit, event.amount),
                (credit, Side::Credit, event.amount),
            ],
        )?
        .with_description(Some(event.describe()))
        .with_counterparty(event.detail.counterparty().map(|p| p.trim().to_string()));

        Ok(PostingPlan {
            accounts_to_open: resolver.pending,
            entry,
        })
    }
}

struct Resolver<'a> {
    chart: &'a ChartOfAccounts,
    policy: &'a PostingPolicy,
    pending: Vec<Account>,
}

impl Resolver<'_> {
    fn system(&self, account: SystemAccount) -> Result<Account, LedgerError> {
        self.chart.system(account).cloned()
    }

    fn money(&mut self, payment: &PaymentMethod) -> Result<Account, LedgerError> {
        match payment {
            PaymentMethod::Cash => self.system(SystemAccount::Cash),
            PaymentMethod::Bank { account } => {
                let code = self.policy.bank_code(account)?;
                let chart = self.chart;
                match chart.get(&code) {
                    Some(existing) if existing.role.is_money() => Ok(existing.clone()),
                    Some(existing) => Err(LedgerError::resolution(format!(
                        "account {} for bank '{}' is not a bank account",
                        existing.code, account
                    ))),
                    None => Ok(self.open(
                        Account::new(code, account.trim(), AccountKind::Asset)
                            .with_role(AccountRole::Bank),
                    )),
                }
            }
        }
    }

    fn expense(&mut self, category: &str) -> Result<Account, LedgerError> {
        let policy = self.policy;
        let chart = self.chart;
        let mapped = policy.account_for_category(category);
        match chart.get(&mapped.code) {
            Some(existing) if existing.kind == AccountKind::Expense => Ok(existing.clone()),
            Some(existing) => Err(LedgerError::resolution(format!(
                "account {} mapped for category '{}' is a {} account",
                existing.code,
                category,
                existing.kind.as_str()
            ))),
            None => Ok(self.open(mapped.to_account())),
        }
    }

    fn open(&mut self, account: Account) -> Account {
        if !self.pending.iter().any(|a| a.code == account.code) {
            self.pending.push(account.clone());
        }
        account
    }
}

//! Financial reports derived from balances and posted entries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountCode, AccountKind};
use crate::error::LedgerError;
use crate::journal::JournalEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account: Account,
    pub debit: i128,
    pub credit: i128,
}

/// Every account with a non-zero balance, in its debit or credit column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: i128,
    pub total_credits: i128,
}

impl TrialBalance {
    /// Build from `(account, debit-positive balance)` pairs.
    pub fn from_balances(balances: impl IntoIterator<Item = (Account, i128)>) -> Self {
        let mut rows: Vec<TrialBalanceRow> = balances
            .into_iter()
            .filter(|(_, balance)| *balance != 0)
            .map(|(account, balance)| TrialBalanceRow {
                account,
                debit: balance.max(0),
                credit: (-balance).max(0),
            })
            .collect();
        rows.sort_by(|a, b| a.account.code.cmp(&b.account.code));

        let total_debits = rows.iter().map(|r| r.debit).sum();
        let total_credits = rows.iter().map(|r| r.credit).sum();
        Self {
            rows,
            total_debits,
            total_credits,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits == self.total_credits
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitAndLossLine {
    pub account: Account,
    /// Natural-sign amount (revenue credit-positive, expense debit-positive).
    pub amount: i128,
}

/// Revenue and expense activity for entries dated within `[from, to]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub revenue: Vec<ProfitAndLossLine>,
    pub expenses: Vec<ProfitAndLossLine>,
    pub total_revenue: i128,
    pub total_expenses: i128,
    pub net_profit: i128,
}

impl ProfitAndLoss {
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a JournalEntry>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Self, LedgerError> {
        if from > to {
            return Err(LedgerError::validation(format!(
                "report period start {from} is after its end {to}"
            )));
        }

        let mut net: BTreeMap<AccountCode, (Account, i128)> = BTreeMap::new();
        for entry in entries
            .into_iter()
            .filter(|e| e.entry_date >= from && e.entry_date <= to)
        {
            for line in &entry.lines {
                if !matches!(line.account.kind, AccountKind::Revenue | AccountKind::Expense) {
                    continue;
                }
                let slot = net
                    .entry(line.account.code.clone())
                    .or_insert_with(|| (line.account.clone(), 0));
                slot.1 += line.signed_amount();
            }
        }

        let mut revenue = Vec::new();
        let mut expenses = Vec::new();
        for (_, (account, debit_positive)) in net {
            if debit_positive == 0 {
                continue;
            }
            let amount = account.natural_balance(debit_positive);
            let line = ProfitAndLossLine { account, amount };
            match line.account.kind {
                AccountKind::Revenue => revenue.push(line),
                _ => expenses.push(line),
            }
        }

        let total_revenue: i128 = revenue.iter().map(|l| l.amount).sum();
        let total_expenses: i128 = expenses.iter().map(|l| l.amount).sum();
        Ok(Self {
            from,
            to,
            revenue,
            expenses,
            total_revenue,
            total_expenses,
            net_profit: total_revenue - total_expenses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Side;
    use crate::chart::SystemAccount;
    use crate::journal::{SourceDocument, SourceKind};
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn entry(id: &str, date: NaiveDate, debit: Account, credit: Account, amount: i64) -> JournalEntry {
        JournalEntry::balanced(
            Uuid::now_v7(),
            date,
            SourceDocument::new(SourceKind::Manual, id).unwrap(),
            [(debit, Side::Debit, amount), (credit, Side::Credit, amount)],
        )
        .unwrap()
    }

    fn rent() -> Account {
        Account::new(AccountCode::new("6100").unwrap(), "Rent", AccountKind::Expense)
    }

    #[test]
    fn trial_balance_splits_columns_and_skips_zero_rows() {
        let tb = TrialBalance::from_balances([
            (SystemAccount::Cash.account(), 700),
            (SystemAccount::SalesRevenue.account(), -1_000),
            (rent(), 300),
            (SystemAccount::AccountsPayable.account(), 0),
        ]);

        assert_eq!(tb.rows.len(), 3);
        assert_eq!(tb.rows[0].account.code.as_str(), "1000");
        assert_eq!(tb.total_debits, 1_000);
        assert_eq!(tb.total_credits, 1_000);
        assert!(tb.is_balanced());
    }

    #[test]
    fn profit_and_loss_covers_only_the_period() {
        let entries = [
            entry("s1", day(5), SystemAccount::Cash.account(), SystemAccount::SalesRevenue.account(), 5_000),
            entry("r1", day(6), rent(), SystemAccount::Cash.account(), 1_200),
            entry("s2", day(20), SystemAccount::Cash.account(), SystemAccount::SalesRevenue.account(), 9_999),
            entry("rf", day(7), SystemAccount::SalesReturns.account(), SystemAccount::Cash.account(), 500),
        ];

        let pl = ProfitAndLoss::from_entries(&entries, day(1), day(10)).unwrap();

        // Refunds reduce revenue through the contra revenue account.
        assert_eq!(pl.total_revenue, 4_500);
        assert_eq!(pl.total_expenses, 1_200);
        assert_eq!(pl.net_profit, 3_300);
        assert_eq!(pl.expenses.len(), 1);
    }

    #[test]
    fn inverted_period_is_rejected() {
        let err = ProfitAndLoss::from_entries(std::iter::empty(), day(10), day(1)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}

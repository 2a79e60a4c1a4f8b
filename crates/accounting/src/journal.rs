use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::{Account, AccountCode, Side};
use crate::error::LedgerError;

/// Kind of business document a journal entry was posted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Expense,
    CustomerPayment,
    CustomerRefund,
    VendorBill,
    VendorBillPayment,
    PurchaseReturn,
    CustomerInvoice,
    OpeningBalance,
    Manual,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Expense => "expense",
            SourceKind::CustomerPayment => "customer_payment",
            SourceKind::CustomerRefund => "customer_refund",
            SourceKind::VendorBill => "vendor_bill",
            SourceKind::VendorBillPayment => "vendor_bill_payment",
            SourceKind::PurchaseReturn => "purchase_return",
            SourceKind::CustomerInvoice => "customer_invoice",
            SourceKind::OpeningBalance => "opening_balance",
            SourceKind::Manual => "manual",
        }
    }
}

impl core::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_lowercase().replace('-', "_").as_str() {
            "expense" => SourceKind::Expense,
            "customer_payment" => SourceKind::CustomerPayment,
            "customer_refund" => SourceKind::CustomerRefund,
            "vendor_bill" => SourceKind::VendorBill,
            "vendor_bill_payment" => SourceKind::VendorBillPayment,
            "purchase_return" => SourceKind::PurchaseReturn,
            "customer_invoice" => SourceKind::CustomerInvoice,
            "opening_balance" => SourceKind::OpeningBalance,
            "manual" => SourceKind::Manual,
            other => {
                return Err(LedgerError::validation(format!("unknown source kind '{other}'")));
            }
        };
        Ok(kind)
    }
}

/// Foreign key from a journal entry to the document that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceDocument {
    pub kind: SourceKind,
    pub id: String,
}

impl SourceDocument {
    pub fn new(kind: SourceKind, id: impl Into<String>) -> Result<Self, LedgerError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(LedgerError::validation("source document id must not be empty"));
        }
        Ok(Self { kind, id })
    }
}

impl core::fmt::Display for SourceDocument {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// One leg of a journal entry: a debit XOR a credit on one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// 1-based position within the entry.
    pub line_no: u32,
    pub account: Account,
    pub side: Side,
    /// Positive amount in smallest currency unit (e.g. cents).
    pub amount: i64,
}

impl JournalLine {
    pub fn debit(&self) -> i64 {
        match self.side {
            Side::Debit => self.amount,
            Side::Credit => 0,
        }
    }

    pub fn credit(&self) -> i64 {
        match self.side {
            Side::Debit => 0,
            Side::Credit => self.amount,
        }
    }

    /// Debit-positive effect on the account balance.
    pub fn signed_amount(&self) -> i128 {
        self.side.signed(self.amount)
    }
}

/// A posted (immutable) double-entry journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub entry_id: Uuid,
    pub entry_date: NaiveDate,
    pub source: SourceDocument,
    pub description: Option<String>,
    /// Customer or vendor the entry concerns, when any.
    pub counterparty: Option<String>,
    /// Set on reversing entries: the entry being compensated.
    pub reverses: Option<Uuid>,
    pub lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// Build an entry from `(account, side, amount)` legs, numbering lines in
    /// order, and validate it.
    pub fn balanced(
        entry_id: Uuid,
        entry_date: NaiveDate,
        source: SourceDocument,
        legs: impl IntoIterator<Item = (Account, Side, i64)>,
    ) -> Result<Self, LedgerError> {
        let lines = legs
            .into_iter()
            .enumerate()
            .map(|(idx, (account, side, amount))| JournalLine {
                line_no: idx as u32 + 1,
                account,
                side,
                amount,
            })
            .collect();

        let entry = Self {
            entry_id,
            entry_date,
            source,
            description: None,
            counterparty: None,
            reverses: None,
            lines,
        };
        entry.validate()?;
        Ok(entry)
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_counterparty(mut self, counterparty: Option<String>) -> Self {
        self.counterparty = counterparty;
        self
    }

    pub fn total_debits(&self) -> i128 {
        self.lines.iter().map(|l| l.debit() as i128).sum()
    }

    pub fn total_credits(&self) -> i128 {
        self.lines.iter().map(|l| l.credit() as i128).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    /// Debit-positive net effect of this entry on one account.
    pub fn net_for(&self, code: &AccountCode) -> i128 {
        self.lines
            .iter()
            .filter(|l| &l.account.code == code)
            .map(JournalLine::signed_amount)
            .sum()
    }

    /// Check the posting invariants: at least two lines, positive amounts,
    /// sequential line numbers and Σ debit = Σ credit.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.lines.len() < 2 {
            return Err(LedgerError::validation(
                "journal entry must have at least two lines",
            ));
        }

        for (idx, line) in self.lines.iter().enumerate() {
            if line.amount <= 0 {
                return Err(LedgerError::validation(format!(
                    "line {} amount must be positive",
                    line.line_no
                )));
            }
            if line.line_no as usize != idx + 1 {
                return Err(LedgerError::validation(format!(
                    "line numbers must be sequential (expected {}, found {})",
                    idx + 1,
                    line.line_no
                )));
            }
        }

        let debits = self.total_debits();
        let credits = self.total_credits();
        if debits != credits {
            return Err(LedgerError::Unbalanced { debits, credits });
        }
        Ok(())
    }

    /// The compensating entry: every line mirrored to the opposite side.
    pub fn reversal(&self, entry_id: Uuid, entry_date: NaiveDate, reason: Option<String>) -> Self {
        let lines = self
            .lines
            .iter()
            .map(|l| JournalLine {
                line_no: l.line_no,
                account: l.account.clone(),
                side: l.side.opposite(),
                amount: l.amount,
            })
            .collect();

        Self {
            entry_id,
            entry_date,
            source: self.source.clone(),
            description: reason.or_else(|| {
                Some(format!("Reversal of {}", self.source))
            }),
            counterparty: self.counterparty.clone(),
            reverses: Some(self.entry_id),
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKind;

    fn account(code: &str, kind: AccountKind) -> Account {
        Account::new(AccountCode::new(code).unwrap(), code, kind)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    fn source() -> SourceDocument {
        SourceDocument::new(SourceKind::Manual, "m-1").unwrap()
    }

    #[test]
    fn balanced_entry_numbers_lines_in_order() {
        let entry = JournalEntry::balanced(
            Uuid::now_v7(),
            date(),
            source(),
            vec![
                (account("6100", AccountKind::Expense), Side::Debit, 700),
                (account("6200", AccountKind::Expense), Side::Debit, 300),
                (account("1000", AccountKind::Asset), Side::Credit, 1000),
            ],
        )
        .unwrap();

        let numbers: Vec<u32> = entry.lines.iter().map(|l| l.line_no).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(entry.total_debits(), 1000);
        assert_eq!(entry.total_credits(), 1000);
    }

    #[test]
    fn unbalanced_entry_is_rejected() {
        let err = JournalEntry::balanced(
            Uuid::now_v7(),
            date(),
            source(),
            vec![
                (account("1000", AccountKind::Asset), Side::Debit, 100),
                (account("2000", AccountKind::Liability), Side::Credit, 90),
            ],
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::Unbalanced { debits: 100, credits: 90 });
    }

    #[test]
    fn single_line_and_non_positive_amounts_are_rejected() {
        let one_line = JournalEntry::balanced(
            Uuid::now_v7(),
            date(),
            source(),
            vec![(account("1000", AccountKind::Asset), Side::Debit, 100)],
        );
        assert!(matches!(one_line, Err(LedgerError::Validation(_))));

        let zero = JournalEntry::balanced(
            Uuid::now_v7(),
            date(),
            source(),
            vec![
                (account("1000", AccountKind::Asset), Side::Debit, 0),
                (account("2000", AccountKind::Liability), Side::Credit, 0),
            ],
        );
        assert!(matches!(zero, Err(LedgerError::Validation(_))));
    }

    #[test]
    fn reversal_mirrors_every_line_and_links_back() {
        let original = JournalEntry::balanced(
            Uuid::now_v7(),
            date(),
            source(),
            vec![
                (account("6100", AccountKind::Expense), Side::Debit, 450),
                (account("1000", AccountKind::Asset), Side::Credit, 450),
            ],
        )
        .unwrap();

        let reversal = original.reversal(Uuid::now_v7(), date(), None);
        assert_eq!(reversal.reverses, Some(original.entry_id));
        assert!(reversal.is_balanced());
        for (a, b) in original.lines.iter().zip(&reversal.lines) {
            assert_eq!(a.signed_amount(), -b.signed_amount());
        }
        let cash = AccountCode::new("1000").unwrap();
        assert_eq!(original.net_for(&cash) + reversal.net_for(&cash), 0);
    }

    #[test]
    fn source_kind_parses_kebab_and_snake_case() {
        assert_eq!(
            "vendor-bill-payment".parse::<SourceKind>().unwrap(),
            SourceKind::VendorBillPayment
        );
        assert_eq!("expense".parse::<SourceKind>().unwrap(), SourceKind::Expense);
        assert!("payroll".parse::<SourceKind>().is_err());
    }
}

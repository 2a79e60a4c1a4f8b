//! Business-level transactions that the poster turns into journal entries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::journal::{SourceDocument, SourceKind};

/// Where money moved from or to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// Any non-cash channel (transfer, cheque, card, UPI) settled through a
    /// named bank account.
    Bank { account: String },
}

/// What kind of financial event this is, with its kind-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDetail {
    Expense {
        category: String,
        payment: PaymentMethod,
    },
    CustomerPayment {
        customer: String,
        payment: PaymentMethod,
    },
    CustomerRefund {
        customer: String,
        payment: PaymentMethod,
    },
    VendorBill {
        vendor: String,
        category: String,
    },
    VendorBillPayment {
        vendor: String,
        payment: PaymentMethod,
    },
    PurchaseReturn {
        vendor: String,
    },
    CustomerInvoice {
        customer: String,
    },
}

impl EventDetail {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            EventDetail::Expense { .. } => SourceKind::Expense,
            EventDetail::CustomerPayment { .. } => SourceKind::CustomerPayment,
            EventDetail::CustomerRefund { .. } => SourceKind::CustomerRefund,
            EventDetail::VendorBill { .. } => SourceKind::VendorBill,
            EventDetail::VendorBillPayment { .. } => SourceKind::VendorBillPayment,
            EventDetail::PurchaseReturn { .. } => SourceKind::PurchaseReturn,
            EventDetail::CustomerInvoice { .. } => SourceKind::CustomerInvoice,
        }
    }

    /// Customer or vendor the event concerns.
    pub fn counterparty(&self) -> Option<&str> {
        match self {
            EventDetail::Expense { .. } => None,
            EventDetail::CustomerPayment { customer, .. }
            | EventDetail::CustomerRefund { customer, .. }
            | EventDetail::CustomerInvoice { customer } => Some(customer),
            EventDetail::VendorBill { vendor, .. }
            | EventDetail::VendorBillPayment { vendor, .. }
            | EventDetail::PurchaseReturn { vendor } => Some(vendor),
        }
    }

    pub fn payment(&self) -> Option<&PaymentMethod> {
        match self {
            EventDetail::Expense { payment, .. }
            | EventDetail::CustomerPayment { payment, .. }
            | EventDetail::CustomerRefund { payment, .. }
            | EventDetail::VendorBillPayment { payment, .. } => Some(payment),
            _ => None,
        }
    }
}

/// An expense, payment, refund, bill or return to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialEvent {
    /// Business document id, unique per kind (e.g. the expense id).
    pub id: String,
    pub date: NaiveDate,
    /// Positive amount in smallest currency unit.
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form external reference (cheque number, UTR, bill number).
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(flatten)]
    pub detail: EventDetail,
}

impl FinancialEvent {
    pub fn source(&self) -> Result<SourceDocument, LedgerError> {
        SourceDocument::new(self.detail.source_kind(), self.id.clone())
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        self.source()?;

        if self.amount <= 0 {
            return Err(LedgerError::validation("amount must be positive"));
        }

        if let Some(party) = self.detail.counterparty() {
            if party.trim().is_empty() {
                return Err(LedgerError::validation("counterparty must not be empty"));
            }
        }

        match &self.detail {
            EventDetail::Expense { category, .. } | EventDetail::VendorBill { category, .. }
                if category.trim().is_empty() =>
            {
                return Err(LedgerError::validation("category must not be empty"));
            }
            _ => {}
        }

        if let Some(PaymentMethod::Bank { account }) = self.detail.payment() {
            if account.trim().is_empty() {
                return Err(LedgerError::validation("bank account must not be empty"));
            }
        }

        Ok(())
    }

    /// Entry description: the caller's, or one derived from the event.
    pub fn describe(&self) -> String {
        if let Some(d) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            return d.to_string();
        }
        let mut text = match &self.detail {
            EventDetail::Expense { category, .. } => format!("Expense: {category}"),
            EventDetail::CustomerPayment { customer, .. } => format!("Payment from {customer}"),
            EventDetail::CustomerRefund { customer, .. } => format!("Refund to {customer}"),
            EventDetail::VendorBill { vendor, .. } => format!("Bill from {vendor}"),
            EventDetail::VendorBillPayment { vendor, .. } => format!("Payment to {vendor}"),
            EventDetail::PurchaseReturn { vendor } => format!("Return to {vendor}"),
            EventDetail::CustomerInvoice { customer } => format!("Invoice to {customer}"),
        };
        if let Some(r) = &self.reference {
            text.push_str(&format!(" (ref {r})"));
        }
        text
    }
}

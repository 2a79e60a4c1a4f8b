use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use ledgerforge_accounting::{
    Account, AccountCode, AccountKind, AccountRole, JournalEntry, Side, SourceDocument, SourceKind,
};
use ledgerforge_infra::ledger_service::ManualEntry;
use ledgerforge_infra::projections::AccountBalance;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct OpenLedgerRequest {
    /// Custom chart; the standard chart when omitted.
    #[serde(default)]
    pub accounts: Option<Vec<Account>>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub role: AccountRole,
    #[serde(default)]
    pub opening_balance: i64,
    pub opened_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct JournalLineRequest {
    pub account: String,
    pub side: Side,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct PostJournalEntryRequest {
    pub reference: String,
    pub entry_date: NaiveDate,
    pub description: Option<String>,
    pub lines: Vec<JournalLineRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverseQuery {
    pub date: Option<NaiveDate>,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct AccountBalanceResponse {
    pub code: AccountCode,
    pub name: String,
    pub kind: AccountKind,
    pub role: AccountRole,
    /// Debit-positive.
    pub balance: i128,
    /// In the account's normal sign.
    pub natural_balance: i128,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct OpenAccountResponse {
    pub account: Account,
    pub opening_entry: Option<JournalEntry>,
}

pub fn account_balance_to_response(b: AccountBalance) -> AccountBalanceResponse {
    let natural_balance = b.natural_balance();
    AccountBalanceResponse {
        code: b.account.code,
        name: b.account.name,
        kind: b.account.kind,
        role: b.account.role,
        balance: b.balance,
        natural_balance,
    }
}

// -------------------------
// Mapping helpers
// -------------------------

pub fn parse_account_code(s: &str) -> Result<AccountCode, axum::response::Response> {
    AccountCode::new(s).map_err(errors::ledger_error_to_response)
}

pub fn parse_source(kind: &str, id: &str) -> Result<SourceDocument, axum::response::Response> {
    let kind: SourceKind = kind.parse().map_err(errors::ledger_error_to_response)?;
    SourceDocument::new(kind, id).map_err(errors::ledger_error_to_response)
}

pub fn to_account(body: &OpenAccountRequest) -> Result<Account, axum::response::Response> {
    let code = parse_account_code(&body.code)?;
    Ok(Account::new(code, body.name.clone(), body.kind).with_role(body.role))
}

pub fn to_manual_entry(body: PostJournalEntryRequest) -> Result<ManualEntry, axum::response::Response> {
    if body.lines.is_empty() {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "journal entry must have lines",
        ));
    }

    let lines = body
        .lines
        .into_iter()
        .map(|l| Ok((parse_account_code(&l.account)?, l.side, l.amount)))
        .collect::<Result<Vec<_>, axum::response::Response>>()?;

    Ok(ManualEntry {
        reference: body.reference,
        entry_date: body.entry_date,
        description: body.description,
        lines,
    })
}

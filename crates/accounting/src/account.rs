use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountKind {
    /// The side that increases an account of this kind.
    pub fn normal_side(self) -> Side {
        match self {
            AccountKind::Asset | AccountKind::Expense => Side::Debit,
            AccountKind::Liability | AccountKind::Equity | AccountKind::Revenue => Side::Credit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Asset => "asset",
            AccountKind::Liability => "liability",
            AccountKind::Equity => "equity",
            AccountKind::Revenue => "revenue",
            AccountKind::Expense => "expense",
        }
    }
}

impl FromStr for AccountKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" => Ok(AccountKind::Asset),
            "liability" => Ok(AccountKind::Liability),
            "equity" => Ok(AccountKind::Equity),
            "revenue" => Ok(AccountKind::Revenue),
            "expense" => Ok(AccountKind::Expense),
            other => Err(LedgerError::validation(format!(
                "unknown account kind '{other}' (expected asset, liability, equity, revenue or expense)"
            ))),
        }
    }
}

/// Debit or credit side of a journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }

    /// Debit-positive signed amount.
    pub fn signed(self, amount: i64) -> i128 {
        match self {
            Side::Debit => amount as i128,
            Side::Credit => -(amount as i128),
        }
    }
}

/// What an account is used for beyond its kind.
///
/// Money accounts (cash, bank) get a register; control accounts (receivable,
/// payable) get a per-party sub-ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    #[default]
    General,
    Cash,
    Bank,
    Receivable,
    Payable,
}

impl AccountRole {
    pub fn is_money(self) -> bool {
        matches!(self, AccountRole::Cash | AccountRole::Bank)
    }

    pub fn is_control(self) -> bool {
        matches!(self, AccountRole::Receivable | AccountRole::Payable)
    }

    /// Whether an account of `kind` may carry this role.
    pub fn admits(self, kind: AccountKind) -> bool {
        match self {
            AccountRole::General => true,
            AccountRole::Cash | AccountRole::Bank | AccountRole::Receivable => {
                kind == AccountKind::Asset
            }
            AccountRole::Payable => kind == AccountKind::Liability,
        }
    }
}

/// Account code, e.g. `"1000"` or `"1100-HDFC"`.
///
/// Codes are trimmed, non-empty and limited to ASCII alphanumerics plus
/// `-`, `.` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountCode(pub(crate) String);

impl AccountCode {
    pub fn new(code: impl Into<String>) -> Result<Self, LedgerError> {
        let code = code.into();
        let code = code.trim();
        if code.is_empty() {
            return Err(LedgerError::validation("account code must not be empty"));
        }
        if let Some(bad) = code
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')))
        {
            return Err(LedgerError::validation(format!(
                "account code '{code}' contains invalid character '{bad}'"
            )));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for AccountCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountCode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountCode {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountCode> for String {
    fn from(value: AccountCode) -> Self {
        value.0
    }
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: AccountCode,
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub role: AccountRole,
}

impl Account {
    pub fn new(code: AccountCode, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            code,
            name: name.into(),
            kind,
            role: AccountRole::General,
        }
    }

    pub fn with_role(mut self, role: AccountRole) -> Self {
        self.role = role;
        self
    }

    /// Checks the metadata a ledger needs before the account can be opened.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::validation(format!(
                "account {} must have a name",
                self.code
            )));
        }
        if !self.role.admits(self.kind) {
            return Err(LedgerError::validation(format!(
                "account {} cannot be a {:?} account of kind {}",
                self.code,
                self.role,
                self.kind.as_str()
            )));
        }
        Ok(())
    }

    /// Balance in the account's natural sign, given a debit-positive balance.
    pub fn natural_balance(&self, debit_positive: i128) -> i128 {
        match self.kind.normal_side() {
            Side::Debit => debit_positive,
            Side::Credit => -debit_positive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_sides_follow_the_accounting_equation() {
        assert_eq!(AccountKind::Asset.normal_side(), Side::Debit);
        assert_eq!(AccountKind::Expense.normal_side(), Side::Debit);
        assert_eq!(AccountKind::Liability.normal_side(), Side::Credit);
        assert_eq!(AccountKind::Equity.normal_side(), Side::Credit);
        assert_eq!(AccountKind::Revenue.normal_side(), Side::Credit);
    }

    #[test]
    fn account_codes_are_trimmed_and_checked() {
        assert_eq!(AccountCode::new(" 1100-HDFC ").unwrap().as_str(), "1100-HDFC");
        assert!(AccountCode::new("   ").is_err());
        assert!(AccountCode::new("11 00").is_err());
    }

    #[test]
    fn account_code_deserialization_validates() {
        let ok: AccountCode = serde_json::from_str("\"6100\"").unwrap();
        assert_eq!(ok.as_str(), "6100");
        assert!(serde_json::from_str::<AccountCode>("\"61/00\"").is_err());
    }

    #[test]
    fn kind_parsing_is_case_insensitive() {
        assert_eq!("Expense".parse::<AccountKind>().unwrap(), AccountKind::Expense);
        assert!("income".parse::<AccountKind>().is_err());
    }

    #[test]
    fn natural_balance_flips_for_credit_normal_accounts() {
        let ap = Account::new(AccountCode::new("2000").unwrap(), "AP", AccountKind::Liability);
        assert_eq!(ap.natural_balance(-250), 250);
        let cash = Account::new(AccountCode::new("1000").unwrap(), "Cash", AccountKind::Asset);
        assert_eq!(cash.natural_balance(-250), -250);
    }

    #[test]
    fn roles_are_restricted_to_matching_kinds() {
        let code = || AccountCode::new("1100-X").unwrap();
        assert!(Account::new(code(), "Bank", AccountKind::Asset)
            .with_role(AccountRole::Bank)
            .validate()
            .is_ok());
        for kind in [AccountKind::Liability, AccountKind::Expense] {
            let err = Account::new(code(), "Bank", kind)
                .with_role(AccountRole::Bank)
                .validate()
                .unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)));
        }
        assert!(!AccountRole::Receivable.admits(AccountKind::Liability));
        assert!(!AccountRole::Payable.admits(AccountKind::Asset));
        assert!(AccountRole::General.admits(AccountKind::Revenue));
        assert!(Account::new(code(), "  ", AccountKind::Asset).validate().is_err());
    }
}

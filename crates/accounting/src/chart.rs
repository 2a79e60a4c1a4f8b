//! Chart of accounts and the posting policy that maps business categories to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountCode, AccountKind, AccountRole};
use crate::error::LedgerError;

/// Fixed accounts every ledger must carry. These are never created on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAccount {
    Cash,
    AccountsReceivable,
    AccountsPayable,
    OpeningBalanceEquity,
    SalesRevenue,
    SalesReturns,
    PurchaseReturns,
}

impl SystemAccount {
    pub const ALL: [SystemAccount; 7] = [
        SystemAccount::Cash,
        SystemAccount::AccountsReceivable,
        SystemAccount::AccountsPayable,
        SystemAccount::OpeningBalanceEquity,
        SystemAccount::SalesRevenue,
        SystemAccount::SalesReturns,
        SystemAccount::PurchaseReturns,
    ];

    pub fn code_str(self) -> &'static str {
        match self {
            SystemAccount::Cash => "1000",
            SystemAccount::AccountsReceivable => "1200",
            SystemAccount::AccountsPayable => "2000",
            SystemAccount::OpeningBalanceEquity => "3000",
            SystemAccount::SalesRevenue => "4000",
            SystemAccount::SalesReturns => "4100",
            SystemAccount::PurchaseReturns => "5900",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SystemAccount::Cash => "Cash",
            SystemAccount::AccountsReceivable => "Accounts Receivable",
            SystemAccount::AccountsPayable => "Accounts Payable",
            SystemAccount::OpeningBalanceEquity => "Opening Balance Equity",
            SystemAccount::SalesRevenue => "Sales Revenue",
            SystemAccount::SalesReturns => "Sales Returns & Refunds",
            SystemAccount::PurchaseReturns => "Purchase Returns",
        }
    }

    pub fn kind(self) -> AccountKind {
        match self {
            SystemAccount::Cash | SystemAccount::AccountsReceivable => AccountKind::Asset,
            SystemAccount::AccountsPayable => AccountKind::Liability,
            SystemAccount::OpeningBalanceEquity => AccountKind::Equity,
            // Contra accounts: debit-side activity reduces revenue, credits reduce expense.
            SystemAccount::SalesRevenue | SystemAccount::SalesReturns => AccountKind::Revenue,
            SystemAccount::PurchaseReturns => AccountKind::Expense,
        }
    }

    pub fn role(self) -> AccountRole {
        match self {
            SystemAccount::Cash => AccountRole::Cash,
            SystemAccount::AccountsReceivable => AccountRole::Receivable,
            SystemAccount::AccountsPayable => AccountRole::Payable,
            _ => AccountRole::General,
        }
    }

    pub fn code(self) -> AccountCode {
        AccountCode(self.code_str().to_string())
    }

    pub fn account(self) -> Account {
        Account::new(self.code(), self.name(), self.kind()).with_role(self.role())
    }
}

/// Expense account a category posts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAccount {
    pub code: AccountCode,
    pub name: String,
}

impl CategoryAccount {
    pub fn new(code: &str, name: impl Into<String>) -> Result<Self, LedgerError> {
        Ok(Self {
            code: AccountCode::new(code)?,
            name: name.into(),
        })
    }

    pub fn to_account(&self) -> Account {
        Account::new(self.code.clone(), self.name.clone(), AccountKind::Expense)
    }
}

/// How business categories and bank names resolve to accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingPolicy {
    /// Category name → expense account. Keys are matched case- and
    /// separator-insensitively ("Office_Supplies" == "office supplies").
    pub category_accounts: BTreeMap<String, CategoryAccount>,
    /// Fallback for unmapped categories.
    pub miscellaneous: CategoryAccount,
    /// Bank accounts created on demand get code `<bank_prefix>-<SLUG>`.
    pub bank_prefix: String,
}

impl Default for PostingPolicy {
    fn default() -> Self {
        let defaults = [
            ("rent", "6100", "Rent"),
            ("utilities", "6200", "Utilities"),
            ("salaries", "6300", "Salaries & Wages"),
            ("office supplies", "6400", "Office Supplies"),
            ("travel", "6500", "Travel"),
            ("marketing", "6600", "Marketing"),
            ("purchases", "5000", "Purchases"),
        ];
        let category_accounts = defaults
            .into_iter()
            .map(|(cat, code, name)| {
                (
                    cat.to_string(),
                    CategoryAccount {
                        code: AccountCode(code.to_string()),
                        name: name.to_string(),
                    },
                )
            })
            .collect();

        Self {
            category_accounts,
            miscellaneous: CategoryAccount {
                code: AccountCode("6900".to_string()),
                name: "Miscellaneous Expense".to_string(),
            },
            bank_prefix: "1100".to_string(),
        }
    }
}

impl PostingPolicy {
    pub fn with_category(
        mut self,
        category: &str,
        account: CategoryAccount,
    ) -> Self {
        self.category_accounts.insert(normalize_category(category), account);
        self
    }

    /// Expense account for a category, falling back to Miscellaneous.
    pub fn account_for_category(&self, category: &str) -> &CategoryAccount {
        let wanted = normalize_category(category);
        self.category_accounts
            .iter()
            .find(|(k, _)| normalize_category(k) == wanted)
            .map(|(_, v)| v)
            .unwrap_or(&self.miscellaneous)
    }

    /// Code for a bank account created on demand.
    pub fn bank_code(&self, bank: &str) -> Result<AccountCode, LedgerError> {
        let mut slug = String::new();
        for c in bank.trim().chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_uppercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');
        if slug.is_empty() {
            return Err(LedgerError::validation(format!(
                "bank account name '{bank}' has no usable characters"
            )));
        }
        AccountCode::new(format!("{}-{}", self.bank_prefix, slug))
    }
}

fn normalize_category(category: &str) -> String {
    category
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The set of accounts balances are tracked against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    accounts: BTreeMap<AccountCode, Account>,
}

impl ChartOfAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// System accounts plus Purchases and Miscellaneous Expense.
    pub fn standard() -> Self {
        let policy = PostingPolicy::default();
        let mut chart = Self::new();
        for sys in SystemAccount::ALL {
            chart.accounts.insert(sys.code(), sys.account());
        }
        for account in [
            policy.account_for_category("purchases").to_account(),
            policy.miscellaneous.to_account(),
        ] {
            chart.accounts.insert(account.code.clone(), account);
        }
        chart
    }

    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Result<Self, LedgerError> {
        let mut chart = Self::new();
        for account in accounts {
            chart.insert(account)?;
        }
        Ok(chart)
    }

    pub fn insert(&mut self, account: Account) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&account.code) {
            return Err(LedgerError::DuplicateAccount(account.code));
        }
        self.accounts.insert(account.code.clone(), account);
        Ok(())
    }

    pub fn get(&self, code: &AccountCode) -> Option<&Account> {
        self.accounts.get(code)
    }

    pub fn contains(&self, code: &AccountCode) -> bool {
        self.accounts.contains_key(code)
    }

    /// Look up a fixed system account; its absence is a configuration error.
    pub fn system(&self, account: SystemAccount) -> Result<&Account, LedgerError> {
        self.accounts.get(&account.code()).ok_or_else(|| {
            LedgerError::resolution(format!(
                "system account {} ({}) is missing from the chart",
                account.code_str(),
                account.name()
            ))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

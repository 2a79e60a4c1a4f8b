//! Ledger error taxonomy.

use thiserror::Error;
use uuid::Uuid;

use ledgerforge_core::DomainError;

use crate::account::AccountCode;
use crate::journal::SourceDocument;

/// Coarse error class, used by callers to map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is malformed or violates a posting rule.
    Validation,
    /// The thing the request refers to does not exist.
    NotFound,
    /// The request collides with what is already recorded.
    Conflict,
    /// The ledger's configuration or state cannot satisfy the request.
    Inconsistency,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unbalanced journal entry (debits={debits}, credits={credits})")]
    Unbalanced { debits: i128, credits: i128 },

    #[error("unknown account: {0}")]
    UnknownAccount(AccountCode),

    /// A fixed system account is missing, or a mapped account has the wrong kind.
    #[error("account resolution failed: {0}")]
    AccountResolution(String),

    #[error("no active journal entry for {0}")]
    NotFound(SourceDocument),

    #[error("ledger has not been opened")]
    LedgerNotOpened,

    #[error("ledger is already open")]
    AlreadyOpened,

    #[error("{0} already has an active journal entry")]
    DuplicatePosting(SourceDocument),

    #[error("journal entry {0} is already reversed")]
    AlreadyReversed(Uuid),

    #[error("account {0} already exists")]
    DuplicateAccount(AccountCode),

    #[error("tenant mismatch")]
    TenantMismatch,
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::AccountResolution(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::Validation(_)
            | LedgerError::Unbalanced { .. }
            | LedgerError::UnknownAccount(_) => ErrorClass::Validation,
            LedgerError::NotFound(_) | LedgerError::LedgerNotOpened => ErrorClass::NotFound,
            LedgerError::DuplicatePosting(_)
            | LedgerError::AlreadyReversed(_)
            | LedgerError::DuplicateAccount(_)
            | LedgerError::AlreadyOpened => ErrorClass::Conflict,
            LedgerError::AccountResolution(_) | LedgerError::TenantMismatch => {
                ErrorClass::Inconsistency
            }
        }
    }
}

impl From<LedgerError> for DomainError {
    fn from(value: LedgerError) -> Self {
        match value.class() {
            ErrorClass::Validation => DomainError::Validation(value.to_string()),
            ErrorClass::NotFound => DomainError::NotFound,
            ErrorClass::Conflict => DomainError::Conflict(value.to_string()),
            ErrorClass::Inconsistency => DomainError::InvariantViolation(value.to_string()),
        }
    }
}

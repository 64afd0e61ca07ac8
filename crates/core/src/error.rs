//! Ledger error model.
//!
//! Keep this focused on deterministic, business/domain failures (validation,
//! invariants, conflicts). Every variant carries enough structure for the
//! caller to render a precise message; none are meant to be swallowed.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the ledger domain.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Domain-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input at creation/update time (non-mutually-exclusive
    /// debit/credit, missing required fields, unknown voucher type, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Debits and credits differ by more than the balance tolerance.
    #[error("entry is unbalanced: total debit {debit} != total credit {credit}")]
    UnbalancedEntry { debit: Decimal, credit: Decimal },

    /// Fewer than two lines at post time.
    #[error("entry has {count} line(s); a journal entry needs at least 2")]
    InsufficientLines { count: usize },

    /// A referenced account does not exist.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The referenced account is not open for posting (rollup or inactive).
    #[error("posting not allowed on account {0}")]
    PostingNotAllowed(String),

    /// A lifecycle transition was attempted from a state that forbids it.
    #[error("cannot {operation} an entry in status {status}")]
    InvalidState { operation: String, status: String },

    /// A second reversal was attempted for the same posted entry.
    #[error("entry {0} has already been reversed")]
    AlreadyReversed(String),

    /// Voucher-number uniqueness conflict (numbering race; retryable).
    #[error("duplicate voucher number: {0}")]
    DuplicateVoucherNumber(String),

    /// Account-code uniqueness conflict.
    #[error("duplicate account code: {0}")]
    DuplicateAccountCode(String),

    /// Delete/deactivate blocked by existing references.
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The persistence layer failed in a non-domain way.
    #[error("store failure: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn account_not_found(account: impl Into<String>) -> Self {
        Self::AccountNotFound(account.into())
    }

    pub fn posting_not_allowed(account: impl Into<String>) -> Self {
        Self::PostingNotAllowed(account.into())
    }

    pub fn invalid_state(operation: impl Into<String>, status: impl Into<String>) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            status: status.into(),
        }
    }

    pub fn referential(msg: impl Into<String>) -> Self {
        Self::ReferentialIntegrity(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether the error is a transient race the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DuplicateVoucherNumber(_) | Self::Conflict(_))
    }
}

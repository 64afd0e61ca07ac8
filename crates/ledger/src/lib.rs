//! Accounting domain (double-entry ledger).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod journal;
pub mod reporting;
pub mod voucher;

pub use account::{
    Account, AccountCategory, AccountPatch, AccountType, NewAccount, NormalBalance,
    SubledgerEntity, SubledgerRef,
};
pub use journal::{
    balance_epsilon, fiscal_period, fiscal_year, EntryStatus, JournalEntry, JournalLine,
};
pub use reporting::{
    signed_movement, GeneralLedger, GeneralLedgerRow, TrialBalance, TrialBalanceRow,
    TrialBalanceTotals,
};
pub use voucher::{voucher_number, VoucherType};

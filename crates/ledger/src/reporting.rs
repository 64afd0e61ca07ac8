//! Report row types and the shared sign convention.
//!
//! Reports are reconstructions from posted-line history; the math here is
//! pure and shared with nothing else, so the running-balance convention and
//! the trial-balance convention cannot drift apart.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tallybook_core::{AccountId, EntryId};

use crate::account::{AccountType, NormalBalance};

/// Net effect of a (debit, credit) pair expressed in normal-balance terms.
///
/// Debit-normal accounts grow with debits, credit-normal accounts with
/// credits. The trial balance and the general-ledger running balance both go
/// through this single function.
pub fn signed_movement(normal: NormalBalance, debit: Decimal, credit: Decimal) -> Decimal {
    match normal {
        NormalBalance::Debit => debit - credit,
        NormalBalance::Credit => credit - debit,
    }
}

/// One account's row in a trial balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
    pub debit_total: Decimal,
    pub credit_total: Decimal,
    /// `signed_movement(normal_balance, debit_total, credit_total)`.
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceTotals {
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub is_balanced: bool,
}

/// Point-in-time trial balance over every active account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: NaiveDate,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<u32>,
    pub rows: Vec<TrialBalanceRow>,
    pub totals: TrialBalanceTotals,
}

/// One posted movement in an account's general ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralLedgerRow {
    pub entry_id: EntryId,
    pub date: NaiveDate,
    pub voucher_number: String,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub running_balance: Decimal,
}

/// Chronological per-account history with running balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralLedger {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub normal_balance: NormalBalance,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub rows: Vec<GeneralLedgerRow>,
}

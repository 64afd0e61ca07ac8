//! Trial balance and general ledger reconstruction.
//!
//! Both reports re-derive figures from the posted-entry history instead of
//! reading `current_balance`, so they can verify the running balances (and
//! vice versa). Reads are snapshot-consistent and never block posting.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use tallybook_core::{AccountId, LedgerError, LedgerResult};
use tallybook_ledger::{
    balance_epsilon, signed_movement, EntryStatus, GeneralLedger, GeneralLedgerRow, TrialBalance,
    TrialBalanceRow, TrialBalanceTotals,
};

use crate::store::LedgerStore;

pub struct ReportingEngine<S> {
    store: S,
}

impl<S: LedgerStore> ReportingEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Trial balance over every active account as of a date, optionally
    /// narrowed to a fiscal year/period.
    pub fn trial_balance(
        &self,
        as_of: NaiveDate,
        fiscal_year: Option<i32>,
        fiscal_period: Option<u32>,
    ) -> LedgerResult<TrialBalance> {
        if let Some(period) = fiscal_period {
            if !(1..=12).contains(&period) {
                return Err(LedgerError::validation(
                    "fiscal period must be between 1 and 12",
                ));
            }
        }

        let accounts = self.store.accounts()?;
        let entries = self.store.entries()?;

        let mut sums: HashMap<AccountId, (Decimal, Decimal)> = HashMap::new();
        for entry in entries.iter().filter(|e| {
            e.status == EntryStatus::Posted
                && e.date <= as_of
                && fiscal_year.map_or(true, |y| e.fiscal_year == y)
                && fiscal_period.map_or(true, |p| e.fiscal_period == p)
        }) {
            for line in &entry.lines {
                let slot = sums
                    .entry(line.account_id)
                    .or_insert((Decimal::ZERO, Decimal::ZERO));
                slot.0 += line.debit;
                slot.1 += line.credit;
            }
        }

        let mut rows: Vec<TrialBalanceRow> = accounts
            .into_iter()
            .filter(|a| a.is_active)
            .map(|account| {
                let (debit_total, credit_total) = sums
                    .get(&account.id)
                    .copied()
                    .unwrap_or((Decimal::ZERO, Decimal::ZERO));
                TrialBalanceRow {
                    account_id: account.id,
                    code: account.code,
                    name: account.name,
                    account_type: account.account_type,
                    normal_balance: account.normal_balance,
                    debit_total,
                    credit_total,
                    balance: signed_movement(account.normal_balance, debit_total, credit_total),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        let total_debit: Decimal = rows.iter().map(|r| r.debit_total).sum();
        let total_credit: Decimal = rows.iter().map(|r| r.credit_total).sum();
        let totals = TrialBalanceTotals {
            total_debit,
            total_credit,
            is_balanced: (total_debit - total_credit).abs() < balance_epsilon(),
        };

        Ok(TrialBalance {
            as_of,
            fiscal_year,
            fiscal_period,
            rows,
            totals,
        })
    }

    /// Chronological posted history for one account with a running balance.
    ///
    /// With `include_opening`, the running balance starts from the net
    /// movement before `from`; otherwise it starts from zero at the range
    /// start.
    pub fn general_ledger(
        &self,
        account_id: AccountId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        include_opening: bool,
    ) -> LedgerResult<GeneralLedger> {
        let account = self
            .store
            .account(account_id)?
            .ok_or_else(|| LedgerError::account_not_found(account_id.to_string()))?;

        let mut entries: Vec<_> = self
            .store
            .entries_for_account(account_id)?
            .into_iter()
            .filter(|e| e.status == EntryStatus::Posted)
            .collect();
        entries.sort_by(|a, b| (a.date, &a.voucher_number).cmp(&(b.date, &b.voucher_number)));

        let mut opening_balance = Decimal::ZERO;
        let mut rows = Vec::new();
        for entry in &entries {
            let in_range = from.map_or(true, |d| entry.date >= d)
                && to.map_or(true, |d| entry.date <= d);
            let before_range = from.is_some_and(|d| entry.date < d);

            for line in entry.lines.iter().filter(|l| l.account_id == account_id) {
                if before_range {
                    if include_opening {
                        opening_balance +=
                            signed_movement(account.normal_balance, line.debit, line.credit);
                    }
                } else if in_range {
                    rows.push(GeneralLedgerRow {
                        entry_id: entry.id,
                        date: entry.date,
                        voucher_number: entry.voucher_number.clone(),
                        description: entry.description.clone(),
                        debit: line.debit,
                        credit: line.credit,
                        running_balance: Decimal::ZERO, // filled below
                    });
                }
            }
        }

        let mut running = opening_balance;
        for row in &mut rows {
            running += signed_movement(account.normal_balance, row.debit, row.credit);
            row.running_balance = running;
        }

        Ok(GeneralLedger {
            account_id,
            code: account.code,
            name: account.name,
            normal_balance: account.normal_balance,
            from,
            to,
            opening_balance,
            closing_balance: running,
            rows,
        })
    }
}

impl<S> ReportingEngine<S> {
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: Clone> Clone for ReportingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

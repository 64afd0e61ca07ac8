//! End-to-end flows across the registry, the posting engine, and reporting.

use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tallybook_core::{LedgerError, UserId};
use tallybook_infra::{
    AccountRegistry, EntryFilter, InMemoryLedgerStore, JournalService, NewJournalEntry,
    ReportingEngine,
};
use tallybook_ledger::{AccountType, EntryStatus, JournalLine, NewAccount, VoucherType};

type Store = Arc<InMemoryLedgerStore>;

struct Ledger {
    registry: AccountRegistry<Store>,
    journal: JournalService<Store>,
    reporting: ReportingEngine<Store>,
}

fn ledger() -> Ledger {
    let store = Arc::new(InMemoryLedgerStore::new());
    Ledger {
        registry: AccountRegistry::new(store.clone()),
        journal: JournalService::new(store.clone()),
        reporting: ReportingEngine::new(store),
    }
}

fn sale_spec(
    cash: tallybook_core::AccountId,
    sales: tallybook_core::AccountId,
    date: NaiveDate,
    amount: Decimal,
) -> NewJournalEntry {
    NewJournalEntry {
        voucher_type: VoucherType::Journal,
        voucher_number: None,
        date,
        lines: vec![
            JournalLine::debit(cash, amount),
            JournalLine::credit(sales, amount),
        ],
        description: "Cash sale".to_string(),
        reference: None,
        notes: None,
        created_by: None,
    }
}

fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
}

/// Reversal mirrors are dated "now"; reports in these tests look far enough
/// ahead to always include them.
fn far_future() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 12, 31).unwrap()
}

#[test]
fn posting_a_cash_sale_moves_both_balances() {
    let l = ledger();
    let cash = l
        .registry
        .create(NewAccount::new("Cash", AccountType::Asset))
        .unwrap();
    let sales = l
        .registry
        .create(NewAccount::new("Sales", AccountType::Revenue))
        .unwrap();

    let entry = l
        .journal
        .create(sale_spec(cash.id, sales.id, june(1), dec!(500)))
        .unwrap();
    let posted = l.journal.post(entry.id, UserId::new()).unwrap();

    assert_eq!(posted.status, EntryStatus::Posted);
    // A 500 credit on a credit-normal account increases it.
    assert_eq!(l.registry.balance(cash.id).unwrap(), dec!(500));
    assert_eq!(l.registry.balance(sales.id).unwrap(), dec!(500));
}

#[test]
fn reversal_returns_the_ledger_to_its_prior_state() {
    let l = ledger();
    let cash = l
        .registry
        .create(NewAccount::new("Cash", AccountType::Asset))
        .unwrap();
    let sales = l
        .registry
        .create(NewAccount::new("Sales", AccountType::Revenue))
        .unwrap();

    let entry = l
        .journal
        .create(sale_spec(cash.id, sales.id, june(1), dec!(500)))
        .unwrap();
    l.journal.post(entry.id, UserId::new()).unwrap();

    let (original, mirror) = l.journal.reverse(entry.id, UserId::new(), "test").unwrap();

    assert_eq!(l.registry.balance(cash.id).unwrap(), Decimal::ZERO);
    assert_eq!(l.registry.balance(sales.id).unwrap(), Decimal::ZERO);
    assert_eq!(original.status, EntryStatus::Reversed);
    assert_eq!(mirror.status, EntryStatus::Posted);
    assert_eq!(mirror.lines[0].credit, dec!(500));
    assert_eq!(mirror.lines[1].debit, dec!(500));
}

#[test]
fn unbalanced_entry_is_rejected_and_stays_draft() {
    let l = ledger();
    let a = l
        .registry
        .create(NewAccount::new("A", AccountType::Asset))
        .unwrap();
    let b = l
        .registry
        .create(NewAccount::new("B", AccountType::Revenue))
        .unwrap();

    let entry = l
        .journal
        .create(NewJournalEntry {
            lines: vec![
                JournalLine::debit(a.id, dec!(100)),
                JournalLine::credit(b.id, dec!(90)),
            ],
            ..sale_spec(a.id, b.id, june(2), dec!(0))
        })
        .unwrap();

    let err = l.journal.post(entry.id, UserId::new()).unwrap_err();
    assert!(matches!(err, LedgerError::UnbalancedEntry { .. }));
    assert_eq!(l.journal.get(entry.id).unwrap().status, EntryStatus::Draft);
    assert_eq!(l.registry.balance(a.id).unwrap(), Decimal::ZERO);
    assert_eq!(l.registry.balance(b.id).unwrap(), Decimal::ZERO);
}

#[test]
fn single_line_entry_is_rejected_with_insufficient_lines() {
    let l = ledger();
    let a = l
        .registry
        .create(NewAccount::new("A", AccountType::Asset))
        .unwrap();

    let entry = l
        .journal
        .create(NewJournalEntry {
            lines: vec![JournalLine::debit(a.id, dec!(100))],
            ..sale_spec(a.id, a.id, june(3), dec!(0))
        })
        .unwrap();

    assert!(matches!(
        l.journal.post(entry.id, UserId::new()),
        Err(LedgerError::InsufficientLines { count: 1 })
    ));
}

#[test]
fn trial_balance_after_three_postings_satisfies_the_accounting_equation() {
    let l = ledger();
    let a = l
        .registry
        .create(NewAccount::new("A", AccountType::Asset))
        .unwrap();
    let b = l
        .registry
        .create(NewAccount::new("B", AccountType::Revenue))
        .unwrap();

    for (day, amount) in [(1, dec!(100)), (5, dec!(320.55)), (9, dec!(79.45))] {
        let entry = l
            .journal
            .create(sale_spec(a.id, b.id, june(day), amount))
            .unwrap();
        l.journal.post(entry.id, UserId::new()).unwrap();
    }

    let tb = l.reporting.trial_balance(june(30), None, None).unwrap();
    assert!(tb.totals.is_balanced);
    assert_eq!(tb.totals.total_debit, tb.totals.total_credit);

    let a_row = tb.rows.iter().find(|r| r.account_id == a.id).unwrap();
    assert_eq!(a_row.balance, l.registry.balance(a.id).unwrap());
}

#[test]
fn concurrent_creations_get_distinct_voucher_numbers() {
    let l = ledger();
    let cash = l
        .registry
        .create(NewAccount::new("Cash", AccountType::Asset))
        .unwrap();
    let sales = l
        .registry
        .create(NewAccount::new("Sales", AccountType::Revenue))
        .unwrap();

    let store = l.journal.store().clone();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let journal = JournalService::new(store.clone());
            let (cash_id, sales_id) = (cash.id, sales.id);
            thread::spawn(move || loop {
                // The service retries internally; if contention still
                // exhausts its attempts the caller retries, per the
                // numbering contract.
                match journal.create(sale_spec(cash_id, sales_id, june(7), dec!(10))) {
                    Ok(entry) => return entry.voucher_number,
                    Err(LedgerError::DuplicateVoucherNumber(_)) => continue,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            })
        })
        .collect();

    let mut numbers: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), 8, "voucher numbers must be distinct");
}

#[test]
fn concurrent_postings_do_not_lose_updates() {
    let l = ledger();
    let cash = l
        .registry
        .create(NewAccount::new("Cash", AccountType::Asset))
        .unwrap();
    let sales = l
        .registry
        .create(NewAccount::new("Sales", AccountType::Revenue))
        .unwrap();

    let entries: Vec<_> = (0..8)
        .map(|_| {
            l.journal
                .create(sale_spec(cash.id, sales.id, june(11), dec!(25)))
                .unwrap()
        })
        .collect();

    let store = l.journal.store().clone();
    let handles: Vec<_> = entries
        .into_iter()
        .map(|entry| {
            let journal = JournalService::new(store.clone());
            thread::spawn(move || loop {
                match journal.post(entry.id, UserId::new()) {
                    Ok(_) => return,
                    Err(LedgerError::Conflict(_)) => continue,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 8 postings of 25 each; a lost update would leave less.
    assert_eq!(l.registry.balance(cash.id).unwrap(), dec!(200));
    assert_eq!(l.registry.balance(sales.id).unwrap(), dec!(200));
    let posted = l
        .journal
        .list(&EntryFilter {
            status: Some(EntryStatus::Posted),
            ..EntryFilter::default()
        })
        .unwrap();
    assert_eq!(posted.len(), 8);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// Property: after any sequence of posts and reversals, the running
    /// balance maintained incrementally equals the balance reconstructed
    /// from the posted-line history, for every account.
    #[test]
    fn running_balances_reconcile_with_reports(
        movements in prop::collection::vec((1u32..1_000_000u32, 0usize..4, proptest::bool::ANY), 1..12)
    ) {
        let l = ledger();
        let accounts = [
            l.registry.create(NewAccount::new("Cash", AccountType::Asset)).unwrap(),
            l.registry.create(NewAccount::new("Receivables", AccountType::Asset)).unwrap(),
            l.registry.create(NewAccount::new("Sales", AccountType::Revenue)).unwrap(),
            l.registry.create(NewAccount::new("Payables", AccountType::Liability)).unwrap(),
        ];

        for (cents, pair, reverse_it) in movements {
            let amount = Decimal::new(cents as i64, 2);
            let (debit_side, credit_side) = match pair {
                0 => (&accounts[0], &accounts[2]),
                1 => (&accounts[1], &accounts[2]),
                2 => (&accounts[0], &accounts[3]),
                _ => (&accounts[1], &accounts[3]),
            };
            let entry = l.journal
                .create(sale_spec(debit_side.id, credit_side.id, june(15), amount))
                .unwrap();
            l.journal.post(entry.id, UserId::new()).unwrap();
            if reverse_it {
                l.journal.reverse(entry.id, UserId::new(), "property test").unwrap();
            }
        }

        let tb = l.reporting.trial_balance(far_future(), None, None).unwrap();
        prop_assert!(tb.totals.is_balanced);
        for row in &tb.rows {
            let running = l.registry.balance(row.account_id).unwrap();
            prop_assert_eq!(row.balance, running, "trial balance row {} diverged", &row.code);

            let gl = l.reporting
                .general_ledger(row.account_id, None, None, false)
                .unwrap();
            prop_assert_eq!(gl.closing_balance, running, "general ledger {} diverged", &row.code);
        }
    }
}

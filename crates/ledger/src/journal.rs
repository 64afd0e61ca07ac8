//! Journal entry model and lifecycle state machine.
//!
//! Draft → Posted → Reversed (terminal); Draft → Cancelled (terminal).
//! Everything here is pure: the atomic application of balance effects lives
//! in the infrastructure layer.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tallybook_core::{AccountId, EntryId, LedgerError, LedgerResult, UserId};

use crate::voucher::VoucherType;

/// Tolerance for debit/credit equality (0.01 currency units). Exact
/// equality is deliberately not used.
pub fn balance_epsilon() -> Decimal {
    Decimal::new(1, 2)
}

/// Fiscal year of an entry date (calendar-year fiscal calendar).
pub fn fiscal_year(date: NaiveDate) -> i32 {
    date.year()
}

/// Fiscal period of an entry date (month, 1–12).
pub fn fiscal_period(date: NaiveDate) -> u32 {
    date.month()
}

/// Lifecycle status of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
    Cancelled,
}

impl EntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Posted => "posted",
            EntryStatus::Reversed => "reversed",
            EntryStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a journal entry. Exactly one of `debit`/`credit` is strictly
/// positive; the other is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_id: AccountId,
    pub debit: Decimal,
    pub credit: Decimal,
    pub narration: Option<String>,
}

impl JournalLine {
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
            narration: None,
        }
    }

    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
            narration: None,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }

    /// A line carries exactly one side, strictly positive.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.debit < Decimal::ZERO || self.credit < Decimal::ZERO {
            return Err(LedgerError::validation(
                "line amounts must be non-negative",
            ));
        }
        match (self.debit > Decimal::ZERO, self.credit > Decimal::ZERO) {
            (true, true) => Err(LedgerError::validation(
                "line cannot carry both a debit and a credit",
            )),
            (false, false) => Err(LedgerError::validation(
                "line must carry either a debit or a credit",
            )),
            _ => Ok(()),
        }
    }

    pub fn is_debit(&self) -> bool {
        self.debit > Decimal::ZERO
    }

    /// The non-zero side's amount.
    pub fn amount(&self) -> Decimal {
        if self.is_debit() { self.debit } else { self.credit }
    }

    /// The same movement with debit and credit swapped.
    pub fn mirrored(&self) -> JournalLine {
        JournalLine {
            account_id: self.account_id,
            debit: self.credit,
            credit: self.debit,
            narration: self.narration.clone(),
        }
    }
}

/// An atomic, balanced set of ledger lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: EntryId,
    /// Unique, human-readable; assigned at creation, not at posting.
    pub voucher_number: String,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    /// Derived from `date`, never independently settable.
    pub fiscal_year: i32,
    /// Derived from `date` (month 1–12).
    pub fiscal_period: u32,
    pub lines: Vec<JournalLine>,
    /// Derived sums; recomputed whenever lines change.
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub status: EntryStatus,
    pub description: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    /// Set on the original once a mirror entry reverses it.
    pub reversed_by: Option<EntryId>,
    /// Set on the mirror, pointing back at the original.
    pub reversal_of: Option<EntryId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub posted_by: Option<UserId>,
    pub posted_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, owned by the store.
    pub version: u64,
}

impl JournalEntry {
    /// Build a Draft entry. Validates every line and derives totals and
    /// fiscal fields.
    #[allow(clippy::too_many_arguments)]
    pub fn draft(
        id: EntryId,
        voucher_number: String,
        voucher_type: VoucherType,
        date: NaiveDate,
        lines: Vec<JournalLine>,
        description: String,
        reference: Option<String>,
        notes: Option<String>,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        for line in &lines {
            line.validate()?;
        }
        let mut entry = Self {
            id,
            voucher_number,
            voucher_type,
            date,
            fiscal_year: fiscal_year(date),
            fiscal_period: fiscal_period(date),
            lines,
            total_debit: Decimal::ZERO,
            total_credit: Decimal::ZERO,
            status: EntryStatus::Draft,
            description,
            reference,
            notes,
            reversed_by: None,
            reversal_of: None,
            created_by,
            created_at: now,
            updated_at: now,
            posted_by: None,
            posted_at: None,
            version: 0,
        };
        entry.recompute_totals();
        Ok(entry)
    }

    fn recompute_totals(&mut self) {
        self.total_debit = self.lines.iter().map(|l| l.debit).sum();
        self.total_credit = self.lines.iter().map(|l| l.credit).sum();
    }

    /// Replace the lines of a Draft entry; re-validates and re-derives.
    pub fn set_lines(&mut self, lines: Vec<JournalLine>) -> LedgerResult<()> {
        for line in &lines {
            line.validate()?;
        }
        self.lines = lines;
        self.recompute_totals();
        Ok(())
    }

    /// Move a Draft entry to another date; re-derives fiscal fields.
    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
        self.fiscal_year = fiscal_year(date);
        self.fiscal_period = fiscal_period(date);
    }

    pub fn is_balanced(&self) -> bool {
        (self.total_debit - self.total_credit).abs() < balance_epsilon()
    }

    /// All preconditions for Draft → Posted, in reporting order: status,
    /// line count, balance. Account-level checks (existence, postability)
    /// belong to the posting service.
    pub fn ensure_postable(&self) -> LedgerResult<()> {
        if self.status != EntryStatus::Draft {
            return Err(LedgerError::invalid_state("post", self.status.as_str()));
        }
        if self.lines.len() < 2 {
            return Err(LedgerError::InsufficientLines {
                count: self.lines.len(),
            });
        }
        if !self.is_balanced() {
            return Err(LedgerError::UnbalancedEntry {
                debit: self.total_debit,
                credit: self.total_credit,
            });
        }
        Ok(())
    }

    pub fn mark_posted(&mut self, by: UserId, at: DateTime<Utc>) {
        self.status = EntryStatus::Posted;
        self.posted_by = Some(by);
        self.posted_at = Some(at);
        self.updated_at = at;
    }

    /// Build the compensating mirror entry for a Posted entry: every line's
    /// debit and credit swapped, dated `date` (now — not backdated), with a
    /// description referencing the original voucher and the reason.
    ///
    /// The mirror starts in Draft and goes through the ordinary posting
    /// path; the swap preserves balance equality by construction.
    pub fn build_reversal(
        &self,
        id: EntryId,
        voucher_number: String,
        reason: &str,
        date: NaiveDate,
        by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> LedgerResult<JournalEntry> {
        if self.status != EntryStatus::Posted {
            return Err(LedgerError::invalid_state("reverse", self.status.as_str()));
        }
        if self.reversed_by.is_some() {
            return Err(LedgerError::AlreadyReversed(self.voucher_number.clone()));
        }
        let mirrored = self.lines.iter().map(JournalLine::mirrored).collect();
        let mut mirror = JournalEntry::draft(
            id,
            voucher_number,
            self.voucher_type,
            date,
            mirrored,
            format!("Reversal of {}: {}", self.voucher_number, reason),
            Some(self.voucher_number.clone()),
            None,
            by,
            now,
        )?;
        mirror.reversal_of = Some(self.id);
        Ok(mirror)
    }

    /// Link the mirror and close the original's lifecycle.
    pub fn mark_reversed(&mut self, mirror: EntryId, now: DateTime<Utc>) {
        self.status = EntryStatus::Reversed;
        self.reversed_by = Some(mirror);
        self.updated_at = now;
    }

    /// Draft → Cancelled; the reason is appended to the notes. Draft entries
    /// never touched balances, so there is no balance effect to undo.
    pub fn mark_cancelled(&mut self, reason: &str, now: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != EntryStatus::Draft {
            return Err(LedgerError::invalid_state("cancel", self.status.as_str()));
        }
        self.status = EntryStatus::Cancelled;
        self.notes = Some(match self.notes.take() {
            Some(notes) => format!("{notes}\ncancelled: {reason}"),
            None => format!("cancelled: {reason}"),
        });
        self.updated_at = now;
        Ok(())
    }

    /// Whether any line references the given account.
    pub fn references_account(&self, account_id: AccountId) -> bool {
        self.lines.iter().any(|l| l.account_id == account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft_with_lines(lines: Vec<JournalLine>) -> JournalEntry {
        JournalEntry::draft(
            EntryId::new(),
            "JV-001/01-25".to_string(),
            VoucherType::Journal,
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            lines,
            "Test entry".to_string(),
            None,
            None,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn balanced_lines(amount: Decimal) -> Vec<JournalLine> {
        vec![
            JournalLine::debit(AccountId::new(), amount),
            JournalLine::credit(AccountId::new(), amount),
        ]
    }

    #[test]
    fn draft_derives_totals_and_fiscal_fields() {
        let entry = draft_with_lines(balanced_lines(dec!(500)));
        assert_eq!(entry.total_debit, dec!(500));
        assert_eq!(entry.total_credit, dec!(500));
        assert_eq!(entry.fiscal_year, 2025);
        assert_eq!(entry.fiscal_period, 1);
        assert_eq!(entry.status, EntryStatus::Draft);
    }

    #[test]
    fn line_with_both_sides_is_rejected_at_creation() {
        let line = JournalLine {
            account_id: AccountId::new(),
            debit: dec!(100),
            credit: dec!(100),
            narration: None,
        };
        assert!(matches!(
            line.validate(),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn line_with_no_side_is_rejected_at_creation() {
        let line = JournalLine {
            account_id: AccountId::new(),
            debit: Decimal::ZERO,
            credit: Decimal::ZERO,
            narration: None,
        };
        assert!(line.validate().is_err());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let line = JournalLine {
            account_id: AccountId::new(),
            debit: dec!(-5),
            credit: Decimal::ZERO,
            narration: None,
        };
        assert!(line.validate().is_err());
    }

    #[test]
    fn balance_check_uses_epsilon_not_exact_equality() {
        let nearly = draft_with_lines(vec![
            JournalLine::debit(AccountId::new(), dec!(100.005)),
            JournalLine::credit(AccountId::new(), dec!(100.000)),
        ]);
        assert!(nearly.is_balanced());

        let off_by_a_cent = draft_with_lines(vec![
            JournalLine::debit(AccountId::new(), dec!(100.01)),
            JournalLine::credit(AccountId::new(), dec!(100.00)),
        ]);
        assert!(!off_by_a_cent.is_balanced());
    }

    #[test]
    fn single_line_fails_with_insufficient_lines_before_balance() {
        let entry = draft_with_lines(vec![JournalLine::debit(AccountId::new(), dec!(100))]);
        assert!(matches!(
            entry.ensure_postable(),
            Err(LedgerError::InsufficientLines { count: 1 })
        ));
    }

    #[test]
    fn unbalanced_entry_is_not_postable() {
        let entry = draft_with_lines(vec![
            JournalLine::debit(AccountId::new(), dec!(100)),
            JournalLine::credit(AccountId::new(), dec!(90)),
        ]);
        match entry.ensure_postable() {
            Err(LedgerError::UnbalancedEntry { debit, credit }) => {
                assert_eq!(debit, dec!(100));
                assert_eq!(credit, dec!(90));
            }
            other => panic!("expected UnbalancedEntry, got {other:?}"),
        }
    }

    #[test]
    fn posting_a_posted_entry_is_invalid_state() {
        let mut entry = draft_with_lines(balanced_lines(dec!(250)));
        entry.mark_posted(UserId::new(), Utc::now());
        assert!(matches!(
            entry.ensure_postable(),
            Err(LedgerError::InvalidState { .. })
        ));
    }

    #[test]
    fn reversal_mirror_swaps_sides_and_stays_balanced() {
        let mut entry = draft_with_lines(balanced_lines(dec!(500)));
        entry.mark_posted(UserId::new(), Utc::now());

        let today = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let mirror = entry
            .build_reversal(
                EntryId::new(),
                "JV-002/02-25".to_string(),
                "test",
                today,
                None,
                Utc::now(),
            )
            .unwrap();

        assert_eq!(mirror.status, EntryStatus::Draft);
        assert_eq!(mirror.reversal_of, Some(entry.id));
        assert_eq!(mirror.date, today);
        assert_eq!(mirror.lines[0].credit, entry.lines[0].debit);
        assert_eq!(mirror.lines[1].debit, entry.lines[1].credit);
        assert!(mirror.is_balanced());
        assert!(mirror.description.contains(&entry.voucher_number));
        assert!(mirror.description.contains("test"));
    }

    #[test]
    fn reversing_a_draft_entry_is_invalid_state() {
        let entry = draft_with_lines(balanced_lines(dec!(10)));
        let err = entry
            .build_reversal(
                EntryId::new(),
                "JV-002/02-25".to_string(),
                "nope",
                entry.date,
                None,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
    }

    #[test]
    fn second_reversal_is_rejected() {
        let mut entry = draft_with_lines(balanced_lines(dec!(10)));
        entry.mark_posted(UserId::new(), Utc::now());
        entry.mark_reversed(EntryId::new(), Utc::now());
        // Status is now Reversed, so the state check fires first.
        assert!(matches!(
            entry.build_reversal(
                EntryId::new(),
                "JV-003/02-25".to_string(),
                "again",
                entry.date,
                None,
                Utc::now(),
            ),
            Err(LedgerError::InvalidState { .. })
        ));
    }

    #[test]
    fn cancel_is_draft_only_and_appends_reason() {
        let mut entry = draft_with_lines(balanced_lines(dec!(10)));
        entry.mark_cancelled("fat-fingered", Utc::now()).unwrap();
        assert_eq!(entry.status, EntryStatus::Cancelled);
        assert!(entry.notes.as_deref().unwrap().contains("fat-fingered"));

        let mut posted = draft_with_lines(balanced_lines(dec!(10)));
        posted.mark_posted(UserId::new(), Utc::now());
        assert!(matches!(
            posted.mark_cancelled("too late", Utc::now()),
            Err(LedgerError::InvalidState { .. })
        ));
    }

    #[test]
    fn set_date_rederives_fiscal_fields() {
        let mut entry = draft_with_lines(balanced_lines(dec!(10)));
        entry.set_date(NaiveDate::from_ymd_opt(2024, 11, 30).unwrap());
        assert_eq!(entry.fiscal_year, 2024);
        assert_eq!(entry.fiscal_period, 11);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: any entry built from debit/credit pairs of equal
            /// amounts is balanced, and its reversal mirror swaps the totals
            /// exactly.
            #[test]
            fn mirror_swaps_totals_and_preserves_balance(
                amounts in prop::collection::vec(1i64..1_000_000i64, 1..8)
            ) {
                let lines: Vec<JournalLine> = amounts
                    .iter()
                    .flat_map(|&cents| {
                        let amount = Decimal::new(cents, 2);
                        [
                            JournalLine::debit(AccountId::new(), amount),
                            JournalLine::credit(AccountId::new(), amount),
                        ]
                    })
                    .collect();

                let mut entry = draft_with_lines(lines);
                prop_assert!(entry.is_balanced());

                entry.mark_posted(UserId::new(), Utc::now());
                let mirror = entry
                    .build_reversal(
                        EntryId::new(),
                        "JV-099/01-25".to_string(),
                        "property",
                        entry.date,
                        None,
                        Utc::now(),
                    )
                    .unwrap();

                prop_assert!(mirror.is_balanced());
                prop_assert_eq!(mirror.total_debit, entry.total_credit);
                prop_assert_eq!(mirror.total_credit, entry.total_debit);
            }
        }
    }
}

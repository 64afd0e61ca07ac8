//! Journal entry lifecycle engine.
//!
//! Load → decide (pure domain) → commit one unit of work. Posting applies
//! the Draft→Posted transition and every touched account's balance delta in
//! a single atomic commit; reversal additionally inserts the mirror entry
//! and links both sides in that same commit, so the "not yet reversed" check
//! and the act are never split across a race window.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate, Utc};

use tallybook_core::{AccountId, EntryId, LedgerError, LedgerResult, UserId};
use tallybook_ledger::{
    voucher_number, Account, EntryStatus, JournalEntry, JournalLine, VoucherType,
};

use crate::store::{LedgerStore, UnitOfWork};

/// Attempts at a generated voucher number before surfacing the conflict.
const NUMBERING_ATTEMPTS: usize = 3;

/// Attempts at a post/reverse commit racing other writers.
const COMMIT_ATTEMPTS: usize = 3;

/// Specification for a new draft entry.
#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub voucher_type: VoucherType,
    /// Explicit number; generated from the (type, month) sequence when
    /// absent.
    pub voucher_number: Option<String>,
    pub date: NaiveDate,
    pub lines: Vec<JournalLine>,
    pub description: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
}

/// Partial update for a Draft entry; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct JournalPatch {
    pub date: Option<NaiveDate>,
    pub lines: Option<Vec<JournalLine>>,
    pub description: Option<String>,
    pub reference: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// Listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilter {
    pub status: Option<EntryStatus>,
    pub voucher_type: Option<VoucherType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub struct JournalService<S> {
    store: S,
}

impl<S: LedgerStore> JournalService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a Draft entry: validates lines and account references,
    /// derives totals and fiscal fields, assigns the voucher number.
    pub fn create(&self, spec: NewJournalEntry) -> LedgerResult<JournalEntry> {
        self.ensure_accounts_exist(&spec.lines)?;

        if let Some(ref number) = spec.voucher_number {
            if number.trim().is_empty() {
                return Err(LedgerError::validation("voucher number must not be empty"));
            }
            let entry = self.build_draft(&spec, number.clone())?;
            return self.try_insert(entry);
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            // Recount on every attempt and skip `attempt - 1` numbers past
            // the count, so a collision with an explicitly claimed number
            // cannot pin the loop on the same candidate.
            let sequence = self.next_sequence(spec.voucher_type, spec.date)? + (attempt - 1);
            let number = voucher_number(spec.voucher_type, sequence, spec.date);
            let entry = self.build_draft(&spec, number)?;
            match self.try_insert(entry) {
                Err(LedgerError::DuplicateVoucherNumber(number))
                    if (attempt as usize) < NUMBERING_ATTEMPTS =>
                {
                    tracing::debug!(%number, attempt, "voucher number taken, renumbering");
                }
                other => return other,
            }
        }
    }

    fn build_draft(&self, spec: &NewJournalEntry, number: String) -> LedgerResult<JournalEntry> {
        JournalEntry::draft(
            EntryId::new(),
            number,
            spec.voucher_type,
            spec.date,
            spec.lines.clone(),
            spec.description.clone(),
            spec.reference.clone(),
            spec.notes.clone(),
            spec.created_by,
            Utc::now(),
        )
    }

    fn try_insert(&self, entry: JournalEntry) -> LedgerResult<JournalEntry> {
        let mut uow = UnitOfWork::new();
        uow.insert_entry(entry.clone());
        self.store.commit(uow)?;
        self.get(entry.id)
    }

    fn next_sequence(&self, voucher_type: VoucherType, date: NaiveDate) -> LedgerResult<u32> {
        let count = self
            .store
            .count_vouchers(voucher_type, date.year(), date.month())?;
        Ok(count as u32 + 1)
    }

    fn ensure_accounts_exist(&self, lines: &[JournalLine]) -> LedgerResult<()> {
        let mut seen = HashSet::new();
        for line in lines {
            if seen.insert(line.account_id) && self.store.account(line.account_id)?.is_none() {
                return Err(LedgerError::account_not_found(line.account_id.to_string()));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: EntryId) -> LedgerResult<JournalEntry> {
        self.store.entry(id)?.ok_or(LedgerError::NotFound)
    }

    pub fn list(&self, filter: &EntryFilter) -> LedgerResult<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self
            .store
            .entries()?
            .into_iter()
            .filter(|e| {
                filter.status.map_or(true, |s| e.status == s)
                    && filter.voucher_type.map_or(true, |v| e.voucher_type == v)
                    && filter.from.map_or(true, |d| e.date >= d)
                    && filter.to.map_or(true, |d| e.date <= d)
            })
            .collect();
        entries.sort_by(|a, b| {
            (a.date, &a.voucher_number).cmp(&(b.date, &b.voucher_number))
        });
        Ok(entries)
    }

    /// Update a Draft entry; re-runs the same derivation and validation as
    /// `create`.
    pub fn update(&self, id: EntryId, patch: JournalPatch) -> LedgerResult<JournalEntry> {
        let mut entry = self.get(id)?;
        if entry.status != EntryStatus::Draft {
            return Err(LedgerError::invalid_state("update", entry.status.as_str()));
        }

        if let Some(date) = patch.date {
            entry.set_date(date);
        }
        if let Some(lines) = patch.lines {
            self.ensure_accounts_exist(&lines)?;
            entry.set_lines(lines)?;
        }
        if let Some(description) = patch.description {
            entry.description = description;
        }
        if let Some(reference) = patch.reference {
            entry.reference = reference;
        }
        if let Some(notes) = patch.notes {
            entry.notes = notes;
        }
        entry.updated_at = Utc::now();

        let mut uow = UnitOfWork::new();
        uow.update_entry(entry.clone());
        self.store.commit(uow)?;
        self.get(id)
    }

    /// Post a Draft entry: preconditions, then balance deltas plus the
    /// status transition in one atomic commit. A version conflict from a
    /// concurrent writer reloads and retries.
    pub fn post(&self, id: EntryId, acting_user: UserId) -> LedgerResult<JournalEntry> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_post(id, acting_user) {
                Err(LedgerError::Conflict(msg)) if attempt < COMMIT_ATTEMPTS => {
                    tracing::debug!(%msg, attempt, "posting raced a concurrent commit, retrying");
                }
                other => return other,
            }
        }
    }

    fn try_post(&self, id: EntryId, acting_user: UserId) -> LedgerResult<JournalEntry> {
        let mut entry = self.get(id)?;
        entry.ensure_postable()?;

        let mut accounts = self.load_postable_accounts(&entry)?;
        for line in &entry.lines {
            if let Some(account) = accounts.get_mut(&line.account_id) {
                account.apply_movement(line.is_debit(), line.amount());
            }
        }
        entry.mark_posted(acting_user, Utc::now());

        let mut uow = UnitOfWork::new();
        for account in accounts.into_values() {
            uow.update_account(account);
        }
        uow.update_entry(entry.clone());
        self.store.commit(uow)?;

        tracing::info!(
            voucher = %entry.voucher_number,
            user = %acting_user,
            total = %entry.total_debit,
            "journal entry posted"
        );
        self.get(id)
    }

    /// Resolve each referenced account once; reject missing accounts and
    /// accounts not open for posting before any balance is touched.
    fn load_postable_accounts(
        &self,
        entry: &JournalEntry,
    ) -> LedgerResult<BTreeMap<AccountId, Account>> {
        let mut accounts = BTreeMap::new();
        for line in &entry.lines {
            if accounts.contains_key(&line.account_id) {
                continue;
            }
            let account = self
                .store
                .account(line.account_id)?
                .ok_or_else(|| LedgerError::account_not_found(line.account_id.to_string()))?;
            if !account.is_postable() {
                return Err(LedgerError::posting_not_allowed(account.code.clone()));
            }
            accounts.insert(line.account_id, account);
        }
        Ok(accounts)
    }

    /// Reverse a Posted entry with a compensating mirror. The mirror goes
    /// through the same posting validation and balance application; the
    /// original's transition to Reversed, the linkage, the mirror insert and
    /// the balance deltas commit together.
    pub fn reverse(
        &self,
        id: EntryId,
        acting_user: UserId,
        reason: &str,
    ) -> LedgerResult<(JournalEntry, JournalEntry)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_reverse(id, acting_user, reason) {
                Err(ref e) if e.is_retryable() && attempt < COMMIT_ATTEMPTS => {
                    tracing::debug!(error = %e, attempt, "reversal raced a concurrent commit, retrying");
                }
                other => return other,
            }
        }
    }

    fn try_reverse(
        &self,
        id: EntryId,
        acting_user: UserId,
        reason: &str,
    ) -> LedgerResult<(JournalEntry, JournalEntry)> {
        let mut original = self.get(id)?;

        let now = Utc::now();
        let today = now.date_naive();
        let sequence = self.next_sequence(original.voucher_type, today)?;
        let number = voucher_number(original.voucher_type, sequence, today);

        let mut mirror = original.build_reversal(
            EntryId::new(),
            number,
            reason,
            today,
            Some(acting_user),
            now,
        )?;
        mirror.ensure_postable()?;

        let mut accounts = self.load_postable_accounts(&mirror)?;
        for line in &mirror.lines {
            if let Some(account) = accounts.get_mut(&line.account_id) {
                account.apply_movement(line.is_debit(), line.amount());
            }
        }
        mirror.mark_posted(acting_user, now);
        original.mark_reversed(mirror.id, now);

        let mut uow = UnitOfWork::new();
        for account in accounts.into_values() {
            uow.update_account(account);
        }
        uow.update_entry(original.clone());
        uow.insert_entry(mirror.clone());
        self.store.commit(uow)?;

        tracing::info!(
            voucher = %original.voucher_number,
            mirror = %mirror.voucher_number,
            user = %acting_user,
            "journal entry reversed"
        );
        Ok((self.get(original.id)?, self.get(mirror.id)?))
    }

    /// Cancel a Draft entry. Drafts never touched balances, so this is a
    /// pure status transition.
    pub fn cancel(
        &self,
        id: EntryId,
        acting_user: UserId,
        reason: &str,
    ) -> LedgerResult<JournalEntry> {
        let mut entry = self.get(id)?;
        entry.mark_cancelled(reason, Utc::now())?;

        let mut uow = UnitOfWork::new();
        uow.update_entry(entry.clone());
        self.store.commit(uow)?;

        tracing::info!(
            voucher = %entry.voucher_number,
            user = %acting_user,
            "journal entry cancelled"
        );
        self.get(id)
    }

    /// Delete a Draft entry. Posted history is permanent; reversal is the
    /// only way to undo it.
    pub fn delete(&self, id: EntryId) -> LedgerResult<()> {
        let entry = self.get(id)?;
        if entry.status != EntryStatus::Draft {
            return Err(LedgerError::referential(format!(
                "entry {} is {}; only draft entries may be deleted",
                entry.voucher_number, entry.status
            )));
        }
        let mut uow = UnitOfWork::new();
        uow.delete_entry(id, entry.version);
        self.store.commit(uow)?;
        Ok(())
    }
}

impl<S> JournalService<S> {
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: Clone> Clone for JournalService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

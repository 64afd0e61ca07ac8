//! Storage abstraction for accounts and journal entries.
//!
//! The unit of work is the atomicity boundary: a posting's status transition
//! and every touched account's balance ride in one [`UnitOfWork`], and
//! [`LedgerStore::commit`] applies all of it or none of it. Each write
//! carries the version the caller observed at load; a mismatch rejects the
//! whole unit.

pub mod in_memory;

pub use in_memory::InMemoryLedgerStore;

use std::sync::Arc;

use thiserror::Error;

use tallybook_core::{AccountId, EntryId, LedgerError};
use tallybook_ledger::{Account, JournalEntry, SubledgerEntity, VoucherType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write's expected version did not match the stored record.
    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("duplicate account code: {0}")]
    DuplicateAccountCode(String),

    #[error("duplicate voucher number: {0}")]
    DuplicateVoucherNumber(String),

    /// A write targeted a record that does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Non-domain storage failure (e.g. poisoned lock).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            StoreError::DuplicateAccountCode(code) => LedgerError::DuplicateAccountCode(code),
            StoreError::DuplicateVoucherNumber(number) => {
                LedgerError::DuplicateVoucherNumber(number)
            }
            StoreError::NotFound(_) => LedgerError::NotFound,
            StoreError::Backend(msg) => LedgerError::Store(msg),
        }
    }
}

/// One record write inside a unit of work.
///
/// Updates and deletes carry the version observed at load (in the record's
/// `version` field, or explicitly for deletes); inserts expect the record to
/// be absent. A unit of work holds at most one write per record.
#[derive(Debug, Clone)]
pub enum RecordWrite {
    InsertAccount(Account),
    UpdateAccount(Account),
    DeleteAccount(AccountId, u64),
    InsertEntry(JournalEntry),
    UpdateEntry(JournalEntry),
    DeleteEntry(EntryId, u64),
}

/// An all-or-nothing batch of record writes.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    writes: Vec<RecordWrite>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_account(&mut self, account: Account) -> &mut Self {
        self.writes.push(RecordWrite::InsertAccount(account));
        self
    }

    pub fn update_account(&mut self, account: Account) -> &mut Self {
        self.writes.push(RecordWrite::UpdateAccount(account));
        self
    }

    pub fn delete_account(&mut self, id: AccountId, version: u64) -> &mut Self {
        self.writes.push(RecordWrite::DeleteAccount(id, version));
        self
    }

    pub fn insert_entry(&mut self, entry: JournalEntry) -> &mut Self {
        self.writes.push(RecordWrite::InsertEntry(entry));
        self
    }

    pub fn update_entry(&mut self, entry: JournalEntry) -> &mut Self {
        self.writes.push(RecordWrite::UpdateEntry(entry));
        self
    }

    pub fn delete_entry(&mut self, id: EntryId, version: u64) -> &mut Self {
        self.writes.push(RecordWrite::DeleteEntry(id, version));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[RecordWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<RecordWrite> {
        self.writes
    }
}

/// Durable, transactional read/write of accounts and journal entries.
///
/// Reads are snapshot-consistent per call; `commit` is serializable with
/// respect to other commits.
pub trait LedgerStore: Send + Sync {
    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    fn account_by_code(&self, code: &str) -> Result<Option<Account>, StoreError>;

    fn account_by_subledger(
        &self,
        entity: SubledgerEntity,
        entity_code: &str,
    ) -> Result<Option<Account>, StoreError>;

    fn accounts(&self) -> Result<Vec<Account>, StoreError>;

    fn entry(&self, id: EntryId) -> Result<Option<JournalEntry>, StoreError>;

    fn entries(&self) -> Result<Vec<JournalEntry>, StoreError>;

    /// All entries with at least one line referencing the account (any
    /// status); reporting filters to posted.
    fn entries_for_account(&self, id: AccountId) -> Result<Vec<JournalEntry>, StoreError>;

    /// Count of entries of a voucher type dated within a calendar month.
    fn count_vouchers(
        &self,
        voucher_type: VoucherType,
        year: i32,
        month: u32,
    ) -> Result<u64, StoreError>;

    /// Whether any journal entry line (in any status) references the account.
    fn references_account(&self, id: AccountId) -> Result<bool, StoreError>;

    /// Apply a unit of work atomically: every write validated (presence,
    /// version, uniqueness) before any is applied.
    fn commit(&self, uow: UnitOfWork) -> Result<(), StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        (**self).account(id)
    }

    fn account_by_code(&self, code: &str) -> Result<Option<Account>, StoreError> {
        (**self).account_by_code(code)
    }

    fn account_by_subledger(
        &self,
        entity: SubledgerEntity,
        entity_code: &str,
    ) -> Result<Option<Account>, StoreError> {
        (**self).account_by_subledger(entity, entity_code)
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        (**self).accounts()
    }

    fn entry(&self, id: EntryId) -> Result<Option<JournalEntry>, StoreError> {
        (**self).entry(id)
    }

    fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        (**self).entries()
    }

    fn entries_for_account(&self, id: AccountId) -> Result<Vec<JournalEntry>, StoreError> {
        (**self).entries_for_account(id)
    }

    fn count_vouchers(
        &self,
        voucher_type: VoucherType,
        year: i32,
        month: u32,
    ) -> Result<u64, StoreError> {
        (**self).count_vouchers(voucher_type, year, month)
    }

    fn references_account(&self, id: AccountId) -> Result<bool, StoreError> {
        (**self).references_account(id)
    }

    fn commit(&self, uow: UnitOfWork) -> Result<(), StoreError> {
        (**self).commit(uow)
    }
}

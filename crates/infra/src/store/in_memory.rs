use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Datelike;

use tallybook_core::{AccountId, EntryId};
use tallybook_ledger::{Account, JournalEntry, SubledgerEntity, VoucherType};

use super::{LedgerStore, RecordWrite, StoreError, UnitOfWork};

/// In-memory ledger store.
///
/// Intended for tests/dev. Commits serialize behind a single write lock;
/// every write is validated against current state before any is applied, so
/// a failing unit of work leaves nothing behind.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Clone, Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    codes: HashMap<String, AccountId>,
    subledgers: HashMap<(SubledgerEntity, String), AccountId>,
    entries: HashMap<EntryId, JournalEntry>,
    vouchers: HashMap<String, EntryId>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

impl Inner {
    fn validate(&self, write: &RecordWrite) -> Result<(), StoreError> {
        match write {
            RecordWrite::InsertAccount(account) => {
                if self.accounts.contains_key(&account.id) {
                    return Err(StoreError::Conflict(format!(
                        "account {} already exists",
                        account.id
                    )));
                }
                if self.codes.contains_key(&account.code) {
                    return Err(StoreError::DuplicateAccountCode(account.code.clone()));
                }
                if let Some(ref tag) = account.subledger {
                    if self
                        .subledgers
                        .contains_key(&(tag.entity, tag.entity_code.clone()))
                    {
                        return Err(StoreError::Conflict(format!(
                            "subledger {}/{} already linked",
                            tag.entity_code, account.code
                        )));
                    }
                }
                Ok(())
            }
            RecordWrite::UpdateAccount(account) => {
                let existing = self.accounts.get(&account.id).ok_or_else(|| {
                    StoreError::NotFound(format!("account {}", account.id))
                })?;
                if existing.version != account.version {
                    return Err(StoreError::Conflict(format!(
                        "account {} expected version {}, found {}",
                        account.id, account.version, existing.version
                    )));
                }
                if account.code != existing.code && self.codes.contains_key(&account.code) {
                    return Err(StoreError::DuplicateAccountCode(account.code.clone()));
                }
                Ok(())
            }
            RecordWrite::DeleteAccount(id, version) => {
                let existing = self
                    .accounts
                    .get(id)
                    .ok_or_else(|| StoreError::NotFound(format!("account {id}")))?;
                if existing.version != *version {
                    return Err(StoreError::Conflict(format!(
                        "account {id} expected version {version}, found {}",
                        existing.version
                    )));
                }
                Ok(())
            }
            RecordWrite::InsertEntry(entry) => {
                if self.entries.contains_key(&entry.id) {
                    return Err(StoreError::Conflict(format!(
                        "entry {} already exists",
                        entry.id
                    )));
                }
                if self.vouchers.contains_key(&entry.voucher_number) {
                    return Err(StoreError::DuplicateVoucherNumber(
                        entry.voucher_number.clone(),
                    ));
                }
                Ok(())
            }
            RecordWrite::UpdateEntry(entry) => {
                let existing = self
                    .entries
                    .get(&entry.id)
                    .ok_or_else(|| StoreError::NotFound(format!("entry {}", entry.id)))?;
                if existing.version != entry.version {
                    return Err(StoreError::Conflict(format!(
                        "entry {} expected version {}, found {}",
                        entry.id, entry.version, existing.version
                    )));
                }
                if entry.voucher_number != existing.voucher_number
                    && self.vouchers.contains_key(&entry.voucher_number)
                {
                    return Err(StoreError::DuplicateVoucherNumber(
                        entry.voucher_number.clone(),
                    ));
                }
                Ok(())
            }
            RecordWrite::DeleteEntry(id, version) => {
                let existing = self
                    .entries
                    .get(id)
                    .ok_or_else(|| StoreError::NotFound(format!("entry {id}")))?;
                if existing.version != *version {
                    return Err(StoreError::Conflict(format!(
                        "entry {id} expected version {version}, found {}",
                        existing.version
                    )));
                }
                Ok(())
            }
        }
    }

    fn apply(&mut self, write: RecordWrite) {
        match write {
            RecordWrite::InsertAccount(mut account) => {
                account.version = 1;
                self.codes.insert(account.code.clone(), account.id);
                if let Some(ref tag) = account.subledger {
                    self.subledgers
                        .insert((tag.entity, tag.entity_code.clone()), account.id);
                }
                self.accounts.insert(account.id, account);
            }
            RecordWrite::UpdateAccount(mut account) => {
                if let Some(old) = self.accounts.get(&account.id) {
                    if old.code != account.code {
                        self.codes.remove(&old.code);
                    }
                    if let Some(ref tag) = old.subledger {
                        if old.subledger != account.subledger {
                            self.subledgers
                                .remove(&(tag.entity, tag.entity_code.clone()));
                        }
                    }
                }
                account.version += 1;
                self.codes.insert(account.code.clone(), account.id);
                if let Some(ref tag) = account.subledger {
                    self.subledgers
                        .insert((tag.entity, tag.entity_code.clone()), account.id);
                }
                self.accounts.insert(account.id, account);
            }
            RecordWrite::DeleteAccount(id, _) => {
                if let Some(account) = self.accounts.remove(&id) {
                    self.codes.remove(&account.code);
                    if let Some(ref tag) = account.subledger {
                        self.subledgers
                            .remove(&(tag.entity, tag.entity_code.clone()));
                    }
                }
            }
            RecordWrite::InsertEntry(mut entry) => {
                entry.version = 1;
                self.vouchers.insert(entry.voucher_number.clone(), entry.id);
                self.entries.insert(entry.id, entry);
            }
            RecordWrite::UpdateEntry(mut entry) => {
                if let Some(old) = self.entries.get(&entry.id) {
                    if old.voucher_number != entry.voucher_number {
                        self.vouchers.remove(&old.voucher_number);
                    }
                }
                entry.version += 1;
                self.vouchers.insert(entry.voucher_number.clone(), entry.id);
                self.entries.insert(entry.id, entry);
            }
            RecordWrite::DeleteEntry(id, _) => {
                if let Some(entry) = self.entries.remove(&id) {
                    self.vouchers.remove(&entry.voucher_number);
                }
            }
        }
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    fn account_by_code(&self, code: &str) -> Result<Option<Account>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .codes
            .get(code)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    fn account_by_subledger(
        &self,
        entity: SubledgerEntity,
        entity_code: &str,
    ) -> Result<Option<Account>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .subledgers
            .get(&(entity, entity_code.to_string()))
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.read()?.accounts.values().cloned().collect())
    }

    fn entry(&self, id: EntryId) -> Result<Option<JournalEntry>, StoreError> {
        Ok(self.read()?.entries.get(&id).cloned())
    }

    fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        Ok(self.read()?.entries.values().cloned().collect())
    }

    fn entries_for_account(&self, id: AccountId) -> Result<Vec<JournalEntry>, StoreError> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|e| e.references_account(id))
            .cloned()
            .collect())
    }

    fn count_vouchers(
        &self,
        voucher_type: VoucherType,
        year: i32,
        month: u32,
    ) -> Result<u64, StoreError> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|e| {
                e.voucher_type == voucher_type
                    && e.date.year() == year
                    && e.date.month() == month
            })
            .count() as u64)
    }

    fn references_account(&self, id: AccountId) -> Result<bool, StoreError> {
        Ok(self
            .read()?
            .entries
            .values()
            .any(|e| e.references_account(id)))
    }

    fn commit(&self, uow: UnitOfWork) -> Result<(), StoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        // Stage onto a copy so a failing write (including one conflicting
        // with an earlier write in the same unit) applies nothing.
        let mut staged = inner.clone();
        for write in uow.into_writes() {
            staged.validate(&write)?;
            staged.apply(write);
        }
        *inner = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use tallybook_ledger::{AccountType, JournalLine, NewAccount};

    fn test_account(code: &str) -> Account {
        Account::new(
            NewAccount::new("Cash", AccountType::Asset),
            code.to_string(),
            Utc::now(),
        )
    }

    fn test_entry(voucher: &str, lines: Vec<JournalLine>) -> JournalEntry {
        JournalEntry::draft(
            EntryId::new(),
            voucher.to_string(),
            VoucherType::Journal,
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            lines,
            "test".to_string(),
            None,
            None,
            None,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn insert_assigns_version_one() {
        let store = InMemoryLedgerStore::new();
        let account = test_account("1001");
        let id = account.id;

        let mut uow = UnitOfWork::new();
        uow.insert_account(account);
        store.commit(uow).unwrap();

        assert_eq!(store.account(id).unwrap().unwrap().version, 1);
    }

    #[test]
    fn duplicate_account_code_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let mut uow = UnitOfWork::new();
        uow.insert_account(test_account("1001"));
        store.commit(uow).unwrap();

        let mut uow = UnitOfWork::new();
        uow.insert_account(test_account("1001"));
        assert!(matches!(
            store.commit(uow),
            Err(StoreError::DuplicateAccountCode(_))
        ));
    }

    #[test]
    fn stale_version_rejects_update() {
        let store = InMemoryLedgerStore::new();
        let account = test_account("1001");
        let id = account.id;
        let mut uow = UnitOfWork::new();
        uow.insert_account(account);
        store.commit(uow).unwrap();

        let loaded = store.account(id).unwrap().unwrap();

        // First writer wins.
        let mut uow = UnitOfWork::new();
        uow.update_account(loaded.clone());
        store.commit(uow).unwrap();

        // Second writer with the stale load loses.
        let mut uow = UnitOfWork::new();
        uow.update_account(loaded);
        assert!(matches!(store.commit(uow), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn failing_unit_of_work_applies_nothing() {
        let store = InMemoryLedgerStore::new();
        let good = test_account("1001");
        let good_id = good.id;
        let mut uow = UnitOfWork::new();
        uow.insert_account(good);
        // Same code: the second write fails validation, so the first must
        // not be applied either.
        uow.insert_account(test_account("1001"));
        assert!(store.commit(uow).is_err());
        assert!(store.account(good_id).unwrap().is_none());
    }

    #[test]
    fn duplicate_voucher_number_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let a = AccountId::new();
        let b = AccountId::new();
        let lines = || {
            vec![
                JournalLine::debit(a, dec!(100)),
                JournalLine::credit(b, dec!(100)),
            ]
        };

        let mut uow = UnitOfWork::new();
        uow.insert_entry(test_entry("JV-001/01-25", lines()));
        store.commit(uow).unwrap();

        let mut uow = UnitOfWork::new();
        uow.insert_entry(test_entry("JV-001/01-25", lines()));
        assert!(matches!(
            store.commit(uow),
            Err(StoreError::DuplicateVoucherNumber(_))
        ));
    }

    #[test]
    fn count_vouchers_partitions_by_type_and_month() {
        let store = InMemoryLedgerStore::new();
        let a = AccountId::new();
        let b = AccountId::new();
        let lines = || {
            vec![
                JournalLine::debit(a, dec!(10)),
                JournalLine::credit(b, dec!(10)),
            ]
        };

        let mut uow = UnitOfWork::new();
        uow.insert_entry(test_entry("JV-001/01-25", lines()));
        uow.insert_entry(test_entry("JV-002/01-25", lines()));
        let mut other = test_entry("CR-001/01-25", lines());
        other.voucher_type = VoucherType::CashReceipt;
        uow.insert_entry(other);
        store.commit(uow).unwrap();

        assert_eq!(
            store.count_vouchers(VoucherType::Journal, 2025, 1).unwrap(),
            2
        );
        assert_eq!(
            store
                .count_vouchers(VoucherType::CashReceipt, 2025, 1)
                .unwrap(),
            1
        );
        assert_eq!(
            store.count_vouchers(VoucherType::Journal, 2025, 2).unwrap(),
            0
        );
    }
}

//! Chart of Accounts registry.
//!
//! Owns account identity, code assignment, the parent/child hierarchy
//! (cycle-checked on every re-parent), subledger provisioning for external
//! entities, and the delete/deactivate referential guards. Balance mutation
//! is *not* here: that belongs to the posting path.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rust_decimal::Decimal;

use tallybook_core::{AccountId, LedgerError, LedgerResult};
use tallybook_ledger::{
    Account, AccountPatch, AccountType, NewAccount, SubledgerEntity, SubledgerRef,
};

use crate::store::{LedgerStore, UnitOfWork};

/// Attempts at inserting a generated account code before surfacing the
/// conflict (concurrent creations can compute the same next code).
const CODE_ATTEMPTS: usize = 3;

/// Width of the numeric part of generated codes.
const CODE_WIDTH: usize = 4;

/// Listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountFilter {
    pub account_type: Option<AccountType>,
    pub active_only: bool,
}

/// A subtree of the Chart of Accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountNode {
    pub account: Account,
    pub children: Vec<AccountNode>,
}

pub struct AccountRegistry<S> {
    store: S,
}

impl<S: LedgerStore> AccountRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create an account. Assigns a code from the type's range when none is
    /// supplied; derives the normal balance; rejects duplicate codes.
    pub fn create(&self, spec: NewAccount) -> LedgerResult<Account> {
        if spec.name.trim().is_empty() {
            return Err(LedgerError::validation("account name must not be empty"));
        }
        if let Some(parent_id) = spec.parent {
            let parent = self
                .store
                .account(parent_id)?
                .ok_or_else(|| LedgerError::account_not_found(parent_id.to_string()))?;
            if parent.account_type != spec.account_type {
                return Err(LedgerError::validation(format!(
                    "parent account {} is {}, child must match",
                    parent.code, parent.account_type
                )));
            }
        }

        if let Some(ref code) = spec.code {
            if code.trim().is_empty() {
                return Err(LedgerError::validation("account code must not be empty"));
            }
            let account = Account::new(spec.clone(), code.clone(), Utc::now());
            return self.try_insert(account);
        }

        // Generated codes can race; recompute and retry a bounded number of
        // times before surfacing the conflict.
        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = self.next_code(spec.account_type)?;
            let account = Account::new(spec.clone(), code, Utc::now());
            match self.try_insert(account) {
                Err(LedgerError::DuplicateAccountCode(code)) if attempt < CODE_ATTEMPTS => {
                    tracing::debug!(%code, attempt, "generated account code taken, retrying");
                }
                other => return other,
            }
        }
    }

    fn try_insert(&self, account: Account) -> LedgerResult<Account> {
        let mut uow = UnitOfWork::new();
        uow.insert_account(account.clone());
        self.store.commit(uow)?;
        tracing::debug!(code = %account.code, name = %account.name, "account created");
        // Re-read for the store-assigned version.
        self.get(account.id)
    }

    /// Next free code in the type's range: leading type digit + zero-padded
    /// sequence, one past the highest already assigned (deletions never
    /// cause reuse of a lower number).
    fn next_code(&self, account_type: AccountType) -> LedgerResult<String> {
        let prefix = account_type.code_prefix();
        let max = self
            .store
            .accounts()?
            .iter()
            .filter_map(|a| {
                let code = a.code.as_str();
                if code.len() == CODE_WIDTH + 1 && code.starts_with(prefix) {
                    code[1..].parse::<u32>().ok()
                } else {
                    None
                }
            })
            .max()
            .unwrap_or(0);
        Ok(format!("{prefix}{:0width$}", max + 1, width = CODE_WIDTH))
    }

    pub fn get(&self, id: AccountId) -> LedgerResult<Account> {
        self.store
            .account(id)?
            .ok_or_else(|| LedgerError::account_not_found(id.to_string()))
    }

    pub fn get_by_code(&self, code: &str) -> LedgerResult<Account> {
        self.store
            .account_by_code(code)?
            .ok_or_else(|| LedgerError::account_not_found(code))
    }

    pub fn list(&self, filter: &AccountFilter) -> LedgerResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .store
            .accounts()?
            .into_iter()
            .filter(|a| {
                filter
                    .account_type
                    .map_or(true, |t| a.account_type == t)
                    && (!filter.active_only || a.is_active)
            })
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    /// Current running balance, in the account's normal-balance terms.
    pub fn balance(&self, id: AccountId) -> LedgerResult<Decimal> {
        Ok(self.get(id)?.current_balance)
    }

    /// Apply a partial update. Type changes are refused for system accounts
    /// and for accounts already referenced by journal lines; re-parenting is
    /// cycle-checked; deactivation runs the referential guard.
    pub fn update(&self, id: AccountId, patch: AccountPatch) -> LedgerResult<Account> {
        let mut account = self.get(id)?;

        if let Some(new_type) = patch.account_type {
            if new_type != account.account_type {
                if account.is_system {
                    return Err(LedgerError::validation(
                        "cannot change the type of a system account",
                    ));
                }
                if self.store.references_account(id)? {
                    return Err(LedgerError::referential(format!(
                        "account {} is referenced by journal entries; type is frozen",
                        account.code
                    )));
                }
                account.account_type = new_type;
                account.normal_balance = new_type.normal_balance();
            }
        }

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation("account name must not be empty"));
            }
            account.name = name;
        }
        if let Some(category) = patch.category {
            account.category = category;
        }
        if let Some(sub_category) = patch.sub_category {
            account.sub_category = sub_category;
        }
        if let Some(allow_posting) = patch.allow_posting {
            account.allow_posting = allow_posting;
        }
        if let Some(is_active) = patch.is_active {
            if !is_active && account.is_active {
                self.ensure_unreferenced(&account)?;
            }
            account.is_active = is_active;
        }
        if let Some(parent) = patch.parent {
            if let Some(parent_id) = parent {
                self.ensure_no_cycle(id, parent_id)?;
                let parent_account = self.get(parent_id)?;
                if parent_account.account_type != account.account_type {
                    return Err(LedgerError::validation(format!(
                        "parent account {} is {}, child must match",
                        parent_account.code, parent_account.account_type
                    )));
                }
            }
            account.parent = parent;
        }

        account.touch(Utc::now());
        let mut uow = UnitOfWork::new();
        uow.update_account(account.clone());
        self.store.commit(uow)?;
        self.get(id)
    }

    /// Reject a parent assignment that would make `id` its own ancestor.
    fn ensure_no_cycle(&self, id: AccountId, new_parent: AccountId) -> LedgerResult<()> {
        if new_parent == id {
            return Err(LedgerError::validation(
                "account cannot be its own parent",
            ));
        }
        let accounts: HashMap<AccountId, Account> = self
            .store
            .accounts()?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut visited = HashSet::new();
        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == id {
                return Err(LedgerError::validation(
                    "re-parenting would create a cycle in the account hierarchy",
                ));
            }
            if !visited.insert(current) {
                break;
            }
            cursor = accounts.get(&current).and_then(|a| a.parent);
        }
        Ok(())
    }

    pub fn children(&self, id: AccountId) -> LedgerResult<Vec<Account>> {
        // Existence check first so an unknown id is an error, not [].
        self.get(id)?;
        let mut children: Vec<Account> = self
            .store
            .accounts()?
            .into_iter()
            .filter(|a| a.parent == Some(id))
            .collect();
        children.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(children)
    }

    /// Full subtree rooted at `id`.
    pub fn hierarchy(&self, id: AccountId) -> LedgerResult<AccountNode> {
        let root = self.get(id)?;
        let accounts = self.store.accounts()?;
        let mut by_parent: HashMap<AccountId, Vec<Account>> = HashMap::new();
        for account in accounts {
            if let Some(parent) = account.parent {
                by_parent.entry(parent).or_default().push(account);
            }
        }
        let mut visited = HashSet::new();
        Ok(Self::build_node(root, &mut by_parent, &mut visited))
    }

    fn build_node(
        account: Account,
        by_parent: &mut HashMap<AccountId, Vec<Account>>,
        visited: &mut HashSet<AccountId>,
    ) -> AccountNode {
        visited.insert(account.id);
        let mut children: Vec<Account> = by_parent.remove(&account.id).unwrap_or_default();
        children.sort_by(|a, b| a.code.cmp(&b.code));
        let children = children
            .into_iter()
            .filter(|c| !visited.contains(&c.id))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|c| Self::build_node(c, by_parent, visited))
            .collect();
        AccountNode { account, children }
    }

    /// Get-or-create the control account for an external entity (customer
    /// receivable / supplier payable), keyed by the entity's code.
    pub fn link_or_create_subledger(
        &self,
        entity: SubledgerEntity,
        entity_code: &str,
        name: &str,
    ) -> LedgerResult<Account> {
        if let Some(existing) = self.store.account_by_subledger(entity, entity_code)? {
            return Ok(existing);
        }

        let (account_type, category) = entity.account_shape();
        let mut spec = NewAccount::new(name, account_type);
        spec.category = Some(category);
        spec.subledger = Some(SubledgerRef {
            entity,
            entity_code: entity_code.to_string(),
        });

        match self.create(spec) {
            Ok(account) => {
                tracing::info!(
                    code = %account.code,
                    entity_code,
                    "subledger account provisioned"
                );
                Ok(account)
            }
            // Lost a provisioning race: the other writer's account wins.
            Err(LedgerError::Conflict(_)) => self
                .store
                .account_by_subledger(entity, entity_code)?
                .ok_or(LedgerError::NotFound),
            Err(e) => Err(e),
        }
    }

    pub fn deactivate(&self, id: AccountId) -> LedgerResult<Account> {
        self.update(
            id,
            AccountPatch {
                is_active: Some(false),
                ..AccountPatch::default()
            },
        )
    }

    /// Delete an account. Guarded: never for system accounts, accounts with
    /// children, or accounts referenced by any journal entry line.
    pub fn delete(&self, id: AccountId) -> LedgerResult<()> {
        let account = self.get(id)?;
        if account.is_system {
            return Err(LedgerError::referential(format!(
                "account {} is a system account",
                account.code
            )));
        }
        if !self.children(id)?.is_empty() {
            return Err(LedgerError::referential(format!(
                "account {} has child accounts",
                account.code
            )));
        }
        self.ensure_unreferenced(&account)?;

        let mut uow = UnitOfWork::new();
        uow.delete_account(id, account.version);
        self.store.commit(uow)?;
        tracing::debug!(code = %account.code, "account deleted");
        Ok(())
    }

    fn ensure_unreferenced(&self, account: &Account) -> LedgerResult<()> {
        if self.store.references_account(account.id)? {
            return Err(LedgerError::referential(format!(
                "account {} is referenced by journal entries",
                account.code
            )));
        }
        Ok(())
    }
}

impl<S> AccountRegistry<S> {
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: Clone> Clone for AccountRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

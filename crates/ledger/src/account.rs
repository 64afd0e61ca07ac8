use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tallybook_core::{AccountId, LedgerError, UserId};

/// High-level account type (determines the normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// The side on which this account type naturally accumulates value.
    pub fn normal_balance(self) -> NormalBalance {
        match self {
            AccountType::Asset | AccountType::Expense => NormalBalance::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalBalance::Credit
            }
        }
    }

    /// Leading digit of generated account codes for this type.
    pub fn code_prefix(self) -> char {
        match self {
            AccountType::Asset => '1',
            AccountType::Liability => '2',
            AccountType::Equity => '3',
            AccountType::Revenue => '4',
            AccountType::Expense => '5',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            other => Err(LedgerError::validation(format!(
                "unknown account type: {other}"
            ))),
        }
    }
}

/// Side on which an account's balance grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

/// Finer account taxonomy, informational; drives report grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountCategory {
    Cash,
    Bank,
    AccountsReceivable,
    Inventory,
    CurrentAsset,
    FixedAsset,
    AccountsPayable,
    CurrentLiability,
    LongTermLiability,
    ShareCapital,
    RetainedEarnings,
    OperatingRevenue,
    OtherIncome,
    CostOfGoodsSold,
    OperatingExpense,
    OtherExpense,
}

impl AccountCategory {
    /// Fallback category when the caller does not specify one.
    pub fn default_for(account_type: AccountType) -> Self {
        match account_type {
            AccountType::Asset => AccountCategory::CurrentAsset,
            AccountType::Liability => AccountCategory::CurrentLiability,
            AccountType::Equity => AccountCategory::ShareCapital,
            AccountType::Revenue => AccountCategory::OperatingRevenue,
            AccountType::Expense => AccountCategory::OperatingExpense,
        }
    }
}

/// Kind of external entity a subledger account belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubledgerEntity {
    Customer,
    Supplier,
}

impl SubledgerEntity {
    /// Control-account shape for this entity kind.
    pub fn account_shape(self) -> (AccountType, AccountCategory) {
        match self {
            SubledgerEntity::Customer => {
                (AccountType::Asset, AccountCategory::AccountsReceivable)
            }
            SubledgerEntity::Supplier => {
                (AccountType::Liability, AccountCategory::AccountsPayable)
            }
        }
    }
}

impl FromStr for SubledgerEntity {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(SubledgerEntity::Customer),
            "supplier" => Ok(SubledgerEntity::Supplier),
            other => Err(LedgerError::validation(format!(
                "unknown subledger entity: {other}"
            ))),
        }
    }
}

/// Tag linking an auto-provisioned account to an external entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubledgerRef {
    pub entity: SubledgerEntity,
    pub entity_code: String,
}

/// A node in the Chart of Accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Unique, immutable once assigned.
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub category: AccountCategory,
    pub sub_category: Option<String>,
    /// Derived from `account_type`; never user input.
    pub normal_balance: NormalBalance,
    /// Running balance in normal-balance terms. Mutated exclusively through
    /// the posting path ([`Account::apply_movement`]).
    pub current_balance: Decimal,
    /// Leaf/posting accounts only; rollup accounts exist for hierarchy.
    pub allow_posting: bool,
    pub parent: Option<AccountId>,
    pub is_active: bool,
    pub is_system: bool,
    pub subledger: Option<SubledgerRef>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, owned by the store.
    pub version: u64,
}

impl Account {
    pub fn new(spec: NewAccount, code: String, now: DateTime<Utc>) -> Self {
        let category = spec
            .category
            .unwrap_or_else(|| AccountCategory::default_for(spec.account_type));
        Self {
            id: AccountId::new(),
            code,
            name: spec.name,
            account_type: spec.account_type,
            category,
            sub_category: spec.sub_category,
            normal_balance: spec.account_type.normal_balance(),
            current_balance: Decimal::ZERO,
            allow_posting: spec.allow_posting,
            parent: spec.parent,
            is_active: true,
            is_system: spec.is_system,
            subledger: spec.subledger,
            created_by: spec.created_by,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Signed effect of a movement on this account's balance.
    ///
    /// A debit increases a debit-normal balance and decreases a credit-normal
    /// one; a credit does the reverse.
    pub fn balance_delta(&self, is_debit: bool, amount: Decimal) -> Decimal {
        match (self.normal_balance, is_debit) {
            (NormalBalance::Debit, true) | (NormalBalance::Credit, false) => amount,
            (NormalBalance::Debit, false) | (NormalBalance::Credit, true) => -amount,
        }
    }

    /// Apply a posted movement to the running balance.
    ///
    /// The **only** sanctioned balance mutator; called by the journal posting
    /// path inside its atomic commit.
    pub fn apply_movement(&mut self, is_debit: bool, amount: Decimal) {
        self.current_balance += self.balance_delta(is_debit, amount);
    }

    /// Whether journal lines may reference this account.
    pub fn is_postable(&self) -> bool {
        self.allow_posting && self.is_active
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Specification for creating an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// Explicit code; generated from the type's range when absent.
    pub code: Option<String>,
    pub name: String,
    pub account_type: AccountType,
    pub category: Option<AccountCategory>,
    pub sub_category: Option<String>,
    pub parent: Option<AccountId>,
    pub allow_posting: bool,
    pub is_system: bool,
    pub subledger: Option<SubledgerRef>,
    pub created_by: Option<UserId>,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: None,
            name: name.into(),
            account_type,
            category: None,
            sub_category: None,
            parent: None,
            allow_posting: true,
            is_system: false,
            subledger: None,
            created_by: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_parent(mut self, parent: AccountId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn rollup(mut self) -> Self {
        self.allow_posting = false;
        self
    }
}

/// Partial update for an account; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub category: Option<AccountCategory>,
    pub sub_category: Option<Option<String>>,
    pub allow_posting: Option<bool>,
    pub is_active: Option<bool>,
    /// `Some(None)` clears the parent; `Some(Some(id))` re-parents.
    pub parent: Option<Option<AccountId>>,
    pub account_type: Option<AccountType>,
}

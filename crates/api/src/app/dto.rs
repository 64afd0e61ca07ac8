use axum::http::StatusCode;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use tallybook_core::AccountId;
use tallybook_ledger::{Account, AccountCategory, JournalEntry, JournalLine};
use tallybook_infra::AccountNode;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub code: Option<String>,
    pub name: String,
    /// One of: asset, liability, equity, revenue, expense.
    pub account_type: String,
    pub category: Option<AccountCategory>,
    pub sub_category: Option<String>,
    pub parent: Option<String>,
    pub allow_posting: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub category: Option<AccountCategory>,
    pub sub_category: Option<String>,
    pub allow_posting: Option<bool>,
    pub is_active: Option<bool>,
    pub parent: Option<String>,
    #[serde(default)]
    pub clear_parent: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubledgerRequest {
    /// One of: customer, supplier.
    pub entity: String,
    pub entity_code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct JournalLineRequest {
    pub account_id: String,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub narration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJournalEntryRequest {
    /// One of the ten voucher kinds, e.g. "journal", "cash_receipt".
    pub voucher_type: String,
    pub voucher_number: Option<String>,
    /// ISO date (YYYY-MM-DD).
    pub date: String,
    pub lines: Vec<JournalLineRequest>,
    pub description: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJournalEntryRequest {
    pub date: Option<String>,
    pub lines: Option<Vec<JournalLineRequest>>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

// -------------------------
// Request mapping helpers
// -------------------------

pub fn parse_account_id(s: &str) -> Result<AccountId, axum::response::Response> {
    s.parse::<AccountId>().map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
    })
}

pub fn parse_date(s: &str) -> Result<NaiveDate, axum::response::Response> {
    s.parse::<NaiveDate>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("invalid date (expected YYYY-MM-DD): {s}"),
        )
    })
}

pub fn to_journal_lines(
    lines: Vec<JournalLineRequest>,
) -> Result<Vec<JournalLine>, axum::response::Response> {
    lines
        .into_iter()
        .map(|line| {
            let account_id = parse_account_id(&line.account_id)?;
            Ok(JournalLine {
                account_id,
                debit: line.debit.unwrap_or(Decimal::ZERO),
                credit: line.credit.unwrap_or(Decimal::ZERO),
                narration: line.narration,
            })
        })
        .collect()
}

// -------------------------
// Response mapping
// -------------------------

pub fn account_to_json(account: &Account) -> serde_json::Value {
    json!({
        "id": account.id.to_string(),
        "code": account.code,
        "name": account.name,
        "account_type": account.account_type.as_str(),
        "category": account.category,
        "sub_category": account.sub_category,
        "normal_balance": account.normal_balance,
        "current_balance": account.current_balance,
        "allow_posting": account.allow_posting,
        "parent": account.parent.map(|id| id.to_string()),
        "is_active": account.is_active,
        "is_system": account.is_system,
        "subledger": account.subledger,
    })
}

pub fn account_node_to_json(node: &AccountNode) -> serde_json::Value {
    json!({
        "account": account_to_json(&node.account),
        "children": node.children.iter().map(account_node_to_json).collect::<Vec<_>>(),
    })
}

pub fn entry_to_json(entry: &JournalEntry) -> serde_json::Value {
    json!({
        "id": entry.id.to_string(),
        "voucher_number": entry.voucher_number,
        "voucher_type": entry.voucher_type.as_str(),
        "date": entry.date.to_string(),
        "fiscal_year": entry.fiscal_year,
        "fiscal_period": entry.fiscal_period,
        "status": entry.status.as_str(),
        "description": entry.description,
        "reference": entry.reference,
        "notes": entry.notes,
        "total_debit": entry.total_debit,
        "total_credit": entry.total_credit,
        "lines": entry.lines.iter().map(line_to_json).collect::<Vec<_>>(),
        "reversed_by": entry.reversed_by.map(|id| id.to_string()),
        "reversal_of": entry.reversal_of.map(|id| id.to_string()),
        "posted_by": entry.posted_by.map(|u| u.to_string()),
        "posted_at": entry.posted_at.map(|t| t.to_rfc3339()),
        "created_at": entry.created_at.to_rfc3339(),
    })
}

fn line_to_json(line: &JournalLine) -> serde_json::Value {
    json!({
        "account_id": line.account_id.to_string(),
        "debit": line.debit,
        "credit": line.credit,
        "narration": line.narration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn journal_lines_map_missing_sides_to_zero() {
        let account_id = AccountId::new();
        let lines = to_journal_lines(vec![JournalLineRequest {
            account_id: account_id.to_string(),
            debit: Some(dec!(100)),
            credit: None,
            narration: None,
        }])
        .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].account_id, account_id);
        assert_eq!(lines[0].debit, dec!(100));
        assert_eq!(lines[0].credit, Decimal::ZERO);
    }

    #[test]
    fn malformed_account_id_is_a_bad_request() {
        let result = to_journal_lines(vec![JournalLineRequest {
            account_id: "not-a-uuid".to_string(),
            debit: Some(dec!(1)),
            credit: None,
            narration: None,
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn dates_parse_iso_only() {
        assert_eq!(
            parse_date("2025-03-14").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );
        assert!(parse_date("14/03/2025").is_err());
    }
}

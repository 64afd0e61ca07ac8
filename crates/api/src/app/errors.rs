use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tallybook_core::LedgerError;

/// Map a domain error onto a status code + stable error code.
pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let message = err.to_string();
    let (status, code) = match err {
        LedgerError::Validation(_) | LedgerError::InvalidId(_) => {
            (StatusCode::BAD_REQUEST, "validation_error")
        }
        LedgerError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "account_not_found"),
        LedgerError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        LedgerError::UnbalancedEntry { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "unbalanced_entry")
        }
        LedgerError::InsufficientLines { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_lines")
        }
        LedgerError::PostingNotAllowed(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "posting_not_allowed")
        }
        LedgerError::InvalidState { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_state"),
        LedgerError::AlreadyReversed(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "already_reversed")
        }
        LedgerError::ReferentialIntegrity(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "referential_integrity")
        }
        LedgerError::DuplicateVoucherNumber(_) => {
            (StatusCode::CONFLICT, "duplicate_voucher_number")
        }
        LedgerError::DuplicateAccountCode(_) => {
            (StatusCode::CONFLICT, "duplicate_account_code")
        }
        LedgerError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        LedgerError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
    };
    json_error(status, code, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

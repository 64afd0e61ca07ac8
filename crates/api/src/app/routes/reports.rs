use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/trial-balance", get(trial_balance))
        .route("/general-ledger/:account_id", get(general_ledger))
}

#[derive(Debug, Deserialize)]
pub struct TrialBalanceQuery {
    /// Defaults to today.
    pub as_of: Option<String>,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<u32>,
}

pub async fn trial_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<TrialBalanceQuery>,
) -> axum::response::Response {
    let as_of = match query.as_of.as_deref().map(dto::parse_date) {
        Some(Ok(d)) => d,
        Some(Err(resp)) => return resp,
        None => Utc::now().date_naive(),
    };

    match services
        .reporting
        .trial_balance(as_of, query.fiscal_year, query.fiscal_period)
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct GeneralLedgerQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default)]
    pub include_opening: bool,
}

pub async fn general_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Path(account_id): Path<String>,
    Query(query): Query<GeneralLedgerQuery>,
) -> axum::response::Response {
    let account_id = match dto::parse_account_id(&account_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let from = match query.from.as_deref().map(dto::parse_date) {
        Some(Ok(d)) => Some(d),
        Some(Err(resp)) => return resp,
        None => None,
    };
    let to = match query.to.as_deref().map(dto::parse_date) {
        Some(Ok(d)) => Some(d),
        Some(Err(resp)) => return resp,
        None => None,
    };

    match services
        .reporting
        .general_ledger(account_id, from, to, query.include_opening)
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use tallybook_core::EntryId;
use tallybook_ledger::{EntryStatus, VoucherType};
use tallybook_infra::{EntryFilter, JournalPatch, NewJournalEntry};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_entry).get(list_entries))
        .route(
            "/:id",
            get(get_entry).patch(update_entry).delete(delete_entry),
        )
        .route("/:id/post", post(post_entry))
        .route("/:id/reverse", post(reverse_entry))
        .route("/:id/cancel", post(cancel_entry))
}

fn parse_entry_id(s: &str) -> Result<EntryId, axum::response::Response> {
    s.parse::<EntryId>().map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
    })
}

pub async fn create_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateJournalEntryRequest>,
) -> axum::response::Response {
    let voucher_type: VoucherType = match body.voucher_type.parse() {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    let date = match dto::parse_date(&body.date) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let lines = match dto::to_journal_lines(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    let spec = NewJournalEntry {
        voucher_type,
        voucher_number: body.voucher_number,
        date,
        lines,
        description: body.description,
        reference: body.reference,
        notes: body.notes,
        created_by: Some(actor.actor_id()),
    };

    match services.journal.create(spec) {
        Ok(entry) => (StatusCode::CREATED, Json(dto::entry_to_json(&entry))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub status: Option<String>,
    pub voucher_type: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListEntriesQuery>,
) -> axum::response::Response {
    let status = match query.status.as_deref() {
        Some("draft") => Some(EntryStatus::Draft),
        Some("posted") => Some(EntryStatus::Posted),
        Some("reversed") => Some(EntryStatus::Reversed),
        Some("cancelled") => Some(EntryStatus::Cancelled),
        Some(other) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("unknown status: {other}"),
            )
        }
        None => None,
    };
    let voucher_type = match query.voucher_type.as_deref().map(str::parse::<VoucherType>) {
        Some(Ok(v)) => Some(v),
        Some(Err(e)) => return errors::ledger_error_to_response(e),
        None => None,
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

    let filter = EntryFilter {
        status,
        voucher_type,
        from,
        to,
    };
    match services.journal.list(&filter) {
        Ok(entries) => {
            let items = entries.iter().map(dto::entry_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_entry_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.journal.get(id) {
        Ok(entry) => (StatusCode::OK, Json(dto::entry_to_json(&entry))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateJournalEntryRequest>,
) -> axum::response::Response {
    let id = match parse_entry_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let date = match body.date.as_deref().map(dto::parse_date) {
        Some(Ok(d)) => Some(d),
        Some(Err(resp)) => return resp,
        None => None,
    };
    let lines = match body.lines.map(dto::to_journal_lines) {
        Some(Ok(lines)) => Some(lines),
        Some(Err(resp)) => return resp,
        None => None,
    };

    let patch = JournalPatch {
        date,
        lines,
        description: body.description,
        reference: body.reference.map(Some),
        notes: body.notes.map(Some),
    };
    match services.journal.update(id, patch) {
        Ok(entry) => (StatusCode::OK, Json(dto::entry_to_json(&entry))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_entry_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.journal.delete(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn post_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_entry_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.journal.post(id, actor.actor_id()) {
        Ok(entry) => (StatusCode::OK, Json(dto::entry_to_json(&entry))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn reverse_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReasonRequest>,
) -> axum::response::Response {
    let id = match parse_entry_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.journal.reverse(id, actor.actor_id(), &body.reason) {
        Ok((original, mirror)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "original": dto::entry_to_json(&original),
                "reversal": dto::entry_to_json(&mirror),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn cancel_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReasonRequest>,
) -> axum::response::Response {
    let id = match parse_entry_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.journal.cancel(id, actor.actor_id(), &body.reason) {
        Ok(entry) => (StatusCode::OK, Json(dto::entry_to_json(&entry))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

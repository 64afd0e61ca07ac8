use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use tallybook_ledger::{AccountPatch, AccountType, NewAccount, SubledgerEntity};
use tallybook_infra::AccountFilter;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_account).get(list_accounts))
        .route("/subledger", post(link_subledger))
        .route(
            "/:id",
            get(get_account).patch(update_account).delete(delete_account),
        )
        .route("/:id/children", get(get_children))
        .route("/:id/hierarchy", get(get_hierarchy))
        .route("/:id/balance", get(get_balance))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateAccountRequest>,
) -> axum::response::Response {
    let account_type: AccountType = match body.account_type.parse() {
        Ok(t) => t,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    let parent = match body.parent.as_deref().map(dto::parse_account_id) {
        Some(Ok(id)) => Some(id),
        Some(Err(resp)) => return resp,
        None => None,
    };

    let spec = NewAccount {
        code: body.code,
        name: body.name,
        account_type,
        category: body.category,
        sub_category: body.sub_category,
        parent,
        allow_posting: body.allow_posting.unwrap_or(true),
        is_system: false,
        subledger: None,
        created_by: Some(actor.actor_id()),
    };

    match services.registry.create(spec) {
        Ok(account) => {
            (StatusCode::CREATED, Json(dto::account_to_json(&account))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListAccountsQuery {
    pub account_type: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListAccountsQuery>,
) -> axum::response::Response {
    let account_type = match query.account_type.as_deref().map(str::parse::<AccountType>) {
        Some(Ok(t)) => Some(t),
        Some(Err(e)) => return errors::ledger_error_to_response(e),
        None => None,
    };
    let filter = AccountFilter {
        account_type,
        active_only: query.active_only,
    };

    match services.registry.list(&filter) {
        Ok(accounts) => {
            let items = accounts.iter().map(dto::account_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.registry.get(id) {
        Ok(account) => (StatusCode::OK, Json(dto::account_to_json(&account))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateAccountRequest>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let parent = if body.clear_parent {
        Some(None)
    } else {
        match body.parent.as_deref().map(dto::parse_account_id) {
            Some(Ok(parent_id)) => Some(Some(parent_id)),
            Some(Err(resp)) => return resp,
            None => None,
        }
    };

    let patch = AccountPatch {
        name: body.name,
        category: body.category,
        sub_category: body.sub_category.map(Some),
        allow_posting: body.allow_posting,
        is_active: body.is_active,
        parent,
        account_type: None,
    };

    match services.registry.update(id, patch) {
        Ok(account) => (StatusCode::OK, Json(dto::account_to_json(&account))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.registry.delete(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_children(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.registry.children(id) {
        Ok(children) => {
            let items = children.iter().map(dto::account_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_hierarchy(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.registry.hierarchy(id) {
        Ok(tree) => (StatusCode::OK, Json(dto::account_node_to_json(&tree))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_account_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.registry.get(id) {
        Ok(account) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "account_id": account.id.to_string(),
                "code": account.code,
                "normal_balance": account.normal_balance,
                "balance": account.current_balance,
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn link_subledger(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SubledgerRequest>,
) -> axum::response::Response {
    let entity: SubledgerEntity = match body.entity.parse() {
        Ok(e) => e,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    match services
        .registry
        .link_or_create_subledger(entity, &body.entity_code, &body.name)
    {
        Ok(account) => (StatusCode::OK, Json(dto::account_to_json(&account))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

use axum::Router;

pub mod accounts;
pub mod journal;
pub mod reports;
pub mod system;

/// Router for all actor-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/accounts", accounts::router())
        .nest("/journal", journal::router())
        .nest("/reports", reports::router())
}

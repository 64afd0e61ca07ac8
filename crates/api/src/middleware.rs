use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use tallybook_core::UserId;

use crate::context::ActorContext;

/// Header carrying the authenticated actor id, set by the outer auth layer.
pub const ACTOR_HEADER: &str = "x-actor-id";

pub async fn actor_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let actor_id = extract_actor(req.headers())?;
    req.extensions_mut().insert(ActorContext::new(actor_id));
    Ok(next.run(req).await)
}

fn extract_actor(headers: &HeaderMap) -> Result<UserId, StatusCode> {
    let header = headers
        .get(ACTOR_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    header
        .trim()
        .parse::<UserId>()
        .map_err(|_| StatusCode::UNAUTHORIZED)
}

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::AppState;
use super::handlers::ApiError;
use crate::core::db::types::User;

/// The authenticated user, inserted into request extensions by `require_auth`.
#[derive(Clone)]
pub struct CurrentUser(pub User);

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let raw_token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string());

    let Some(raw_token) = raw_token else {
        return ApiError::unauthorized(
            "Missing or invalid Authorization header. Use: Bearer <token>",
        )
        .into_response();
    };

    match state.db.validate_session_token(&raw_token).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Ok(None) => ApiError::unauthorized("Could not validate credentials").into_response(),
        Err(e) => {
            warn!("Token validation failed: {}", e);
            ApiError::unauthorized("Could not validate credentials").into_response()
        }
    }
}

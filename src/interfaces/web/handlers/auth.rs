use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiError;
use crate::interfaces::web::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

pub async fn login_for_access_token(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(user) = state
        .db
        .authenticate_user(&payload.username, &payload.password)
        .await?
    else {
        return Err(ApiError::unauthorized("Incorrect username or password"));
    };

    let access_token = state
        .db
        .create_session_token(user.id, state.token_ttl_minutes)
        .await?;
    info!("Issued access token for user '{}'", user.username);
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

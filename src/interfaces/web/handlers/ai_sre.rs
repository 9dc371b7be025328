use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use tracing::info;

use super::ApiError;
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::CurrentUser;

#[derive(Deserialize)]
pub struct ChatCompletionRequest {
    pub query: String,
}

pub async fn gen_knowledgebase(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = state.assistant.gen_knowledgebase().await?;
    Ok(Json(serde_json::json!({
        "status": report.status(),
        "error": report.error(),
    })))
}

pub async fn chat_completion(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<ChatCompletionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(ApiError::new(
            axum::http::StatusCode::BAD_REQUEST,
            "query must not be empty",
        ));
    }
    info!("Chat completion requested by user {}", user.id);
    let completion = state
        .assistant
        .gen_ai_completion(user.id, &payload.query)
        .await?;
    Ok(Json(serde_json::json!({ "chat_completion": completion })))
}

pub async fn chat_history(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let chats = state.assistant.get_chat_history(user.id).await?;
    Ok(Json(serde_json::json!({ "chat_history": chats })))
}

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use super::ApiError;
use crate::core::db::types::{Roles, User};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::CurrentUser;

#[derive(Deserialize)]
pub struct UserForm {
    pub username: String,
    pub password: String,
    pub role: Roles,
}

pub async fn all_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.db.find_all_users().await?))
}

pub async fn user_by_id(
    Path(user_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    state
        .db
        .find_user_by_id(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", user_id)))
}

pub async fn user_by_name(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    state
        .db
        .find_user_by_name(&username)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("User '{}' not found", username)))
}

pub async fn add_user(
    State(state): State<AppState>,
    Extension(CurrentUser(current)): Extension<CurrentUser>,
    Json(form): Json<UserForm>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if current.role != Roles::Admin {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "Only admins can create users",
        ));
    }
    let username = form.username.trim();
    if username.is_empty() || form.password.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Username and password are required",
        ));
    }
    if state.db.find_user_by_name(username).await?.is_some() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("username '{}' already exists", username),
        ));
    }
    let user = state
        .db
        .create_user(username, &form.password, form.role)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

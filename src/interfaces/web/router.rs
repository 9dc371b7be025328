use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::auth;
use super::handlers::{ai_sre, auth as login, status, users};

fn build_cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub(crate) fn build_api_router(state: AppState, cors_origins: &[String]) -> Router {
    let public_routes = Router::new()
        .route("/status", get(status::status))
        .route("/api/auth/token", post(login::login_for_access_token))
        .with_state(state.clone());

    let authed_routes = Router::new()
        .route("/api/users", get(users::all_users))
        .route("/api/users/create", post(users::add_user))
        .route("/api/users/name/{username}", get(users::user_by_name))
        .route("/api/users/{user_id}", get(users::user_by_id))
        .route(
            "/api/ai-sre/gen-knowledgebase",
            post(ai_sre::gen_knowledgebase),
        )
        .route("/api/ai-sre/chat-completion", post(ai_sre::chat_completion))
        .route("/api/ai-sre/chat-history", get(ai_sre::chat_history))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(authed_routes)
        .layer(middleware::from_fn(security_headers))
        .layer(build_cors(cors_origins))
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}

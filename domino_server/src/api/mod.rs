//! HTTP API for the domino tournament server.
//!
//! The server trusts an upstream-authenticated caller identity delivered in
//! the `x-user-id` header; there is no authentication layer here. Engine
//! errors map onto HTTP statuses through the engine's wire-level error
//! taxonomy.
//!
//! # Endpoints
//!
//! ```text
//! GET    /health                                   - Health check
//! POST   /api/templates                            - Create template (admin)
//! DELETE /api/templates/{template_id}              - Delete template (admin)
//! POST   /api/tournaments/{template_id}/entries    - Buy a seat
//! POST   /api/games/{game_id}/refund               - Refund an entry
//! POST   /api/games/{game_id}/ready                - Toggle ready
//! POST   /api/games/{game_id}/play                 - Play a tile
//! POST   /api/games/{game_id}/pass                 - Pass the turn
//! POST   /api/tasks/start-game                     - Scheduler callback
//! POST   /api/tasks/turn-timeout                   - Scheduler callback
//! ```

pub mod admin;
pub mod games;
pub mod tasks;

use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use domino_engine::{DominoEngine, EngineError, ErrorCode};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DominoEngine>,
}

/// Create the API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/templates", post(admin::create_template))
        .route(
            "/api/templates/{template_id}",
            delete(admin::delete_template),
        )
        .route(
            "/api/tournaments/{template_id}/entries",
            post(games::purchase_entry),
        )
        .route("/api/games/{game_id}/refund", post(games::refund_entry))
        .route("/api/games/{game_id}/ready", post(games::toggle_ready))
        .route("/api/games/{game_id}/play", post(games::play_tile))
        .route("/api/games/{game_id}/pass", post(games::pass_turn))
        .route("/api/tasks/start-game", post(tasks::start_game))
        .route("/api/tasks/turn-timeout", post(tasks::turn_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// HTTP-facing error wrapper.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or empty caller identity header.
    Unauthenticated,
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "missing x-user-id header".to_string(),
            ),
            Self::Engine(err) => {
                let status = match err.code() {
                    ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
                    ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
                    ErrorCode::NotFound => StatusCode::NOT_FOUND,
                    ErrorCode::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
                    ErrorCode::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
                    ErrorCode::AlreadyExists => StatusCode::CONFLICT,
                    ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
                    ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!("internal error: {err}");
                }
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// The upstream-authenticated caller identity.
pub(crate) fn caller(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthenticated)
}

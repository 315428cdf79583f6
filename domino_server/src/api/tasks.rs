//! Scheduler callback handlers.
//!
//! These endpoints are the entry point for an external task queue. Game
//! state mismatches are already handled as no-ops inside the engine, so a
//! non-200 here only ever signals a transport-level failure worth retrying.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use tracing::error;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct StartGameTask {
    pub game_id: String,
}

#[derive(Debug, Deserialize)]
pub struct TurnTimeoutTask {
    pub game_id: String,
    pub expected_player_id: String,
}

/// `POST /api/tasks/start-game`
pub async fn start_game(
    State(state): State<AppState>,
    Json(task): Json<StartGameTask>,
) -> StatusCode {
    match state.engine.start_game_callback(&task.game_id).await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            error!("start-game task for {} failed: {err}", task.game_id);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `POST /api/tasks/turn-timeout`
pub async fn turn_timeout(
    State(state): State<AppState>,
    Json(task): Json<TurnTimeoutTask>,
) -> StatusCode {
    match state
        .engine
        .turn_timeout_callback(&task.game_id, &task.expected_player_id)
        .await
    {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            error!("turn-timeout task for {} failed: {err}", task.game_id);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

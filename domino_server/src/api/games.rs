//! Player-facing game handlers: entries, refunds, ready, play, pass.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use domino_engine::engine::{ActionReceipt, EntryReceipt, ReadyReceipt, RefundReceipt};
use domino_engine::{Move, Team, Tile, TilePosition};
use serde::Deserialize;

use super::{ApiError, AppState, caller};

#[derive(Debug, Default, Deserialize)]
pub struct EntryRequest {
    /// Required for partnership tournaments, absent for individual ones.
    #[serde(default)]
    pub team: Option<Team>,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub tile: Tile,
    pub position: TilePosition,
}

/// `POST /api/tournaments/{template_id}/entries`
pub async fn purchase_entry(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<EntryRequest>,
) -> Result<Json<EntryReceipt>, ApiError> {
    let user_id = caller(&headers)?;
    let receipt = state
        .engine
        .purchase_entry(&template_id, &user_id, body.team)
        .await?;
    Ok(Json(receipt))
}

/// `POST /api/games/{game_id}/refund`
pub async fn refund_entry(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RefundReceipt>, ApiError> {
    let user_id = caller(&headers)?;
    let receipt = state.engine.refund_entry(&game_id, &user_id).await?;
    Ok(Json(receipt))
}

/// `POST /api/games/{game_id}/ready`
pub async fn toggle_ready(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ReadyReceipt>, ApiError> {
    let user_id = caller(&headers)?;
    let receipt = state.engine.toggle_ready(&game_id, &user_id).await?;
    Ok(Json(receipt))
}

/// `POST /api/games/{game_id}/play`
pub async fn play_tile(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PlayRequest>,
) -> Result<Json<ActionReceipt>, ApiError> {
    let user_id = caller(&headers)?;
    let mv = Move {
        tile: body.tile,
        position: body.position,
    };
    let receipt = state.engine.play_tile(&game_id, &user_id, mv).await?;
    Ok(Json(receipt))
}

/// `POST /api/games/{game_id}/pass`
pub async fn pass_turn(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ActionReceipt>, ApiError> {
    let user_id = caller(&headers)?;
    let receipt = state.engine.pass_turn(&game_id, &user_id).await?;
    Ok(Json(receipt))
}

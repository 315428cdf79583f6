//! Administrative template handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use domino_engine::TournamentTemplate;
use domino_engine::engine::{NewTemplate, TemplateDeletion};

use super::{ApiError, AppState, caller};

/// `POST /api/templates`
pub async fn create_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewTemplate>,
) -> Result<Json<TournamentTemplate>, ApiError> {
    let admin_id = caller(&headers)?;
    let template = state
        .engine
        .create_tournament_template(&admin_id, body)
        .await?;
    Ok(Json(template))
}

/// `DELETE /api/templates/{template_id}`
pub async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TemplateDeletion>, ApiError> {
    let admin_id = caller(&headers)?;
    let deletion = state
        .engine
        .delete_tournament_template(&admin_id, &template_id)
        .await?;
    Ok(Json(deletion))
}

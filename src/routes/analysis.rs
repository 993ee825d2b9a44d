use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::info;

use crate::agents::SuggestionAgent;
use crate::models::{AppState, ChartSuggestion, SuggestionRequest};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/analysis/suggestions", post(create_suggestions))
        .with_state(state)
}

async fn create_suggestions(
    State(state): State<AppState>,
    payload: Result<Json<SuggestionRequest>, JsonRejection>,
) -> AppResult<Json<Vec<ChartSuggestion>>> {
    let Json(request) = payload?;
    info!(dataset_id = %request.dataset_id, "Suggestion request received");

    let suggestions = SuggestionAgent::generate_suggestions(
        &state.store,
        &state.model_client,
        &state.config.profiling,
        &request.dataset_id,
    )
    .await?;

    Ok(Json(suggestions))
}

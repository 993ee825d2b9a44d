use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::info;

use crate::analysis::generate_chart_data;
use crate::models::{AppState, ChartDataRequest, ChartDataResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/charts/data", post(chart_data))
        .with_state(state)
}

async fn chart_data(
    State(state): State<AppState>,
    payload: Result<Json<ChartDataRequest>, JsonRejection>,
) -> AppResult<Json<ChartDataResponse>> {
    let Json(request) = payload?;
    // Allow-list checks happen here, before the dataset is touched.
    let (dataset_id, params) = request.into_parameters()?;
    info!(
        dataset_id = %dataset_id,
        chart_type = %params.chart_type,
        aggregation = %params.aggregation,
        "Chart data request received"
    );

    let response = generate_chart_data(&state.store, &dataset_id, params).await?;
    Ok(Json(response))
}

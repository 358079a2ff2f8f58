use crate::error::AppResult;
use crate::AppState;
use axum::{extract::State, Json};
use storage_toolkit_core::model::StatisticsData;

pub async fn get_statistics(State(state): State<AppState>) -> AppResult<Json<StatisticsData>> {
    let aggregator = state.statistics.clone();
    let data = tokio::task::spawn_blocking(move || aggregator.compute_statistics()).await??;
    Ok(Json(data))
}

use crate::error::{AppError, AppResult};
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use storage_toolkit_core::model::{
    DuplicateFilter, DuplicateGroup, DuplicateStats, GroupSort, ListResult,
};
use tracing::info;

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDuplicatesQuery {
    page: Option<usize>,
    size: Option<usize>,
    media_type: Option<String>,
    sort: Option<GroupSort>,
}

pub async fn get_stats(State(state): State<AppState>) -> Json<DuplicateStats> {
    Json(state.engine.stats())
}

pub async fn start_scan(State(state): State<AppState>) -> AppResult<Json<DuplicateStats>> {
    info!("Duplicate scan requested");
    Ok(Json(state.engine.start_scan()?))
}

pub async fn cancel_scan(State(state): State<AppState>) -> Json<DuplicateStats> {
    Json(state.engine.cancel_scan())
}

pub async fn list_duplicates(
    State(state): State<AppState>,
    query: Result<Query<ListDuplicatesQuery>, QueryRejection>,
) -> AppResult<Json<ListResult<DuplicateGroup>>> {
    let Query(query) = query?;
    let filter = DuplicateFilter {
        media_type: query.media_type.filter(|m| !m.is_empty()),
        sort: query.sort.unwrap_or_default(),
    };
    let page = query.page.unwrap_or(1);
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
    Ok(Json(state.engine.list_duplicates(page, size, Some(&filter))?))
}

pub async fn delete_duplicate(
    State(state): State<AppState>,
    Path(attachment_name): Path<String>,
) -> AppResult<StatusCode> {
    if attachment_name.trim().is_empty() {
        return Err(AppError::bad_request("attachment name is required"));
    }
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || engine.delete_duplicate(&attachment_name)).await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_duplicates(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.engine.clear_results()?;
    Ok(StatusCode::NO_CONTENT)
}

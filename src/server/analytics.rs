use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::analytics::AnalyticsReport;

const DEFAULT_TOP: usize = 10;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub top: Option<usize>,
}

pub async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AnalyticsReport>, ApiError> {
    let analytics = state
        .analytics
        .clone()
        .ok_or_else(|| ApiError::NotFound("analytics are not enabled on this server".to_string()))?;
    let top_n = query.top.unwrap_or(DEFAULT_TOP);

    let report = tokio::task::spawn_blocking(move || analytics.report(top_n))
        .await
        .map_err(|err| ApiError::Internal(format!("stats task failed: {err}")))??;

    Ok(Json(report))
}

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::domain::DashboardReport;
use crate::error::AppError;
use crate::validation::parse_range;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub range: Option<String>,
}

/// `GET /api/transactions/dashboard?range=N`
///
/// Pulls every upstream source, upserts what came back and answers with the
/// full stored set plus totals. `range` is checked but does not narrow the
/// report.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardReport>, AppError> {
    let range = parse_range(query.range.as_deref())?;
    tracing::info!(range = range.0, "Building dashboard report");

    let report = state.aggregator.build_report(range).await?;
    Ok(Json(report))
}

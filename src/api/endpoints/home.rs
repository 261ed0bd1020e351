//! Home dashboard endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::reception::{self, DashboardSummary};

#[derive(Serialize)]
pub struct HomeResponse {
    pub app_name: &'static str,
    #[serde(flatten)]
    pub summary: DashboardSummary,
}

/// `GET /api/home` — headline counts for the reception desk.
pub async fn dashboard(State(ctx): State<ApiContext>) -> Result<Json<HomeResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let summary = reception::dashboard_summary(&conn)?;
    Ok(Json(HomeResponse {
        app_name: crate::config::APP_NAME,
        summary,
    }))
}

//! Visit endpoints.
//!
//! - `GET /api/visits?date_time=&include_past=` — upcoming visits
//! - `POST /api/visits` — book
//! - `GET|PUT|DELETE /api/visits/:id` — detail, reschedule, soft delete

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db::repository::Repository;
use crate::models::{Visit, VisitFilter, VisitInput, VisitSummary};
use crate::reception;

/// `GET /api/visits`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<VisitFilter>, QueryRejection>,
) -> Result<Json<Vec<VisitSummary>>, ApiError> {
    let Query(filter) = query?;
    let conn = ctx.core.open_db()?;
    Ok(Json(reception::search_visits(&conn, &filter)?))
}

/// `POST /api/visits`
pub async fn book(
    State(ctx): State<ApiContext>,
    payload: Result<Json<VisitInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Visit>), ApiError> {
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    let visit = reception::book_visit(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(visit)))
}

/// `GET /api/visits/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<VisitSummary>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(reception::get_visit(&conn, &id)?))
}

/// `PUT /api/visits/:id`
pub async fn reschedule(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    payload: Result<Json<VisitInput>, JsonRejection>,
) -> Result<Json<Visit>, ApiError> {
    let id = parse_id(&id)?;
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok(Json(reception::reschedule_visit(&conn, &id, &input)?))
}

/// `DELETE /api/visits/:id` — soft delete.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let repo = Repository::<Visit>::new(&conn);
    let mut visit = repo.require(&id)?;
    repo.soft_delete(&mut visit)?;
    Ok(StatusCode::NO_CONTENT)
}

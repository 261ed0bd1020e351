//! Specialization endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db::repository::Repository;
use crate::models::{Specialization, SpecializationInput};
use crate::specializations;

/// `GET /api/specializations`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Specialization>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(specializations::list_specializations(&conn)?))
}

/// `POST /api/specializations`
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SpecializationInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Specialization>), ApiError> {
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    let spec = specializations::create_specialization(&conn, input)?;
    Ok((StatusCode::CREATED, Json(spec)))
}

/// `PUT /api/specializations/:id`
pub async fn rename(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    payload: Result<Json<SpecializationInput>, JsonRejection>,
) -> Result<Json<Specialization>, ApiError> {
    let id = parse_id(&id)?;
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok(Json(specializations::rename_specialization(&conn, &id, input)?))
}

/// `DELETE /api/specializations/:id` — soft delete.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let repo = Repository::<Specialization>::new(&conn);
    let mut spec = repo.require(&id)?;
    repo.soft_delete(&mut spec)?;
    Ok(StatusCode::NO_CONTENT)
}

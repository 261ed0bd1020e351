//! Patient endpoints.
//!
//! - `GET /api/patients?last_name=` — active patients
//! - `POST /api/patients` — register
//! - `GET|PUT|DELETE /api/patients/:id` — detail, edit, soft delete

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db::repository::Repository;
use crate::models::{Patient, PatientFilter, PatientInput};
use crate::patients;

/// `GET /api/patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<PatientFilter>, QueryRejection>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let Query(filter) = query?;
    let conn = ctx.core.open_db()?;
    Ok(Json(patients::search_patients(&conn, &filter)?))
}

/// `POST /api/patients`
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    let patient = patients::create_patient(&conn, input)?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(patients::get_patient(&conn, &id)?))
}

/// `PUT /api/patients/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id)?;
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok(Json(patients::update_patient(&conn, &id, input)?))
}

/// `DELETE /api/patients/:id` — soft delete of an active patient.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let repo = Repository::<Patient>::new(&conn);
    let mut patient = repo.require(&id)?;
    repo.soft_delete(&mut patient)?;
    Ok(StatusCode::NO_CONTENT)
}

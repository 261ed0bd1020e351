//! Doctor endpoints.
//!
//! Doctors are listed with their active specializations resolved to
//! names. The password hash never leaves the server.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::Connection;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db::repository::Repository;
use crate::doctors;
use crate::models::{Doctor, DoctorFilter, DoctorRegistration, DoctorUpdate, Specialization};

#[derive(Serialize)]
pub struct DoctorView {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub specializations: Vec<String>,
}

fn view(conn: &Connection, doctor: Doctor) -> Result<DoctorView, ApiError> {
    let repo = Repository::<Specialization>::new(conn);
    let mut specializations = Vec::with_capacity(doctor.profile.specialization_ids.len());
    for id in &doctor.profile.specialization_ids {
        if let Some(spec) = repo.get(id)? {
            specializations.push(spec.name);
        }
    }
    Ok(DoctorView {
        doctor,
        specializations,
    })
}

/// `GET /api/doctors`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<DoctorFilter>, QueryRejection>,
) -> Result<Json<Vec<DoctorView>>, ApiError> {
    let Query(filter) = query?;
    let conn = ctx.core.open_db()?;
    let views = doctors::search_doctors(&conn, &filter)?
        .into_iter()
        .map(|doctor| view(&conn, doctor))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(views))
}

/// `POST /api/doctors`
pub async fn register(
    State(ctx): State<ApiContext>,
    payload: Result<Json<DoctorRegistration>, JsonRejection>,
) -> Result<(StatusCode, Json<DoctorView>), ApiError> {
    let Json(registration) = payload?;
    let conn = ctx.core.open_db()?;
    let doctor = doctors::register_doctor(&conn, registration)?;
    Ok((StatusCode::CREATED, Json(view(&conn, doctor)?)))
}

/// `GET /api/doctors/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<DoctorView>, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let doctor = doctors::get_doctor(&conn, &id)?;
    Ok(Json(view(&conn, doctor)?))
}

/// `PUT /api/doctors/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    payload: Result<Json<DoctorUpdate>, JsonRejection>,
) -> Result<Json<DoctorView>, ApiError> {
    let id = parse_id(&id)?;
    let Json(update) = payload?;
    let conn = ctx.core.open_db()?;
    let doctor = doctors::update_doctor(&conn, &id, update)?;
    Ok(Json(view(&conn, doctor)?))
}

/// `DELETE /api/doctors/:id` — soft delete.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let repo = Repository::<Doctor>::new(&conn);
    let mut doctor = repo.require(&id)?;
    repo.soft_delete(&mut doctor)?;
    Ok(StatusCode::NO_CONTENT)
}

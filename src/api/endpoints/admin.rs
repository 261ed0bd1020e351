//! Administrative endpoints over every record kind.
//!
//! These are the only read paths that see soft-deleted rows, and the only
//! write paths that restore or permanently remove them.
//!
//! - `GET /api/admin/:kind` — every row, deleted ones included
//! - `GET /api/admin/:kind/:id/history` — lifecycle events
//! - `POST /api/admin/:kind/:id/restore`
//! - `DELETE /api/admin/:kind/:id` — hard delete

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::db::repository::{lifecycle_history, Repository, Table};
use crate::reception;
use crate::models::{Doctor, EntityKind, LifecycleEvent, Patient, Specialization, Visit};

fn parse_kind(segment: &str) -> Result<EntityKind, ApiError> {
    EntityKind::from_plural(segment)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown record kind: {segment}")))
}

fn list_all<T: Table + Serialize>(conn: &Connection) -> Result<serde_json::Value, ApiError> {
    let rows = Repository::<T>::new(conn).list_all()?;
    serde_json::to_value(rows).map_err(|e| ApiError::Internal(e.to_string()))
}

fn restore<T: Table>(conn: &Connection, id: &Uuid) -> Result<(), ApiError> {
    reception::restore_record::<T>(conn, id)?;
    Ok(())
}

fn hard_delete<T: Table>(conn: &Connection, id: &Uuid) -> Result<(), ApiError> {
    Ok(Repository::<T>::new(conn).hard_delete(id)?)
}

/// `GET /api/admin/:kind`
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(kind): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let conn = ctx.core.open_db()?;
    let rows = match kind {
        EntityKind::Patient => list_all::<Patient>(&conn)?,
        EntityKind::Doctor => list_all::<Doctor>(&conn)?,
        EntityKind::Specialization => list_all::<Specialization>(&conn)?,
        EntityKind::Visit => list_all::<Visit>(&conn)?,
    };
    Ok(Json(rows))
}

/// `GET /api/admin/:kind/:id/history`
pub async fn history(
    State(ctx): State<ApiContext>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Vec<LifecycleEvent>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(lifecycle_history(&conn, kind, &id)?))
}

/// `POST /api/admin/:kind/:id/restore`
pub async fn restore_record(
    State(ctx): State<ApiContext>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    match kind {
        EntityKind::Patient => restore::<Patient>(&conn, &id)?,
        EntityKind::Doctor => restore::<Doctor>(&conn, &id)?,
        EntityKind::Specialization => restore::<Specialization>(&conn, &id)?,
        EntityKind::Visit => restore::<Visit>(&conn, &id)?,
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/admin/:kind/:id`
pub async fn purge_record(
    State(ctx): State<ApiContext>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    let id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    match kind {
        EntityKind::Patient => hard_delete::<Patient>(&conn, &id)?,
        EntityKind::Doctor => hard_delete::<Doctor>(&conn, &id)?,
        EntityKind::Specialization => hard_delete::<Specialization>(&conn, &id)?,
        EntityKind::Visit => hard_delete::<Visit>(&conn, &id)?,
    }
    Ok(StatusCode::NO_CONTENT)
}

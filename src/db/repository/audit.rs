use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::{format_timestamp, timestamp_column, uuid_column, DatabaseError};
use crate::models::{AuditAction, EntityKind, LifecycleEvent};

/// Append one lifecycle event to the audit_log table.
pub fn record_lifecycle_event(
    conn: &Connection,
    entity_type: EntityKind,
    entity_id: &Uuid,
    action: AuditAction,
    at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (timestamp, entity_type, entity_id, action) VALUES (?1, ?2, ?3, ?4)",
        params![
            format_timestamp(at),
            entity_type.as_str(),
            entity_id.to_string(),
            action.as_str(),
        ],
    )?;
    Ok(())
}

/// Lifecycle history of one record, oldest first. Survives hard deletion.
pub fn lifecycle_history(
    conn: &Connection,
    entity_type: EntityKind,
    entity_id: &Uuid,
) -> Result<Vec<LifecycleEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, entity_type, entity_id, action FROM audit_log
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![entity_type.as_str(), entity_id.to_string()], |row| {
            Ok((
                timestamp_column(row, 0)?,
                row.get::<_, String>(1)?,
                uuid_column(row, 2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(timestamp, kind, entity_id, action)| {
            Ok(LifecycleEvent {
                timestamp,
                entity_type: EntityKind::from_str(&kind)?,
                entity_id,
                action: AuditAction::from_str(&action)?,
            })
        })
        .collect()
}

//! Repository layer — soft-delete aware persistence shared by every entity.
//!
//! `Repository<T>` is the only code path that writes `deleted_at`. Entity
//! sub-modules supply the SQL mapping (`Table`) plus their own search queries,
//! and are re-exported here.

mod audit;
mod doctor;
mod patient;
mod specialization;
mod visit;

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Params, Row};
use uuid::Uuid;

use super::{format_timestamp, storage_now, DatabaseError};
use crate::models::{AuditAction, EntityKind};

pub use audit::*;
pub use doctor::*;
pub use patient::*;
pub use specialization::*;
pub use visit::*;

/// A record that is hidden, not erased, when deleted.
pub trait SoftDeletable {
    fn id(&self) -> Uuid;
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);

    fn is_active(&self) -> bool {
        self.deleted_at().is_none()
    }
}

/// Which rows a read may see. Everything user-facing reads `Active`;
/// `All` exists for administrative views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retrieval {
    #[default]
    Active,
    All,
}

impl Retrieval {
    fn clause(self) -> &'static str {
        match self {
            Retrieval::Active => "t.deleted_at IS NULL",
            Retrieval::All => "1 = 1",
        }
    }
}

/// SQL mapping for one soft-deletable entity.
pub trait Table: SoftDeletable + Sized {
    const KIND: EntityKind;
    const TABLE: &'static str;
    /// `SELECT ... FROM ...` with the entity table aliased as `t`.
    /// Column order must match `from_row`.
    const SELECT: &'static str;
    const ORDER_BY: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Load data that lives outside the entity's own row.
    fn hydrate(&mut self, _conn: &Connection) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn insert_row(&self, conn: &Connection) -> Result<(), DatabaseError>;

    /// Persist editable fields. Never touches `deleted_at`.
    /// Returns the number of entity rows changed.
    fn update_row(&self, conn: &Connection) -> Result<usize, DatabaseError>;

    /// Physically remove the row. Dependent visit references are nulled
    /// by the schema (`ON DELETE SET NULL`).
    fn purge(conn: &Connection, id: &Uuid) -> Result<usize, DatabaseError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", Self::TABLE);
        Ok(conn.execute(&sql, params![id.to_string()])?)
    }
}

/// Run a filtered select for `T` and hydrate the results.
pub(crate) fn select_where<T: Table, P: Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> Result<Vec<T>, DatabaseError> {
    let sql = format!("{} WHERE {} ORDER BY {}", T::SELECT, clause, T::ORDER_BY);
    let mut stmt = conn.prepare(&sql)?;
    let mut entities = stmt
        .query_map(params, T::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for entity in &mut entities {
        entity.hydrate(conn)?;
    }
    Ok(entities)
}

/// Run `f` inside a savepoint, so a multi-statement write is all-or-nothing
/// whether or not the caller already holds a transaction.
pub(crate) fn atomically<R>(
    conn: &Connection,
    f: impl FnOnce() -> Result<R, DatabaseError>,
) -> Result<R, DatabaseError> {
    conn.execute_batch("SAVEPOINT clinic_write")?;
    match f() {
        Ok(value) => {
            conn.execute_batch("RELEASE clinic_write")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) =
                conn.execute_batch("ROLLBACK TO clinic_write; RELEASE clinic_write")
            {
                tracing::warn!("Savepoint rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}

/// Generic soft-delete store for one entity type.
pub struct Repository<'c, T> {
    conn: &'c Connection,
    entity: PhantomData<T>,
}

impl<'c, T: Table> Repository<'c, T> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            entity: PhantomData,
        }
    }

    fn not_found(id: &Uuid) -> DatabaseError {
        DatabaseError::not_found(T::KIND.label(), id)
    }

    pub fn insert(&self, entity: &T) -> Result<Uuid, DatabaseError> {
        atomically(self.conn, || entity.insert_row(self.conn))?;
        Ok(entity.id())
    }

    pub fn update(&self, entity: &T) -> Result<(), DatabaseError> {
        let changed = atomically(self.conn, || entity.update_row(self.conn))?;
        if changed == 0 {
            return Err(Self::not_found(&entity.id()));
        }
        Ok(())
    }

    /// Active record by id.
    pub fn get(&self, id: &Uuid) -> Result<Option<T>, DatabaseError> {
        self.get_with(id, Retrieval::Active)
    }

    pub fn get_with(&self, id: &Uuid, retrieval: Retrieval) -> Result<Option<T>, DatabaseError> {
        let clause = format!("t.id = ?1 AND {}", retrieval.clause());
        let found = select_where::<T, _>(self.conn, &clause, params![id.to_string()])?;
        Ok(found.into_iter().next())
    }

    /// Active record by id, or `NotFound`.
    pub fn require(&self, id: &Uuid) -> Result<T, DatabaseError> {
        self.get(id)?.ok_or_else(|| Self::not_found(id))
    }

    pub fn list(&self, retrieval: Retrieval) -> Result<Vec<T>, DatabaseError> {
        select_where::<T, _>(self.conn, retrieval.clause(), params![])
    }

    pub fn list_active(&self) -> Result<Vec<T>, DatabaseError> {
        self.list(Retrieval::Active)
    }

    pub fn list_all(&self) -> Result<Vec<T>, DatabaseError> {
        self.list(Retrieval::All)
    }

    pub fn count_active(&self) -> Result<i64, DatabaseError> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE deleted_at IS NULL", T::TABLE);
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    pub fn exists_active(&self, id: &Uuid) -> Result<bool, DatabaseError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1 AND deleted_at IS NULL)",
            T::TABLE
        );
        Ok(self
            .conn
            .query_row(&sql, params![id.to_string()], |row| row.get(0))?)
    }

    /// Hide the record. Repeating the call refreshes the timestamp.
    pub fn soft_delete(&self, entity: &mut T) -> Result<(), DatabaseError> {
        let at = self.soft_delete_id(&entity.id())?;
        entity.set_deleted_at(Some(at));
        Ok(())
    }

    pub fn soft_delete_id(&self, id: &Uuid) -> Result<DateTime<Utc>, DatabaseError> {
        let at = storage_now();
        self.write_deleted_at(id, Some(at), AuditAction::SoftDelete, at)?;
        tracing::info!(entity = T::KIND.as_str(), %id, "Record soft-deleted");
        Ok(at)
    }

    /// Make the record active again. Valid in any state.
    pub fn restore(&self, entity: &mut T) -> Result<(), DatabaseError> {
        self.restore_id(&entity.id())?;
        entity.set_deleted_at(None);
        Ok(())
    }

    pub fn restore_id(&self, id: &Uuid) -> Result<(), DatabaseError> {
        self.write_deleted_at(id, None, AuditAction::Restore, storage_now())?;
        tracing::info!(entity = T::KIND.as_str(), %id, "Record restored");
        Ok(())
    }

    /// Remove the row for good. Visits pointing at it keep existing with
    /// the reference nulled.
    pub fn hard_delete(&self, id: &Uuid) -> Result<(), DatabaseError> {
        atomically(self.conn, || {
            if T::purge(self.conn, id)? == 0 {
                return Err(Self::not_found(id));
            }
            record_lifecycle_event(self.conn, T::KIND, id, AuditAction::HardDelete, &storage_now())
        })?;
        tracing::info!(entity = T::KIND.as_str(), %id, "Record hard-deleted");
        Ok(())
    }

    fn write_deleted_at(
        &self,
        id: &Uuid,
        deleted_at: Option<DateTime<Utc>>,
        action: AuditAction,
        logged_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        atomically(self.conn, || {
            let sql = format!("UPDATE {} SET deleted_at = ?1 WHERE id = ?2", T::TABLE);
            let changed = self.conn.execute(
                &sql,
                params![deleted_at.as_ref().map(format_timestamp), id.to_string()],
            )?;
            if changed == 0 {
                return Err(Self::not_found(id));
            }
            record_lifecycle_event(self.conn, T::KIND, id, action, &logged_at)
        })
    }
}

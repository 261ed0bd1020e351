use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{select_where, SoftDeletable, Table};
use crate::db::{format_timestamp, opt_timestamp_column, uuid_column, DatabaseError};
use crate::models::*;

impl SoftDeletable for Specialization {
    fn id(&self) -> Uuid {
        self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

impl Table for Specialization {
    const KIND: EntityKind = EntityKind::Specialization;
    const TABLE: &'static str = "specializations";
    const SELECT: &'static str = "SELECT t.id, t.name, t.deleted_at FROM specializations t";
    const ORDER_BY: &'static str = "t.name";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Specialization {
            id: uuid_column(row, 0)?,
            name: row.get(1)?,
            deleted_at: opt_timestamp_column(row, 2)?,
        })
    }

    fn insert_row(&self, conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO specializations (id, name, deleted_at) VALUES (?1, ?2, ?3)",
            params![
                self.id.to_string(),
                self.name,
                self.deleted_at.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    fn update_row(&self, conn: &Connection) -> Result<usize, DatabaseError> {
        let changed = conn.execute(
            "UPDATE specializations SET name = ?2 WHERE id = ?1",
            params![self.id.to_string(), self.name],
        )?;
        Ok(changed)
    }
}

/// Active specializations practised by a doctor, ordered by name.
pub fn doctor_specialization_ids(
    conn: &Connection,
    doctor_id: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    let specs: Vec<Specialization> = select_where(
        conn,
        "t.deleted_at IS NULL AND t.id IN
             (SELECT specialization_id FROM doctor_specializations WHERE doctor_id = ?1)",
        params![doctor_id.to_string()],
    )?;
    Ok(specs.into_iter().map(|s| s.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::Repository;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn specializations_listed_by_name() {
        let conn = open_memory_database().unwrap();
        let repo = Repository::<Specialization>::new(&conn);
        for name in ["Therapy", "Cardiology", "Surgery"] {
            repo.insert(&Specialization::new(name)).unwrap();
        }
        let names: Vec<String> = repo.list_active().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Cardiology", "Surgery", "Therapy"]);
    }

    #[test]
    fn rename_persists() {
        let conn = open_memory_database().unwrap();
        let repo = Repository::<Specialization>::new(&conn);
        let mut spec = Specialization::new("Surgey");
        repo.insert(&spec).unwrap();

        spec.name = "Surgery".into();
        repo.update(&spec).unwrap();

        assert_eq!(repo.require(&spec.id).unwrap().name, "Surgery");
        assert_eq!(spec.to_string(), "Surgery");
    }

    #[test]
    fn update_of_missing_row_is_not_found() {
        let conn = open_memory_database().unwrap();
        let repo = Repository::<Specialization>::new(&conn);
        let ghost = Specialization::new("Ghost");
        assert!(matches!(repo.update(&ghost), Err(DatabaseError::NotFound { .. })));
    }
}

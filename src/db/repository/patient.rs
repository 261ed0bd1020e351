use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{select_where, Retrieval, SoftDeletable, Table};
use crate::db::{
    date_column, format_date, format_timestamp, opt_timestamp_column, uuid_column, DatabaseError,
};
use crate::models::filters::like_pattern;
use crate::models::*;

impl SoftDeletable for Patient {
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

impl Table for Patient {
    const KIND: EntityKind = EntityKind::Patient;
    const TABLE: &'static str = "patients";
    const SELECT: &'static str =
        "SELECT t.id, t.first_name, t.last_name, t.phone_number, t.date_of_birth, t.deleted_at
         FROM patients t";
    const ORDER_BY: &'static str = "t.last_name, t.first_name";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Patient {
            id: uuid_column(row, 0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            phone_number: row.get(3)?,
            date_of_birth: date_column(row, 4)?,
            deleted_at: opt_timestamp_column(row, 5)?,
        })
    }

    fn insert_row(&self, conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO patients (id, first_name, last_name, phone_number, date_of_birth, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.id.to_string(),
                self.first_name,
                self.last_name,
                self.phone_number,
                format_date(&self.date_of_birth),
                self.deleted_at.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    fn update_row(&self, conn: &Connection) -> Result<usize, DatabaseError> {
        let changed = conn.execute(
            "UPDATE patients SET first_name = ?2, last_name = ?3, phone_number = ?4, date_of_birth = ?5
             WHERE id = ?1",
            params![
                self.id.to_string(),
                self.first_name,
                self.last_name,
                self.phone_number,
                format_date(&self.date_of_birth),
            ],
        )?;
        Ok(changed)
    }
}

/// Active patients, optionally narrowed by a case-insensitive last-name substring.
pub fn search_patients(
    conn: &Connection,
    filter: &PatientFilter,
) -> Result<Vec<Patient>, DatabaseError> {
    match filter.last_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(last_name) => select_where(
            conn,
            "t.deleted_at IS NULL AND t.last_name LIKE ?1 ESCAPE '\\'",
            params![like_pattern(last_name)],
        ),
        None => select_where(conn, "t.deleted_at IS NULL", params![]),
    }
}

/// Any patient (active or not) holding this phone number.
pub fn find_patient_by_phone(
    conn: &Connection,
    phone_number: &str,
    retrieval: Retrieval,
) -> Result<Option<Patient>, DatabaseError> {
    let clause = match retrieval {
        Retrieval::Active => "t.phone_number = ?1 AND t.deleted_at IS NULL",
        Retrieval::All => "t.phone_number = ?1",
    };
    Ok(select_where::<Patient, _>(conn, clause, params![phone_number])?
        .into_iter()
        .next())
}

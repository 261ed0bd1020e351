use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{doctor_specialization_ids, select_where, SoftDeletable, Table};
use crate::db::{
    date_column, format_date, format_timestamp, opt_timestamp_column, timestamp_column,
    uuid_column, DatabaseError,
};
use crate::models::filters::like_pattern;
use crate::models::*;

impl SoftDeletable for Doctor {
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

impl Table for Doctor {
    const KIND: EntityKind = EntityKind::Doctor;
    const TABLE: &'static str = "doctors";
    const SELECT: &'static str =
        "SELECT t.id, t.first_name, t.last_name, t.recertification_date, t.deleted_at,
                a.id, a.username, a.email, a.password_hash, a.is_staff, a.date_joined
         FROM doctors t
         JOIN accounts a ON a.id = t.account_id";
    const ORDER_BY: &'static str = "t.last_name, t.first_name";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Doctor {
            id: uuid_column(row, 0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            profile: DoctorProfile {
                recertification_date: date_column(row, 3)?,
                specialization_ids: Vec::new(),
            },
            deleted_at: opt_timestamp_column(row, 4)?,
            account: Account {
                id: uuid_column(row, 5)?,
                username: row.get(6)?,
                email: row.get(7)?,
                password_hash: row.get(8)?,
                is_staff: row.get(9)?,
                date_joined: timestamp_column(row, 10)?,
            },
        })
    }

    fn hydrate(&mut self, conn: &Connection) -> Result<(), DatabaseError> {
        self.profile.specialization_ids = doctor_specialization_ids(conn, &self.id)?;
        Ok(())
    }

    fn insert_row(&self, conn: &Connection) -> Result<(), DatabaseError> {
        insert_account(conn, &self.account)?;
        conn.execute(
            "INSERT INTO doctors (id, account_id, first_name, last_name, recertification_date, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.id.to_string(),
                self.account.id.to_string(),
                self.first_name,
                self.last_name,
                format_date(&self.profile.recertification_date),
                self.deleted_at.as_ref().map(format_timestamp),
            ],
        )?;
        link_specializations(conn, &self.id, &self.profile.specialization_ids)
    }

    fn update_row(&self, conn: &Connection) -> Result<usize, DatabaseError> {
        let changed = conn.execute(
            "UPDATE doctors SET first_name = ?2, last_name = ?3, recertification_date = ?4
             WHERE id = ?1",
            params![
                self.id.to_string(),
                self.first_name,
                self.last_name,
                format_date(&self.profile.recertification_date),
            ],
        )?;
        if changed == 0 {
            return Ok(0);
        }
        conn.execute(
            "UPDATE accounts SET email = ?2, is_staff = ?3 WHERE id = ?1",
            params![self.account.id.to_string(), self.account.email, self.account.is_staff],
        )?;
        // Links to soft-deleted specializations are invisible to the caller,
        // so only the active ones are replaced.
        conn.execute(
            "DELETE FROM doctor_specializations
             WHERE doctor_id = ?1 AND specialization_id IN
                 (SELECT id FROM specializations WHERE deleted_at IS NULL)",
            params![self.id.to_string()],
        )?;
        link_specializations(conn, &self.id, &self.profile.specialization_ids)?;
        Ok(changed)
    }

    fn purge(conn: &Connection, id: &Uuid) -> Result<usize, DatabaseError> {
        let account_id: Option<String> = conn
            .query_row(
                "SELECT account_id FROM doctors WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(account_id) = account_id else {
            return Ok(0);
        };
        let removed = conn.execute("DELETE FROM doctors WHERE id = ?1", params![id.to_string()])?;
        conn.execute("DELETE FROM accounts WHERE id = ?1", params![account_id])?;
        Ok(removed)
    }
}

fn insert_account(conn: &Connection, account: &Account) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO accounts (id, username, email, password_hash, is_staff, date_joined)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            account.id.to_string(),
            account.username,
            account.email,
            account.password_hash,
            account.is_staff,
            format_timestamp(&account.date_joined),
        ],
    )?;
    Ok(())
}

fn link_specializations(
    conn: &Connection,
    doctor_id: &Uuid,
    specialization_ids: &[Uuid],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO doctor_specializations (doctor_id, specialization_id) VALUES (?1, ?2)",
    )?;
    for spec_id in specialization_ids {
        stmt.execute(params![doctor_id.to_string(), spec_id.to_string()])?;
    }
    Ok(())
}

/// Case-sensitive exact username lookup across all accounts.
pub fn username_taken(conn: &Connection, username: &str) -> Result<bool, DatabaseError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?1)",
        params![username],
        |row| row.get(0),
    )?)
}

/// Active doctors, optionally narrowed by last name. Staff accounts are
/// excluded unless the filter asks for them.
pub fn search_doctors(conn: &Connection, filter: &DoctorFilter) -> Result<Vec<Doctor>, DatabaseError> {
    let staff_clause = if filter.include_staff { "" } else { " AND a.is_staff = 0" };
    match filter.last_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(last_name) => select_where(
            conn,
            &format!("t.deleted_at IS NULL{staff_clause} AND t.last_name LIKE ?1 ESCAPE '\\'"),
            params![like_pattern(last_name)],
        ),
        None => select_where(conn, &format!("t.deleted_at IS NULL{staff_clause}"), params![]),
    }
}

/// Active non-staff doctors.
pub fn count_active_doctors(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM doctors t JOIN accounts a ON a.id = t.account_id
         WHERE t.deleted_at IS NULL AND a.is_staff = 0",
        [],
        |row| row.get(0),
    )?)
}

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{select_where, SoftDeletable, Table};
use crate::db::{
    format_timestamp, opt_timestamp_column, opt_uuid_column, timestamp_column, uuid_column,
    DatabaseError,
};
use crate::models::filters::like_pattern;
use crate::models::*;

/// A visit is visible to listings and conflict checks only while the visit,
/// its patient and its doctor are all active. A reference nulled by a hard
/// delete does not hide the visit.
const ACTIVE_VIEW: &str =
    "t.deleted_at IS NULL AND p.deleted_at IS NULL AND d.deleted_at IS NULL";

const SUMMARY_SELECT: &str =
    "SELECT t.id, t.patient_id, t.doctor_id, t.specialization_id, t.scheduled_at, t.visit_kind,
            t.deleted_at,
            p.last_name || ' ' || p.first_name,
            d.last_name || ' ' || d.first_name,
            s.name
     FROM visits t
     LEFT JOIN patients p ON p.id = t.patient_id
     LEFT JOIN doctors d ON d.id = t.doctor_id
     LEFT JOIN specializations s ON s.id = t.specialization_id";

impl SoftDeletable for Visit {
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

impl Table for Visit {
    const KIND: EntityKind = EntityKind::Visit;
    const TABLE: &'static str = "visits";
    const SELECT: &'static str =
        "SELECT t.id, t.patient_id, t.doctor_id, t.specialization_id, t.scheduled_at,
                t.visit_kind, t.deleted_at
         FROM visits t
         LEFT JOIN patients p ON p.id = t.patient_id
         LEFT JOIN doctors d ON d.id = t.doctor_id";
    const ORDER_BY: &'static str = "t.scheduled_at, t.id";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get(5)?;
        Ok(Visit {
            id: uuid_column(row, 0)?,
            patient_id: opt_uuid_column(row, 1)?,
            doctor_id: opt_uuid_column(row, 2)?,
            specialization_id: opt_uuid_column(row, 3)?,
            scheduled_at: timestamp_column(row, 4)?,
            visit_kind: VisitKind::from_str(&kind).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
            })?,
            deleted_at: opt_timestamp_column(row, 6)?,
        })
    }

    fn insert_row(&self, conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute(
            "INSERT INTO visits (id, patient_id, doctor_id, specialization_id, scheduled_at, visit_kind, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id.to_string(),
                self.patient_id.map(|id| id.to_string()),
                self.doctor_id.map(|id| id.to_string()),
                self.specialization_id.map(|id| id.to_string()),
                format_timestamp(&self.scheduled_at),
                self.visit_kind.as_str(),
                self.deleted_at.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    fn update_row(&self, conn: &Connection) -> Result<usize, DatabaseError> {
        let changed = conn.execute(
            "UPDATE visits SET patient_id = ?2, doctor_id = ?3, specialization_id = ?4,
                    scheduled_at = ?5, visit_kind = ?6
             WHERE id = ?1",
            params![
                self.id.to_string(),
                self.patient_id.map(|id| id.to_string()),
                self.doctor_id.map(|id| id.to_string()),
                self.specialization_id.map(|id| id.to_string()),
                format_timestamp(&self.scheduled_at),
                self.visit_kind.as_str(),
            ],
        )?;
        Ok(changed)
    }
}

/// Active visits already holding `doctor_id` at exactly `scheduled_at`.
/// `exclude` skips the visit being edited.
pub fn find_slot_conflicts(
    conn: &Connection,
    doctor_id: &Uuid,
    scheduled_at: &DateTime<Utc>,
    exclude: Option<&Uuid>,
) -> Result<Vec<Visit>, DatabaseError> {
    let clause = format!("{ACTIVE_VIEW} AND t.doctor_id = ?1 AND t.scheduled_at = ?2 AND t.id != ?3");
    select_where(
        conn,
        &clause,
        params![
            doctor_id.to_string(),
            format_timestamp(scheduled_at),
            exclude.map(|id| id.to_string()).unwrap_or_default(),
        ],
    )
}

/// Active visits that share their doctor and instant with another active
/// visit, limited to those where `column` (`t.id`, `t.patient_id` or
/// `t.doctor_id`) equals `id`. Booking never produces these; restoring a
/// record can.
pub fn find_double_booked_visits(
    conn: &Connection,
    column: &str,
    id: &Uuid,
) -> Result<Vec<Visit>, DatabaseError> {
    let clause = format!(
        "{ACTIVE_VIEW} AND {column} = ?1 AND t.doctor_id IS NOT NULL AND EXISTS (
             SELECT 1 FROM visits o
             LEFT JOIN patients op ON op.id = o.patient_id
             LEFT JOIN doctors od ON od.id = o.doctor_id
             WHERE o.id != t.id
               AND o.doctor_id = t.doctor_id
               AND o.scheduled_at = t.scheduled_at
               AND o.deleted_at IS NULL AND op.deleted_at IS NULL AND od.deleted_at IS NULL)"
    );
    select_where(conn, &clause, params![id.to_string()])
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<VisitSummary> {
    Ok(VisitSummary {
        visit: Visit::from_row(row)?,
        patient_name: row.get(7)?,
        doctor_name: row.get(8)?,
        specialization_name: row.get(9)?,
    })
}

/// Visit listing: active visits of active patients and doctors, upcoming
/// only unless the filter asks for the past too.
pub fn search_visit_summaries(
    conn: &Connection,
    filter: &VisitFilter,
    now: &DateTime<Utc>,
) -> Result<Vec<VisitSummary>, DatabaseError> {
    let mut sql = format!("{SUMMARY_SELECT} WHERE {ACTIVE_VIEW}");
    let mut values: Vec<String> = Vec::new();
    if !filter.include_past {
        values.push(format_timestamp(now));
        sql.push_str(&format!(" AND t.scheduled_at >= ?{}", values.len()));
    }
    if let Some(term) = filter.date_time.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // Stored text uses 'T' between date and time; accept the space form too.
        values.push(like_pattern(&term.replace(' ', "T")));
        sql.push_str(&format!(" AND t.scheduled_at LIKE ?{} ESCAPE '\\'", values.len()));
    }
    sql.push_str(" ORDER BY t.scheduled_at, t.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values.iter()), summary_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Detail view of one visit, hidden once the visit, its patient or its
/// doctor is soft-deleted.
pub fn get_visit_summary(conn: &Connection, id: &Uuid) -> Result<Option<VisitSummary>, DatabaseError> {
    let sql = format!("{SUMMARY_SELECT} WHERE {ACTIVE_VIEW} AND t.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map(params![id.to_string()], summary_from_row)?;
    Ok(rows.next().transpose()?)
}

/// Active visits scheduled at or after `now`.
pub fn count_upcoming_visits(conn: &Connection, now: &DateTime<Utc>) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM visits WHERE deleted_at IS NULL AND scheduled_at >= ?1",
        params![format_timestamp(now)],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::Repository;
    use crate::db::sqlite::open_memory_database;
    use chrono::{NaiveDate, TimeZone};

    struct Fixture {
        conn: Connection,
        patient: Patient,
        doctor: Doctor,
        spec: Specialization,
    }

    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let spec = Specialization::new("Surgery");
        Repository::new(&conn).insert(&spec).unwrap();
        let patient = Patient::new(PatientInput {
            first_name: "Firstname".into(),
            last_name: "Lastname".into(),
            phone_number: "0123456789".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(),
        });
        Repository::new(&conn).insert(&patient).unwrap();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            first_name: "Doc".into(),
            last_name: "Holiday".into(),
            account: Account {
                id: Uuid::new_v4(),
                username: "docusername".into(),
                email: None,
                password_hash: "x".into(),
                is_staff: false,
                date_joined: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
            profile: DoctorProfile {
                recertification_date: NaiveDate::from_ymd_opt(2030, 1, 2).unwrap(),
                specialization_ids: vec![spec.id],
            },
            deleted_at: None,
        };
        Repository::new(&conn).insert(&doctor).unwrap();
        Fixture {
            conn,
            patient,
            doctor,
            spec,
        }
    }

    fn book(f: &Fixture, at: DateTime<Utc>) -> Visit {
        let visit = Visit::new(&VisitInput {
            patient_id: f.patient.id,
            doctor_id: f.doctor.id,
            specialization_id: f.spec.id,
            scheduled_at: at,
            visit_kind: VisitKind::Repeat,
        });
        Repository::new(&f.conn).insert(&visit).unwrap();
        visit
    }

    fn slot() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
    }

    #[test]
    fn conflict_lookup_matches_exact_instant_only() {
        let f = fixture();
        let existing = book(&f, slot());

        let hits = find_slot_conflicts(&f.conn, &f.doctor.id, &slot(), None).unwrap();
        assert_eq!(hits, vec![existing.clone()]);

        let one_second_later = slot() + chrono::Duration::seconds(1);
        assert!(find_slot_conflicts(&f.conn, &f.doctor.id, &one_second_later, None)
            .unwrap()
            .is_empty());
        assert!(find_slot_conflicts(&f.conn, &f.doctor.id, &slot(), Some(&existing.id))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn conflict_lookup_ignores_inactive_rows() {
        let f = fixture();
        let existing = book(&f, slot());
        let visits = Repository::<Visit>::new(&f.conn);
        let patients = Repository::<Patient>::new(&f.conn);

        visits.soft_delete_id(&existing.id).unwrap();
        assert!(find_slot_conflicts(&f.conn, &f.doctor.id, &slot(), None).unwrap().is_empty());
        visits.restore_id(&existing.id).unwrap();

        patients.soft_delete_id(&f.patient.id).unwrap();
        assert!(find_slot_conflicts(&f.conn, &f.doctor.id, &slot(), None).unwrap().is_empty());
        patients.restore_id(&f.patient.id).unwrap();

        assert_eq!(find_slot_conflicts(&f.conn, &f.doctor.id, &slot(), None).unwrap().len(), 1);
    }

    #[test]
    fn listing_hides_past_and_inactive_visits() {
        let f = fixture();
        let past = book(&f, now() - chrono::Duration::days(3));
        let upcoming = book(&f, slot());

        let listed = search_visit_summaries(&f.conn, &VisitFilter::default(), &now()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].visit.id, upcoming.id);
        assert_eq!(listed[0].patient_name.as_deref(), Some("Lastname Firstname"));
        assert_eq!(listed[0].doctor_name.as_deref(), Some("Holiday Doc"));
        assert_eq!(listed[0].specialization_name.as_deref(), Some("Surgery"));

        let with_past = VisitFilter {
            date_time: None,
            include_past: true,
        };
        let ids: Vec<Uuid> = search_visit_summaries(&f.conn, &with_past, &now())
            .unwrap()
            .into_iter()
            .map(|s| s.visit.id)
            .collect();
        assert_eq!(ids, vec![past.id, upcoming.id]);

        Repository::<Doctor>::new(&f.conn).soft_delete_id(&f.doctor.id).unwrap();
        assert!(search_visit_summaries(&f.conn, &with_past, &now()).unwrap().is_empty());
    }

    #[test]
    fn listing_searches_date_and_time_text() {
        let f = fixture();
        book(&f, slot());
        book(&f, Utc.with_ymd_and_hms(2030, 1, 3, 10, 30, 0).unwrap());

        let by_date = VisitFilter {
            date_time: Some("2030-01-02".into()),
            include_past: false,
        };
        let found = search_visit_summaries(&f.conn, &by_date, &now()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].visit.scheduled_at, slot());

        let by_time = VisitFilter {
            date_time: Some("2030-01-03 10:30".into()),
            include_past: false,
        };
        assert_eq!(search_visit_summaries(&f.conn, &by_time, &now()).unwrap().len(), 1);
    }

    #[test]
    fn hard_deleted_patient_leaves_visit_visible_with_null_reference() {
        let f = fixture();
        let visit = book(&f, slot());
        Repository::<Patient>::new(&f.conn).hard_delete(&f.patient.id).unwrap();

        let summary = get_visit_summary(&f.conn, &visit.id).unwrap().unwrap();
        assert_eq!(summary.visit.patient_id, None);
        assert_eq!(summary.patient_name, None);
    }

    #[test]
    fn detail_hidden_when_patient_soft_deleted() {
        let f = fixture();
        let visit = book(&f, slot());
        Repository::<Patient>::new(&f.conn).soft_delete_id(&f.patient.id).unwrap();
        assert!(get_visit_summary(&f.conn, &visit.id).unwrap().is_none());
    }

    #[test]
    fn upcoming_count_uses_visit_status_only() {
        let f = fixture();
        book(&f, now() - chrono::Duration::hours(1));
        book(&f, slot());
        let gone = book(&f, slot() + chrono::Duration::hours(1));
        Repository::<Visit>::new(&f.conn).soft_delete_id(&gone.id).unwrap();

        assert_eq!(count_upcoming_visits(&f.conn, &now()).unwrap(), 1);
    }
}

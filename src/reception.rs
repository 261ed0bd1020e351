//! Reception desk: visit scheduling, visit lookup and the dashboard.
//!
//! Every booking runs validate-then-write inside an IMMEDIATE transaction.
//! SQLite hands the write lock to one connection at a time, so two desks
//! racing for the same doctor and instant are serialised and the second
//! sees the first one's row.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::{
    count_active_doctors, count_upcoming_visits, find_double_booked_visits, find_slot_conflicts,
    get_visit_summary, search_visit_summaries, Repository, Table,
};
use crate::db::{begin_immediate, storage_now, to_storage_precision, DatabaseError};
use crate::models::{
    Doctor, EntityKind, Patient, Specialization, Visit, VisitFilter, VisitInput, VisitSummary,
};
use crate::validation::{check_future_schedule, ClinicError, ValidationError};

/// Headline counts for the home screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub patients: i64,
    pub doctors: i64,
    pub upcoming_visits: i64,
}

fn require_reference<T: Table>(
    conn: &Connection,
    id: &Uuid,
) -> Result<(), ClinicError> {
    if Repository::<T>::new(conn).exists_active(id)? {
        Ok(())
    } else {
        Err(ValidationError::ReferencedEntityNotFound {
            entity_type: T::KIND,
            id: *id,
        }
        .into())
    }
}

/// Check a candidate visit against the active store.
///
/// Rules run in a fixed order and the first failure is reported:
/// references must be active, then the instant must be in the future,
/// then the doctor must be free at exactly that instant. `editing` names
/// the visit being rescheduled, which never conflicts with itself.
pub fn validate_visit(
    conn: &Connection,
    candidate: &VisitInput,
    now: &DateTime<Utc>,
    editing: Option<&Uuid>,
) -> Result<(), ClinicError> {
    require_reference::<Patient>(conn, &candidate.patient_id)?;
    require_reference::<Doctor>(conn, &candidate.doctor_id)?;
    require_reference::<Specialization>(conn, &candidate.specialization_id)?;

    let scheduled_at = to_storage_precision(candidate.scheduled_at);
    check_future_schedule(&scheduled_at, now)?;

    let conflicts = find_slot_conflicts(conn, &candidate.doctor_id, &scheduled_at, editing)?;
    if !conflicts.is_empty() {
        let doctor = Repository::<Doctor>::new(conn).require(&candidate.doctor_id)?;
        return Err(ValidationError::DoctorDoubleBooked {
            doctor_id: doctor.id,
            doctor: doctor.to_string(),
            scheduled_at,
        }
        .into());
    }
    Ok(())
}

fn normalized(input: &VisitInput) -> VisitInput {
    VisitInput {
        scheduled_at: to_storage_precision(input.scheduled_at),
        ..input.clone()
    }
}

pub fn book_visit(conn: &Connection, input: &VisitInput) -> Result<Visit, ClinicError> {
    book_visit_at(conn, input, &storage_now())
}

/// Validate and insert a visit as one write transaction.
pub fn book_visit_at(
    conn: &Connection,
    input: &VisitInput,
    now: &DateTime<Utc>,
) -> Result<Visit, ClinicError> {
    let input = normalized(input);
    let tx = begin_immediate(conn)?;
    if let Err(e) = validate_visit(&tx, &input, now, None) {
        tracing::warn!(doctor_id = %input.doctor_id, error = %e, "Visit booking rejected");
        return Err(e);
    }
    let visit = Visit::new(&input);
    Repository::new(&tx).insert(&visit)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(
        visit_id = %visit.id,
        doctor_id = %input.doctor_id,
        scheduled_at = %visit.scheduled_at,
        "Visit booked"
    );
    Ok(visit)
}

pub fn reschedule_visit(conn: &Connection, id: &Uuid, input: &VisitInput) -> Result<Visit, ClinicError> {
    reschedule_visit_at(conn, id, input, &storage_now())
}

/// Replace an active visit's references, instant and kind.
pub fn reschedule_visit_at(
    conn: &Connection,
    id: &Uuid,
    input: &VisitInput,
    now: &DateTime<Utc>,
) -> Result<Visit, ClinicError> {
    let input = normalized(input);
    let tx = begin_immediate(conn)?;
    let repo = Repository::<Visit>::new(&tx);
    let mut visit = repo.require(id)?;
    if let Err(e) = validate_visit(&tx, &input, now, Some(id)) {
        tracing::warn!(visit_id = %id, error = %e, "Visit reschedule rejected");
        return Err(e);
    }
    visit.patient_id = Some(input.patient_id);
    visit.doctor_id = Some(input.doctor_id);
    visit.specialization_id = Some(input.specialization_id);
    visit.scheduled_at = input.scheduled_at;
    visit.visit_kind = input.visit_kind;
    repo.update(&visit)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(visit_id = %id, scheduled_at = %visit.scheduled_at, "Visit rescheduled");
    Ok(visit)
}

/// Restore a record of any kind without re-running the scheduling rules.
///
/// Bringing back a visit, or the patient or doctor that hid it, can put two
/// active visits on one doctor slot. Those visits are logged and returned.
pub fn restore_record<T: Table>(conn: &Connection, id: &Uuid) -> Result<Vec<Visit>, ClinicError> {
    Repository::<T>::new(conn).restore_id(id)?;
    let column = match T::KIND {
        EntityKind::Visit => "t.id",
        EntityKind::Patient => "t.patient_id",
        EntityKind::Doctor => "t.doctor_id",
        EntityKind::Specialization => return Ok(Vec::new()),
    };
    let clashes = find_double_booked_visits(conn, column, id)?;
    for visit in &clashes {
        tracing::warn!(
            entity = T::KIND.as_str(),
            %id,
            visit_id = %visit.id,
            scheduled_at = %visit.scheduled_at,
            "Restore left a doctor double-booked"
        );
    }
    Ok(clashes)
}

/// Detail view: the visit, its patient and its doctor must all be active.
pub fn get_visit(conn: &Connection, id: &Uuid) -> Result<VisitSummary, ClinicError> {
    get_visit_summary(conn, id)?
        .ok_or_else(|| DatabaseError::not_found(EntityKind::Visit.label(), id).into())
}

pub fn search_visits(conn: &Connection, filter: &VisitFilter) -> Result<Vec<VisitSummary>, ClinicError> {
    search_visits_at(conn, filter, &storage_now())
}

pub fn search_visits_at(
    conn: &Connection,
    filter: &VisitFilter,
    now: &DateTime<Utc>,
) -> Result<Vec<VisitSummary>, ClinicError> {
    Ok(search_visit_summaries(conn, filter, now)?)
}

pub fn dashboard_summary(conn: &Connection) -> Result<DashboardSummary, ClinicError> {
    dashboard_summary_at(conn, &storage_now())
}

pub fn dashboard_summary_at(
    conn: &Connection,
    now: &DateTime<Utc>,
) -> Result<DashboardSummary, ClinicError> {
    Ok(DashboardSummary {
        patients: Repository::<Patient>::new(conn).count_active()?,
        doctors: count_active_doctors(conn)?,
        upcoming_visits: count_upcoming_visits(conn, now)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::models::{Account, DoctorProfile, PatientInput, VisitKind};
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::path::Path;
    use std::sync::{Arc, Barrier};

    struct Desk {
        patient: Patient,
        doctor: Doctor,
        spec: Specialization,
    }

    fn seed(conn: &Connection) -> Desk {
        let spec = Specialization::new("Surgery");
        Repository::new(conn).insert(&spec).unwrap();
        let patient = Patient::new(PatientInput {
            first_name: "Firstname".into(),
            last_name: "Lastname".into(),
            phone_number: "0123456789".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 2).unwrap(),
        });
        Repository::new(conn).insert(&patient).unwrap();
        let doctor = add_doctor(conn, "docusername", &spec);
        Desk {
            patient,
            doctor,
            spec,
        }
    }

    fn add_doctor(conn: &Connection, username: &str, spec: &Specialization) -> Doctor {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            first_name: "Doc".into(),
            last_name: "Holiday".into(),
            account: Account {
                id: Uuid::new_v4(),
                username: username.into(),
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
        Repository::new(conn).insert(&doctor).unwrap();
        doctor
    }

    fn add_patient(conn: &Connection, phone: &str) -> Patient {
        let patient = Patient::new(PatientInput {
            first_name: "Ivan".into(),
            last_name: "Melnyk".into(),
            phone_number: phone.into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 5, 5).unwrap(),
        });
        Repository::new(conn).insert(&patient).unwrap();
        patient
    }

    fn candidate(desk: &Desk, at: DateTime<Utc>) -> VisitInput {
        VisitInput {
            patient_id: desk.patient.id,
            doctor_id: desk.doctor.id,
            specialization_id: desk.spec.id,
            scheduled_at: at,
            visit_kind: VisitKind::Initial,
        }
    }

    fn slot() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
    }

    fn code(result: Result<Visit, ClinicError>) -> &'static str {
        match result {
            Err(ClinicError::Validation(e)) => e.code(),
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn same_instant_is_double_booked_next_second_is_free() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();

        let err = book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap_err();
        match err {
            ClinicError::Validation(ValidationError::DoctorDoubleBooked {
                doctor,
                scheduled_at,
                ..
            }) => {
                assert_eq!(doctor, "Holiday Doc");
                assert_eq!(scheduled_at, slot());
            }
            other => panic!("unexpected {other:?}"),
        }

        book_visit_at(&conn, &candidate(&desk, slot() + Duration::seconds(1)), &now()).unwrap();
        assert_eq!(Repository::<Visit>::new(&conn).count_active().unwrap(), 2);
    }

    #[test]
    fn schedule_at_now_is_rejected_one_second_later_accepted() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        assert_eq!(
            code(book_visit_at(&conn, &candidate(&desk, now()), &now())),
            "PAST_OR_PRESENT_SCHEDULE"
        );
        book_visit_at(&conn, &candidate(&desk, now() + Duration::seconds(1)), &now()).unwrap();
    }

    #[test]
    fn soft_deleted_conflict_frees_the_slot() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        let first = book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();
        Repository::<Visit>::new(&conn).soft_delete_id(&first.id).unwrap();

        book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();
    }

    #[test]
    fn conflict_with_soft_deleted_patient_visit_is_ignored() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();
        Repository::<Patient>::new(&conn).soft_delete_id(&desk.patient.id).unwrap();

        let other = add_patient(&conn, "0987654321");
        let mut input = candidate(&desk, slot());
        input.patient_id = other.id;
        book_visit_at(&conn, &input, &now()).unwrap();
    }

    #[test]
    fn restoring_hidden_patient_reports_reactivated_double_booking() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        let first = book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();
        Repository::<Patient>::new(&conn).soft_delete_id(&desk.patient.id).unwrap();
        let mut input = candidate(&desk, slot());
        input.patient_id = add_patient(&conn, "0987654321").id;
        let second = book_visit_at(&conn, &input, &now()).unwrap();

        let clashes = restore_record::<Patient>(&conn, &desk.patient.id).unwrap();
        let ids: Vec<Uuid> = clashes.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![first.id]);
        let slot_filter = VisitFilter::default();
        assert_eq!(search_visits_at(&conn, &slot_filter, &now()).unwrap().len(), 2);
        assert_eq!(
            find_double_booked_visits(&conn, "t.doctor_id", &desk.doctor.id).unwrap().len(),
            2
        );
        assert!(Repository::<Visit>::new(&conn).exists_active(&second.id).unwrap());
    }

    #[test]
    fn restore_without_clash_reports_nothing() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        let visit = book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();
        Repository::<Visit>::new(&conn).soft_delete_id(&visit.id).unwrap();

        assert!(restore_record::<Visit>(&conn, &visit.id).unwrap().is_empty());
        assert!(restore_record::<Specialization>(&conn, &desk.spec.id).unwrap().is_empty());
        assert_eq!(get_visit(&conn, &visit.id).unwrap().visit.id, visit.id);
    }

    #[test]
    fn different_patient_with_same_doctor_and_instant_is_double_booked() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();

        let mut input = candidate(&desk, slot());
        input.patient_id = add_patient(&conn, "0987654321").id;
        let err = book_visit_at(&conn, &input, &now()).unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::DoctorDoubleBooked { doctor_id, .. }) if *doctor_id == desk.doctor.id
        ));
    }

    #[test]
    fn different_doctor_at_same_instant_is_free() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();

        let mut input = candidate(&desk, slot());
        input.doctor_id = add_doctor(&conn, "seconddoctor", &desk.spec).id;
        book_visit_at(&conn, &input, &now()).unwrap();
        assert_eq!(Repository::<Visit>::new(&conn).count_active().unwrap(), 2);
    }

    #[test]
    fn past_and_conflicting_reports_past_first() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        let past = now() - Duration::days(1);
        Repository::new(&conn)
            .insert(&Visit::new(&candidate(&desk, past)))
            .unwrap();

        assert_eq!(
            code(book_visit_at(&conn, &candidate(&desk, past), &now())),
            "PAST_OR_PRESENT_SCHEDULE"
        );
    }

    #[test]
    fn inactive_references_are_rejected() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        Repository::<Doctor>::new(&conn).soft_delete_id(&desk.doctor.id).unwrap();

        let err = book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::ReferencedEntityNotFound { entity_type: EntityKind::Doctor, .. })
        ));

        let mut unknown = candidate(&desk, slot());
        unknown.specialization_id = Uuid::new_v4();
        Repository::<Doctor>::new(&conn).restore_id(&desk.doctor.id).unwrap();
        let err = book_visit_at(&conn, &unknown, &now()).unwrap_err();
        assert!(matches!(
            err.as_validation(),
            Some(ValidationError::ReferencedEntityNotFound { entity_type: EntityKind::Specialization, .. })
        ));
        assert_eq!(Repository::<Visit>::new(&conn).list_all().unwrap().len(), 0);
    }

    #[test]
    fn rescheduling_does_not_conflict_with_itself() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        let visit = book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();

        let mut same_slot = candidate(&desk, slot());
        same_slot.visit_kind = VisitKind::Repeat;
        let updated = reschedule_visit_at(&conn, &visit.id, &same_slot, &now()).unwrap();
        assert_eq!(updated.visit_kind, VisitKind::Repeat);
        assert_eq!(updated.scheduled_at, slot());
    }

    #[test]
    fn rescheduling_onto_taken_slot_is_rejected() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();
        let later = slot() + Duration::hours(1);
        let second = book_visit_at(&conn, &candidate(&desk, later), &now()).unwrap();

        assert_eq!(
            code(reschedule_visit_at(&conn, &second.id, &candidate(&desk, slot()), &now())),
            "DOCTOR_DOUBLE_BOOKED"
        );
        let stored = Repository::<Visit>::new(&conn).require(&second.id).unwrap();
        assert_eq!(stored.scheduled_at, later);
    }

    #[test]
    fn sub_microsecond_input_is_truncated_before_comparison() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();

        let jittered = slot() + Duration::nanoseconds(300);
        assert_eq!(
            code(book_visit_at(&conn, &candidate(&desk, jittered), &now())),
            "DOCTOR_DOUBLE_BOOKED"
        );
    }

    #[test]
    fn detail_and_listing() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        let visit = book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();

        let summary = get_visit(&conn, &visit.id).unwrap();
        assert_eq!(summary.visit, visit);
        assert_eq!(summary.specialization_name.as_deref(), Some("Surgery"));
        assert_eq!(search_visits_at(&conn, &VisitFilter::default(), &now()).unwrap().len(), 1);

        Repository::<Visit>::new(&conn).soft_delete_id(&visit.id).unwrap();
        assert!(matches!(
            get_visit(&conn, &visit.id),
            Err(ClinicError::Database(DatabaseError::NotFound { .. }))
        ));
        assert!(search_visits_at(&conn, &VisitFilter::default(), &now()).unwrap().is_empty());
    }

    #[test]
    fn dashboard_counts_active_records() {
        let conn = open_memory_database().unwrap();
        let desk = seed(&conn);
        book_visit_at(&conn, &candidate(&desk, slot()), &now()).unwrap();
        let gone = book_visit_at(&conn, &candidate(&desk, slot() + Duration::hours(2)), &now()).unwrap();
        Repository::<Visit>::new(&conn).soft_delete_id(&gone.id).unwrap();

        assert_eq!(
            dashboard_summary_at(&conn, &now()).unwrap(),
            DashboardSummary {
                patients: 1,
                doctors: 1,
                upcoming_visits: 1,
            }
        );
    }

    fn race_for_slot(path: &Path, input: VisitInput, barrier: Arc<Barrier>) -> Result<Visit, ClinicError> {
        let conn = open_database(path).unwrap();
        barrier.wait();
        book_visit_at(&conn, &input, &now())
    }

    #[test]
    fn concurrent_bookings_for_one_slot_admit_exactly_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        let input = {
            let conn = open_database(&path).unwrap();
            candidate(&seed(&conn), slot())
        };

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                let input = input.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || race_for_slot(&path, input, barrier))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(ClinicError::Validation(ValidationError::DoctorDoubleBooked { .. }))
        )));
        let conn = open_database(&path).unwrap();
        assert_eq!(Repository::<Visit>::new(&conn).count_active().unwrap(), 1);
    }
}

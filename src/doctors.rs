//! Doctor registration and profile maintenance.
//!
//! A doctor is an `Account` (login identity) plus a `DoctorProfile`. Both
//! are written in one savepoint, so a failed registration leaves neither
//! behind.

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use uuid::Uuid;

use crate::account::hash_password;
use crate::db::repository::{self, username_taken, Repository};
use crate::db::{begin_immediate, storage_now, DatabaseError};
use crate::models::{
    Account, Doctor, DoctorFilter, DoctorProfile, DoctorRegistration, DoctorUpdate, EntityKind,
    Specialization,
};
use crate::validation::{
    check_email, check_name, check_password, check_recertification, check_username, ClinicError,
    ValidationError,
};

/// Deduplicate and check that every requested specialization is active.
fn resolve_specializations(conn: &Connection, ids: &[Uuid]) -> Result<Vec<Uuid>, ClinicError> {
    let mut unique: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    if unique.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "specialization_ids",
            reason: "select at least one specialization".into(),
        }
        .into());
    }
    let specs = Repository::<Specialization>::new(conn);
    for id in &unique {
        if !specs.exists_active(id)? {
            return Err(ValidationError::ReferencedEntityNotFound {
                entity_type: EntityKind::Specialization,
                id: *id,
            }
            .into());
        }
    }
    Ok(unique)
}

fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

pub fn register_doctor(conn: &Connection, registration: DoctorRegistration) -> Result<Doctor, ClinicError> {
    register_doctor_on(conn, registration, &Local::now().date_naive())
}

/// Create the account and the doctor profile as of `today`.
///
/// Field rules and password hashing run first. The specialization and
/// username checks then share one write transaction with the insert.
pub fn register_doctor_on(
    conn: &Connection,
    registration: DoctorRegistration,
    today: &NaiveDate,
) -> Result<Doctor, ClinicError> {
    let mut doctor = match build_doctor(registration, today) {
        Ok(doctor) => doctor,
        Err(e) => {
            tracing::warn!(error = %e, "Doctor registration rejected");
            return Err(e.into());
        }
    };
    let tx = begin_immediate(conn)?;
    if let Err(e) = check_references(&tx, &mut doctor) {
        tracing::warn!(username = %doctor.account.username, error = %e, "Doctor registration rejected");
        return Err(e);
    }
    Repository::new(&tx).insert(&doctor)?;
    tx.commit().map_err(DatabaseError::from)?;
    tracing::info!(doctor_id = %doctor.id, "Doctor registered");
    Ok(doctor)
}

fn check_references(conn: &Connection, doctor: &mut Doctor) -> Result<(), ClinicError> {
    doctor.profile.specialization_ids = resolve_specializations(conn, &doctor.profile.specialization_ids)?;
    if username_taken(conn, &doctor.account.username)? {
        return Err(ValidationError::DuplicateUsername(doctor.account.username.clone()).into());
    }
    Ok(())
}

fn build_doctor(registration: DoctorRegistration, today: &NaiveDate) -> Result<Doctor, ValidationError> {
    let first_name = registration.first_name.trim().to_string();
    let last_name = registration.last_name.trim().to_string();
    let username = registration.username.trim().to_string();
    let email = normalize_email(registration.email);

    check_name("first_name", &first_name)?;
    check_name("last_name", &last_name)?;
    check_username(&username)?;
    check_email(email.as_deref())?;
    check_password(&registration.password, &registration.password_confirmation)?;
    check_recertification(&registration.recertification_date, today)?;

    Ok(Doctor {
        id: Uuid::new_v4(),
        first_name,
        last_name,
        account: Account {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: hash_password(&registration.password),
            is_staff: registration.is_staff,
            date_joined: storage_now(),
        },
        profile: DoctorProfile {
            recertification_date: registration.recertification_date,
            specialization_ids: registration.specialization_ids,
        },
        deleted_at: None,
    })
}

pub fn update_doctor(conn: &Connection, id: &Uuid, update: DoctorUpdate) -> Result<Doctor, ClinicError> {
    update_doctor_on(conn, id, update, &Local::now().date_naive())
}

/// Edit an active doctor's profile. Credentials are left as they are.
pub fn update_doctor_on(
    conn: &Connection,
    id: &Uuid,
    update: DoctorUpdate,
    today: &NaiveDate,
) -> Result<Doctor, ClinicError> {
    let tx = begin_immediate(conn)?;
    let repo = Repository::<Doctor>::new(&tx);
    let mut doctor = repo.require(id)?;

    let first_name = update.first_name.trim().to_string();
    let last_name = update.last_name.trim().to_string();
    let email = normalize_email(update.email);
    let checked = check_name("first_name", &first_name)
        .and_then(|_| check_name("last_name", &last_name))
        .and_then(|_| check_email(email.as_deref()))
        .and_then(|_| check_recertification(&update.recertification_date, today))
        .map_err(ClinicError::from)
        .and_then(|_| resolve_specializations(&tx, &update.specialization_ids));
    let specialization_ids = match checked {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(doctor_id = %id, error = %e, "Doctor update rejected");
            return Err(e);
        }
    };

    doctor.first_name = first_name;
    doctor.last_name = last_name;
    doctor.account.email = email;
    doctor.profile.recertification_date = update.recertification_date;
    doctor.profile.specialization_ids = specialization_ids;
    repo.update(&doctor)?;
    // re-read so the specialization list comes back in display order
    let doctor = repo.require(id)?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(doctor)
}

pub fn get_doctor(conn: &Connection, id: &Uuid) -> Result<Doctor, ClinicError> {
    Ok(Repository::<Doctor>::new(conn).require(id)?)
}

pub fn search_doctors(conn: &Connection, filter: &DoctorFilter) -> Result<Vec<Doctor>, ClinicError> {
    Ok(repository::search_doctors(conn, filter)?)
}

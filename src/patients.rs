//! Patient registration and maintenance.

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{self, find_patient_by_phone, Repository, Retrieval};
use crate::db::{begin_immediate, DatabaseError};
use crate::models::{Patient, PatientFilter, PatientInput};
use crate::validation::{
    check_date_of_birth, check_name, check_phone_number, ClinicError, ValidationError,
};

fn normalize(input: PatientInput) -> PatientInput {
    PatientInput {
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        phone_number: input.phone_number.trim().to_string(),
        date_of_birth: input.date_of_birth,
    }
}

/// Field rules plus phone uniqueness. Soft-deleted patients keep their
/// number, so the lookup covers every row.
fn validate(
    conn: &Connection,
    input: &PatientInput,
    today: &NaiveDate,
    editing: Option<&Uuid>,
) -> Result<(), ClinicError> {
    check_name("first_name", &input.first_name)?;
    check_name("last_name", &input.last_name)?;
    check_phone_number(&input.phone_number)?;
    check_date_of_birth(&input.date_of_birth, today)?;

    if let Some(holder) = find_patient_by_phone(conn, &input.phone_number, Retrieval::All)? {
        if Some(&holder.id) != editing {
            return Err(ValidationError::DuplicatePhoneNumber(input.phone_number.clone()).into());
        }
    }
    Ok(())
}

pub fn create_patient(conn: &Connection, input: PatientInput) -> Result<Patient, ClinicError> {
    create_patient_on(conn, input, &Local::now().date_naive())
}

/// Register a patient as of `today`. The phone check and the insert share
/// one write transaction.
pub fn create_patient_on(
    conn: &Connection,
    input: PatientInput,
    today: &NaiveDate,
) -> Result<Patient, ClinicError> {
    let input = normalize(input);
    let tx = begin_immediate(conn)?;
    if let Err(e) = validate(&tx, &input, today, None) {
        tracing::warn!(error = %e, "Patient registration rejected");
        return Err(e);
    }
    let patient = Patient::new(input);
    Repository::new(&tx).insert(&patient)?;
    tx.commit().map_err(DatabaseError::from)?;
    tracing::info!(patient_id = %patient.id, "Patient registered");
    Ok(patient)
}

pub fn update_patient(
    conn: &Connection,
    id: &Uuid,
    input: PatientInput,
) -> Result<Patient, ClinicError> {
    update_patient_on(conn, id, input, &Local::now().date_naive())
}

/// Edit an active patient. Soft-deleted patients are not editable.
pub fn update_patient_on(
    conn: &Connection,
    id: &Uuid,
    input: PatientInput,
    today: &NaiveDate,
) -> Result<Patient, ClinicError> {
    let input = normalize(input);
    let tx = begin_immediate(conn)?;
    let repo = Repository::<Patient>::new(&tx);
    let mut patient = repo.require(id)?;
    if let Err(e) = validate(&tx, &input, today, Some(id)) {
        tracing::warn!(patient_id = %id, error = %e, "Patient update rejected");
        return Err(e);
    }
    patient.first_name = input.first_name;
    patient.last_name = input.last_name;
    patient.phone_number = input.phone_number;
    patient.date_of_birth = input.date_of_birth;
    repo.update(&patient)?;
    tx.commit().map_err(DatabaseError::from)?;
    Ok(patient)
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Patient, ClinicError> {
    Ok(Repository::<Patient>::new(conn).require(id)?)
}

pub fn search_patients(conn: &Connection, filter: &PatientFilter) -> Result<Vec<Patient>, ClinicError> {
    Ok(repository::search_patients(conn, filter)?)
}

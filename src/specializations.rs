//! Medical specializations offered by the clinic.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::Repository;
use crate::models::{Specialization, SpecializationInput};
use crate::validation::{check_name, ClinicError};

pub fn create_specialization(
    conn: &Connection,
    input: SpecializationInput,
) -> Result<Specialization, ClinicError> {
    let name = input.name.trim();
    check_name("name", name)?;
    let spec = Specialization::new(name);
    Repository::new(conn).insert(&spec)?;
    tracing::info!(specialization_id = %spec.id, "Specialization created");
    Ok(spec)
}

/// Rename an active specialization.
pub fn rename_specialization(
    conn: &Connection,
    id: &Uuid,
    input: SpecializationInput,
) -> Result<Specialization, ClinicError> {
    let repo = Repository::<Specialization>::new(conn);
    let mut spec = repo.require(id)?;
    let name = input.name.trim();
    check_name("name", name)?;
    spec.name = name.to_string();
    repo.update(&spec)?;
    Ok(spec)
}

pub fn list_specializations(conn: &Connection) -> Result<Vec<Specialization>, ClinicError> {
    Ok(Repository::<Specialization>::new(conn).list_active()?)
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn new(input: PatientInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: input.first_name,
            last_name: input.last_name,
            phone_number: input.phone_number,
            date_of_birth: input.date_of_birth,
            deleted_at: None,
        }
    }
}

impl std::fmt::Display for Patient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.last_name, self.first_name)
    }
}

/// Editable patient fields, as submitted by a create or update form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientInput {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
}

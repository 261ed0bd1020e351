use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login identity and permissions. Owned by a `Doctor` profile, but kept
/// separate so credentials never travel with clinical data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

/// Clinical side of a doctor: what they practise and until when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub recertification_date: NaiveDate,
    /// Active specializations only; links to soft-deleted ones are kept in
    /// the store but not surfaced.
    pub specialization_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub account: Account,
    pub profile: DoctorProfile,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl std::fmt::Display for Doctor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.last_name, self.first_name)
    }
}

/// New doctor with login credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
    pub recertification_date: NaiveDate,
    pub specialization_ids: Vec<Uuid>,
    /// Staff accounts administer the clinic and are hidden from doctor listings.
    #[serde(default)]
    pub is_staff: bool,
}

/// Profile edit. Credentials are not touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub recertification_date: NaiveDate,
    pub specialization_ids: Vec<Uuid>,
}

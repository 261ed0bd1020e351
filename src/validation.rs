//! Leaf validation rules and the error every rejected write surfaces.
//!
//! Each rule looks at a single candidate value plus the current date or
//! instant, which the caller passes in. The store-backed scheduling checks
//! live in `reception`.

use std::sync::LazyLock;

use chrono::{DateTime, Months, NaiveDate, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::EntityKind;

pub const NAME_MAX_CHARS: usize = 30;
pub const PHONE_MAX_DIGITS: usize = 10;
pub const USERNAME_MAX_CHARS: usize = 150;
pub const PASSWORD_MIN_CHARS: usize = 8;
/// Minimum age of a patient at registration.
pub const MIN_PATIENT_AGE_MONTHS: u32 = 6;

static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,10}$").unwrap());
static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]{1,150}$").unwrap());
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// A write rejected before it touched the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("The visit date is overdue: {scheduled_at} is not after the current time. Enter a later date and time.")]
    PastOrPresentSchedule { scheduled_at: DateTime<Utc> },

    #[error("{doctor} already has an entry for {scheduled_at}. Please select another date/time or doctor.")]
    DoctorDoubleBooked {
        doctor_id: Uuid,
        doctor: String,
        scheduled_at: DateTime<Utc>,
    },

    #[error("The certification date {recertification_date} has expired. Enter a date after today.")]
    ExpiredCertification { recertification_date: NaiveDate },

    #[error("Date of birth {date_of_birth} must be at least {MIN_PATIENT_AGE_MONTHS} months in the past.")]
    PatientTooYoung { date_of_birth: NaiveDate },

    #[error("Referenced {entity_type} {id} does not exist or is no longer active.")]
    ReferencedEntityNotFound { entity_type: EntityKind, id: Uuid },

    #[error("A patient with phone number {0} already exists.")]
    DuplicatePhoneNumber(String),

    #[error("The username {0} is already taken.")]
    DuplicateUsername(String),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    /// Stable machine-readable code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PastOrPresentSchedule { .. } => "PAST_OR_PRESENT_SCHEDULE",
            Self::DoctorDoubleBooked { .. } => "DOCTOR_DOUBLE_BOOKED",
            Self::ExpiredCertification { .. } => "EXPIRED_CERTIFICATION",
            Self::PatientTooYoung { .. } => "PATIENT_TOO_YOUNG",
            Self::ReferencedEntityNotFound { .. } => "REFERENCED_ENTITY_NOT_FOUND",
            Self::DuplicatePhoneNumber(_) => "DUPLICATE_PHONE_NUMBER",
            Self::DuplicateUsername(_) => "DUPLICATE_USERNAME",
            Self::InvalidField { .. } => "INVALID_FIELD",
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Error returned by every workflow: either the write was rejected, or the
/// store failed underneath it.
#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ClinicError {
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            Self::Database(_) => None,
        }
    }
}

/// A visit must be strictly in the future.
pub fn check_future_schedule(
    scheduled_at: &DateTime<Utc>,
    now: &DateTime<Utc>,
) -> Result<(), ValidationError> {
    if scheduled_at <= now {
        return Err(ValidationError::PastOrPresentSchedule {
            scheduled_at: *scheduled_at,
        });
    }
    Ok(())
}

/// A doctor's certificate must still be valid tomorrow.
pub fn check_recertification(
    recertification_date: &NaiveDate,
    today: &NaiveDate,
) -> Result<(), ValidationError> {
    if recertification_date <= today {
        return Err(ValidationError::ExpiredCertification {
            recertification_date: *recertification_date,
        });
    }
    Ok(())
}

/// Date of birth must lie at least six months before today.
pub fn check_date_of_birth(date_of_birth: &NaiveDate, today: &NaiveDate) -> Result<(), ValidationError> {
    let latest_allowed = today
        .checked_sub_months(Months::new(MIN_PATIENT_AGE_MONTHS))
        .unwrap_or(NaiveDate::MIN);
    if *date_of_birth > latest_allowed {
        return Err(ValidationError::PatientTooYoung {
            date_of_birth: *date_of_birth,
        });
    }
    Ok(())
}

pub fn check_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::invalid(field, "must not be empty"));
    }
    if trimmed.chars().count() > NAME_MAX_CHARS {
        return Err(ValidationError::invalid(
            field,
            format!("must be at most {NAME_MAX_CHARS} characters"),
        ));
    }
    Ok(())
}

pub fn check_phone_number(value: &str) -> Result<(), ValidationError> {
    if !PHONE_PATTERN.is_match(value) {
        return Err(ValidationError::invalid(
            "phone_number",
            format!("must be 1 to {PHONE_MAX_DIGITS} digits"),
        ));
    }
    Ok(())
}

pub fn check_username(value: &str) -> Result<(), ValidationError> {
    if !USERNAME_PATTERN.is_match(value) {
        return Err(ValidationError::invalid(
            "username",
            format!("must be 1 to {USERNAME_MAX_CHARS} letters, digits or @.+-_"),
        ));
    }
    Ok(())
}

pub fn check_email(value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(email) if !EMAIL_PATTERN.is_match(email) => {
            Err(ValidationError::invalid("email", "is not a valid address"))
        }
        _ => Ok(()),
    }
}

pub fn check_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(ValidationError::invalid(
            "password",
            format!("must be at least {PASSWORD_MIN_CHARS} characters"),
        ));
    }
    if password != confirmation {
        return Err(ValidationError::invalid("password_confirmation", "passwords do not match"));
    }
    Ok(())
}

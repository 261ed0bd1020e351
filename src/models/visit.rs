use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::VisitKind;

/// A booked slot. References become `None` when the target row is hard
/// deleted; the visit itself survives as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub specialization_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub visit_kind: VisitKind,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Visit {
    pub fn new(input: &VisitInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: Some(input.patient_id),
            doctor_id: Some(input.doctor_id),
            specialization_id: Some(input.specialization_id),
            scheduled_at: input.scheduled_at,
            visit_kind: input.visit_kind,
            deleted_at: None,
        }
    }
}

/// Candidate booking submitted for validation and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitInput {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialization_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub visit_kind: VisitKind,
}

/// Visit with display names resolved, for listings and detail views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitSummary {
    #[serde(flatten)]
    pub visit: Visit,
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub specialization_name: Option<String>,
}

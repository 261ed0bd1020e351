use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AuditAction, EntityKind};

/// One soft delete, restore or hard delete applied to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub timestamp: DateTime<Utc>,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub action: AuditAction,
}

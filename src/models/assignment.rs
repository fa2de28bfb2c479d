use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

use super::profile::SupervisorRole;

/// Practitioner to supervisor link. Deactivated rather than deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Assignment {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub supervisor_id: Uuid,
    pub supervisor_role: SupervisorRole,
    pub organization_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Uuid,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Loggable for Assignment {
    fn entity_type() -> &'static str { "assignment" }
    fn subject_id(&self) -> Uuid { self.practitioner_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

/// Input for creating an assignment.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewAssignment {
    pub practitioner_id: Uuid,
    pub supervisor_id: Uuid,
    pub supervisor_role: SupervisorRole,
    pub organization_id: Uuid,
    /// Overwritten with the authenticated caller by the HTTP layer.
    #[serde(default)]
    pub assigned_by: Uuid,
}

impl NewAssignment {
    pub fn into_assignment(self, id: Uuid, assigned_at: DateTime<Utc>) -> Assignment {
        Assignment {
            id,
            practitioner_id: self.practitioner_id,
            supervisor_id: self.supervisor_id,
            supervisor_role: self.supervisor_role,
            organization_id: self.organization_id,
            assigned_at,
            assigned_by: self.assigned_by,
            active: true,
            removed_at: None,
            removed_by: None,
            reason: None,
        }
    }
}

/// Collects every constraint violation instead of stopping at the first.
pub fn validate_assignment(data: &NewAssignment) -> Vec<String> {
    let mut errors = Vec::new();

    if data.practitioner_id.is_nil() {
        errors.push("Practitioner ID is required".to_string());
    }
    if data.supervisor_id.is_nil() {
        errors.push("Supervisor ID is required".to_string());
    }
    if data.organization_id.is_nil() {
        errors.push("Organization ID is required".to_string());
    }
    if data.assigned_by.is_nil() {
        errors.push("Assigned by user ID is required".to_string());
    }
    if data.practitioner_id == data.supervisor_id {
        errors.push("Practitioner and supervisor cannot be the same person".to_string());
    }

    errors
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReassignRequest {
    pub practitioner_id: Uuid,
    pub new_supervisor_id: Uuid,
    pub supervisor_role: SupervisorRole,
    pub organization_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RemoveAssignmentRequest {
    pub reason: Option<String>,
}

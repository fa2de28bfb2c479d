use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::events::{Loggable, Severity};

use super::profile::{Role, SupervisorRole};

// =============================================================================
// PERMISSION
// =============================================================================

/// Scope predicate attached to a matrix entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum Condition {
    /// Granted whenever resource and action match.
    Unconditional,
    /// Granted only when the resource id is the caller's own user id.
    SelfOnly,
    /// Granted for list-level checks (no resource id) or when the caller
    /// supervises the referenced practitioner in the given role.
    AssignedSupervisor(SupervisorRole),
}

impl Condition {
    pub fn is_unconditional(&self) -> bool {
        matches!(self, Condition::Unconditional)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    #[schema(example = "practitioner_data")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
    #[schema(value_type = Object)]
    pub condition: Condition,
}

impl Permission {
    pub fn new(resource: &str, action: &str) -> Self {
        Self {
            resource: resource.to_string(),
            action: action.to_string(),
            condition: Condition::Unconditional,
        }
    }

    pub fn self_only(resource: &str, action: &str) -> Self {
        Self {
            condition: Condition::SelfOnly,
            ..Self::new(resource, action)
        }
    }

    pub fn assigned(resource: &str, action: &str, role: SupervisorRole) -> Self {
        Self {
            condition: Condition::AssignedSupervisor(role),
            ..Self::new(resource, action)
        }
    }

    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

// =============================================================================
// REQUESTS / RESPONSES
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PermissionQuery {
    #[schema(example = "practitioner_data")]
    pub resource: String,
    #[schema(example = "read")]
    pub action: String,
    pub resource_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    /// Parsed with `Role::from_str` so unknown names are a 400, not a 422.
    #[schema(example = "coach")]
    pub role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    pub permissions: Vec<Permission>,
}

// =============================================================================
// ROLE CHANGE (audit payload)
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleChange {
    pub user_id: Uuid,
    pub role: Role,
    pub roles: Vec<Role>,
}

impl Loggable for RoleChange {
    fn entity_type() -> &'static str { "user_role" }
    fn subject_id(&self) -> Uuid { self.user_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

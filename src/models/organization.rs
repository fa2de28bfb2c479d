use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::profile::{Profile, Role, RoleSet};

/// Derived per-check view of a profile that belongs to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrganizationContext {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = Vec<Role>)]
    pub roles: RoleSet,
    pub is_active: bool,
}

impl OrganizationContext {
    /// `None` for profiles outside any organization.
    pub fn from_profile(profile: &Profile) -> Option<Self> {
        let organization_id = profile.organization_id?;
        Some(Self {
            organization_id,
            user_id: profile.id,
            roles: profile.roles.clone(),
            is_active: profile.is_active,
        })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }
}

/// Active/available roles for multi-role users.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleContext {
    pub active_role: Role,
    pub available_roles: Vec<Role>,
    pub organization_id: Uuid,
}

impl From<&OrganizationContext> for RoleContext {
    fn from(ctx: &OrganizationContext) -> Self {
        Self {
            active_role: ctx.roles.primary(),
            available_roles: ctx.roles.as_slice().to_vec(),
            organization_id: ctx.organization_id,
        }
    }
}

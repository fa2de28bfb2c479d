use std::sync::Arc;

use uuid::Uuid;

use crate::errors::{AuthzError, AuthzResult};
use crate::events::{log_activity, EventBus};
use crate::models::profile::{Profile, ProfileUpdate, Role, RoleSet};
use crate::models::rbac::RoleChange;
use crate::payments::UserContextService;
use crate::store::ProfileStore;

use super::evaluator::PermissionService;
use super::{actions, resources};

/// The only sanctioned writer of `profiles.roles`.
#[derive(Clone)]
pub struct RoleMutationService {
    permissions: PermissionService,
    profiles: Arc<dyn ProfileStore>,
    user_contexts: UserContextService,
    events: EventBus,
}

impl RoleMutationService {
    pub fn new(
        permissions: PermissionService,
        profiles: Arc<dyn ProfileStore>,
        user_contexts: UserContextService,
        events: EventBus,
    ) -> Self {
        Self {
            permissions,
            profiles,
            user_contexts,
            events,
        }
    }

    /// Adds `role`. Already holding it is a no-op.
    pub async fn assign_role(&self, user_id: Uuid, role: Role, assigned_by: Uuid) -> AuthzResult<Profile> {
        self.permissions
            .require_permission(assigned_by, resources::USERS, actions::ASSIGN_ROLES, None)
            .await?;

        let profile = self.permissions.contexts().get_profile(user_id).await?;
        match profile.roles.with(role) {
            Some(roles) => self.persist(profile, roles, role, "assigned", assigned_by).await,
            None => Ok(profile),
        }
    }

    /// Removes `role`; a user left without roles becomes a practitioner.
    pub async fn remove_role(&self, user_id: Uuid, role: Role, removed_by: Uuid) -> AuthzResult<Profile> {
        self.permissions
            .require_permission(removed_by, resources::USERS, actions::ASSIGN_ROLES, None)
            .await?;

        let profile = self.permissions.contexts().get_profile(user_id).await?;
        match profile.roles.without(role) {
            Some(roles) => self.persist(profile, roles, role, "removed", removed_by).await,
            None => Ok(profile),
        }
    }

    async fn persist(
        &self,
        mut profile: Profile,
        roles: RoleSet,
        role: Role,
        action: &str,
        actor: Uuid,
    ) -> AuthzResult<Profile> {
        let updated = self.profiles.update(profile.id, ProfileUpdate::roles(roles.clone())).await?;
        if !updated {
            return Err(AuthzError::not_found(format!("profile {}", profile.id)));
        }

        // assignment membership may differ for this user now
        self.permissions.clear_permission_caches();
        self.user_contexts.clear_user_cache(profile.id);

        tracing::info!(user_id = %profile.id, role = %role, action, actor = %actor, "role set changed");
        log_activity(
            &self.events,
            action,
            Some(actor),
            &RoleChange {
                user_id: profile.id,
                role,
                roles: roles.as_slice().to_vec(),
            },
        );

        profile.roles = roles;
        Ok(profile)
    }
}

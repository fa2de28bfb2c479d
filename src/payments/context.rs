use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use uuid::Uuid;

use crate::authz::{AuthzConfig, OrganizationContextResolver};
use crate::cache::{Cache, Clock, TtlCache};
use crate::errors::AuthzError;
use crate::models::organization::OrganizationContext;
use crate::models::profile::{Profile, Role};
use crate::models::user_context::{UserContext, UserType};

pub type UserContextCache = dyn Cache<Uuid, UserContext>;

const BATCH_SIZE: usize = 10;

/// Classifies a profile for payment purposes.
pub fn determine_user_type(profile: &Profile, organization: Option<&OrganizationContext>) -> UserType {
    let Some(organization) = organization.filter(|_| profile.organization_id.is_some()) else {
        return UserType::Individual;
    };

    if profile.has_role(Role::Admin) || organization.has_role(Role::Admin) {
        UserType::OrganizationAdmin
    } else {
        UserType::OrganizationMember
    }
}

/// Cached per-user payment context.
#[derive(Clone)]
pub struct UserContextService {
    contexts: OrganizationContextResolver,
    cache: Arc<UserContextCache>,
}

impl UserContextService {
    pub fn new(contexts: OrganizationContextResolver, cache: Arc<UserContextCache>) -> Self {
        Self { contexts, cache }
    }

    pub fn with_config(contexts: OrganizationContextResolver, config: AuthzConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(contexts, Arc::new(TtlCache::new(config.cache_ttl, clock)))
    }

    /// `None` when the profile is missing or cannot be read. Only found
    /// contexts are cached.
    pub async fn get_user_context(&self, user_id: Uuid) -> Option<UserContext> {
        if let Some(context) = self.cache.get(&user_id) {
            return Some(context);
        }

        let profile = match self.contexts.get_profile(user_id).await {
            Ok(profile) => profile,
            Err(AuthzError::NotFound(_)) => {
                tracing::debug!(user_id = %user_id, "no profile for user context");
                return None;
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "user context lookup failed");
                return None;
            }
        };

        let organization = OrganizationContext::from_profile(&profile);
        let user_type = determine_user_type(&profile, organization.as_ref());

        let context = UserContext {
            user_id,
            user_type,
            organization_id: profile.organization_id,
            organization_role: organization.as_ref().map(|o| o.roles.primary()),
            payment_permissions: user_type.payment_permissions(),
            is_active: profile.is_active,
        };

        self.cache.set(user_id, context.clone());
        Some(context)
    }

    async fn user_type(&self, user_id: Uuid) -> Option<UserType> {
        self.get_user_context(user_id).await.map(|c| c.user_type)
    }

    pub async fn is_individual_practitioner(&self, user_id: Uuid) -> bool {
        self.user_type(user_id).await == Some(UserType::Individual)
    }

    pub async fn is_organization_admin(&self, user_id: Uuid) -> bool {
        self.user_type(user_id).await == Some(UserType::OrganizationAdmin)
    }

    pub async fn is_organization_member(&self, user_id: Uuid) -> bool {
        self.user_type(user_id).await == Some(UserType::OrganizationMember)
    }

    pub async fn get_organization_id(&self, user_id: Uuid) -> Option<Uuid> {
        self.get_user_context(user_id).await.and_then(|c| c.organization_id)
    }

    pub async fn can_make_payments(&self, user_id: Uuid) -> bool {
        self.get_user_context(user_id)
            .await
            .is_some_and(|c| c.payment_permissions.can_make_payments)
    }

    pub async fn can_view_payment_history(&self, user_id: Uuid) -> bool {
        self.get_user_context(user_id)
            .await
            .is_some_and(|c| c.payment_permissions.can_view_payment_history)
    }

    pub async fn can_manage_subscriptions(&self, user_id: Uuid) -> bool {
        self.get_user_context(user_id)
            .await
            .is_some_and(|c| c.payment_permissions.can_manage_subscriptions)
    }

    pub fn clear_user_cache(&self, user_id: Uuid) {
        self.cache.remove(&user_id);
    }

    pub fn clear_all_cache(&self) {
        self.cache.clear();
    }

    pub async fn refresh_user_context(&self, user_id: Uuid) -> Option<UserContext> {
        self.clear_user_cache(user_id);
        self.get_user_context(user_id).await
    }

    /// Looks up at most ten users concurrently.
    pub async fn get_batch_user_contexts(&self, user_ids: &[Uuid]) -> HashMap<Uuid, Option<UserContext>> {
        let mut results = HashMap::with_capacity(user_ids.len());

        for chunk in user_ids.chunks(BATCH_SIZE) {
            let contexts = join_all(chunk.iter().map(|id| self.get_user_context(*id))).await;
            results.extend(chunk.iter().copied().zip(contexts));
        }

        results
    }
}

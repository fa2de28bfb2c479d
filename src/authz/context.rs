use std::sync::Arc;

use uuid::Uuid;

use crate::errors::{AuthzError, AuthzResult};
use crate::models::organization::OrganizationContext;
use crate::models::profile::Profile;
use crate::store::ProfileStore;

/// Builds organization contexts straight from the profile store.
///
/// Never cached: role and `is_active` changes must be visible on the next check.
#[derive(Clone)]
pub struct OrganizationContextResolver {
    profiles: Arc<dyn ProfileStore>,
}

impl OrganizationContextResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    /// `NotFound` is kept distinct from store failures.
    pub async fn get_profile(&self, user_id: Uuid) -> AuthzResult<Profile> {
        self.profiles
            .get(user_id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("profile {}", user_id)))
    }

    /// `None` for unknown users, users outside any organization, and on store
    /// failure.
    pub async fn get_organization_context(&self, user_id: Uuid) -> Option<OrganizationContext> {
        match self.profiles.get(user_id).await {
            Ok(Some(profile)) => OrganizationContext::from_profile(&profile),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "profile lookup failed; no organization context");
                None
            }
        }
    }
}

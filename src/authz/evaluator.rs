use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use uuid::Uuid;

use crate::errors::{AuthzError, AuthzResult};
use crate::models::organization::{OrganizationContext, RoleContext};
use crate::models::rbac::{Condition, Permission, PermissionQuery};

use super::assignments::AssignmentResolver;
use super::context::OrganizationContextResolver;
use super::matrix::PermissionMatrix;

/// Decides whether a single matrix entry grants access in a given context.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    async fn can(&self, ctx: &OrganizationContext, permission: &Permission, resource_id: Option<Uuid>) -> bool;
}

/// Condition dispatcher for the built-in matrix.
///
/// - `Unconditional` grants
/// - `SelfOnly` grants only when the resource id is the caller's own id
/// - `AssignedSupervisor` grants list-level checks, or when the caller
///   supervises the referenced practitioner in that role
#[derive(Clone)]
pub struct MatrixEvaluator {
    assignments: AssignmentResolver,
}

impl MatrixEvaluator {
    pub fn new(assignments: AssignmentResolver) -> Self {
        Self { assignments }
    }
}

#[async_trait]
impl PolicyEvaluator for MatrixEvaluator {
    async fn can(&self, ctx: &OrganizationContext, permission: &Permission, resource_id: Option<Uuid>) -> bool {
        match permission.condition {
            Condition::Unconditional => true,
            Condition::SelfOnly => resource_id == Some(ctx.user_id),
            Condition::AssignedSupervisor(role) => match resource_id {
                None => true,
                Some(practitioner_id) => {
                    self.assignments
                        .is_assigned_practitioner(ctx.user_id, practitioner_id, role)
                        .await
                }
            },
        }
    }
}

/// Permission matrix engine.
#[derive(Clone)]
pub struct PermissionService {
    contexts: OrganizationContextResolver,
    assignments: AssignmentResolver,
    matrix: &'static PermissionMatrix,
    evaluator: Arc<dyn PolicyEvaluator>,
}

impl PermissionService {
    pub fn new(contexts: OrganizationContextResolver, assignments: AssignmentResolver) -> Self {
        let evaluator = Arc::new(MatrixEvaluator::new(assignments.clone()));
        Self::with_evaluator(contexts, assignments, PermissionMatrix::standard(), evaluator)
    }

    pub fn with_evaluator(
        contexts: OrganizationContextResolver,
        assignments: AssignmentResolver,
        matrix: &'static PermissionMatrix,
        evaluator: Arc<dyn PolicyEvaluator>,
    ) -> Self {
        Self {
            contexts,
            assignments,
            matrix,
            evaluator,
        }
    }

    pub fn contexts(&self) -> &OrganizationContextResolver {
        &self.contexts
    }

    pub fn assignments(&self) -> &AssignmentResolver {
        &self.assignments
    }

    async fn active_context(&self, user_id: Uuid) -> Option<OrganizationContext> {
        self.contexts
            .get_organization_context(user_id)
            .await
            .filter(|ctx| ctx.is_active)
    }

    /// Union of roles: every matching entry across every held role is tried
    /// before denying.
    pub async fn has_permission(&self, user_id: Uuid, resource: &str, action: &str, resource_id: Option<Uuid>) -> bool {
        let Some(ctx) = self.active_context(user_id).await else {
            tracing::debug!(user_id = %user_id, resource, action, "denied: no active organization context");
            return false;
        };

        for permission in self.matrix.matching(&ctx.roles, resource, action) {
            if self.evaluator.can(&ctx, permission, resource_id).await {
                tracing::debug!(
                    user_id = %user_id,
                    resource,
                    action,
                    condition = ?permission.condition,
                    "permission granted"
                );
                return true;
            }
        }

        tracing::debug!(user_id = %user_id, resource, action, resource_id = ?resource_id, "permission denied");
        false
    }

    /// Each query is evaluated independently; results keep the input order.
    pub async fn has_permissions(&self, user_id: Uuid, queries: &[PermissionQuery]) -> Vec<bool> {
        join_all(
            queries
                .iter()
                .map(|q| self.has_permission(user_id, &q.resource, &q.action, q.resource_id)),
        )
        .await
    }

    pub async fn require_permission(
        &self,
        user_id: Uuid,
        resource: &str,
        action: &str,
        resource_id: Option<Uuid>,
    ) -> AuthzResult<()> {
        if self.has_permission(user_id, resource, action, resource_id).await {
            Ok(())
        } else {
            Err(AuthzError::access_denied(resource, action))
        }
    }

    /// Capability listing for UI gating; conditions are not evaluated.
    pub async fn get_user_permissions(&self, user_id: Uuid) -> Vec<Permission> {
        match self.active_context(user_id).await {
            Some(ctx) => self.matrix.union_for(&ctx.roles),
            None => Vec::new(),
        }
    }

    pub async fn validate_organization_access(&self, user_id: Uuid, organization_id: Uuid) -> bool {
        self.active_context(user_id)
            .await
            .is_some_and(|ctx| ctx.organization_id == organization_id)
    }

    pub async fn get_role_context(&self, user_id: Uuid) -> Option<RoleContext> {
        self.active_context(user_id).await.map(|ctx| RoleContext::from(&ctx))
    }

    pub fn clear_permission_caches(&self) {
        self.assignments.clear_cache();
    }
}

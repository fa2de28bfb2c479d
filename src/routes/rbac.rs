//! RBAC API routes
//!
//! Capability introspection for the caller, ad-hoc permission checks, and
//! role mutation. Role changes are audited with Critical severity.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::organization::RoleContext;
use crate::models::profile::{Profile, Role};
use crate::models::rbac::*;

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        // Caller introspection
        .route("/me/permissions", get(my_permissions))
        .route("/me/role-context", get(my_role_context))
        // Checks
        .route("/check", post(check_permission))
        .route("/check/batch", post(check_permissions))
        // Role mutation
        .route("/users/:user_id/roles", post(assign_role))
        .route("/users/:user_id/roles/:role", delete(remove_role))
}

// =============================================================================
// INTROSPECTION
// =============================================================================

/// Union of the caller's role permissions, conditions not evaluated
#[utoipa::path(
    get,
    path = "/rbac/me/permissions",
    tag = "RBAC",
    responses(
        (status = 200, description = "Effective permissions", body = EffectivePermissions),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearerAuth" = []))
)]
async fn my_permissions(State(state): State<AppState>, caller: Caller) -> Json<EffectivePermissions> {
    let permissions = state.services.permissions.get_user_permissions(caller.user_id).await;
    Json(EffectivePermissions {
        user_id: caller.user_id,
        permissions,
    })
}

#[utoipa::path(
    get,
    path = "/rbac/me/role-context",
    tag = "RBAC",
    responses(
        (status = 200, description = "Active and available roles", body = RoleContext),
        (status = 404, description = "Caller has no active organization context"),
    ),
    security(("bearerAuth" = []))
)]
async fn my_role_context(State(state): State<AppState>, caller: Caller) -> AppResult<Json<RoleContext>> {
    state
        .services
        .permissions
        .get_role_context(caller.user_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::not_found("no active organization role context"))
}

// =============================================================================
// CHECKS
// =============================================================================

#[utoipa::path(
    post,
    path = "/rbac/check",
    tag = "RBAC",
    request_body = PermissionQuery,
    responses((status = 200, description = "Check result for the caller", body = PermissionCheckResponse)),
    security(("bearerAuth" = []))
)]
async fn check_permission(
    State(state): State<AppState>,
    caller: Caller,
    Json(query): Json<PermissionQuery>,
) -> Json<PermissionCheckResponse> {
    let allowed = state
        .services
        .permissions
        .has_permission(caller.user_id, &query.resource, &query.action, query.resource_id)
        .await;
    Json(PermissionCheckResponse { allowed })
}

/// Results are returned in request order
#[utoipa::path(
    post,
    path = "/rbac/check/batch",
    tag = "RBAC",
    request_body = Vec<PermissionQuery>,
    responses((status = 200, description = "One result per query", body = Vec<PermissionCheckResponse>)),
    security(("bearerAuth" = []))
)]
async fn check_permissions(
    State(state): State<AppState>,
    caller: Caller,
    Json(queries): Json<Vec<PermissionQuery>>,
) -> Json<Vec<PermissionCheckResponse>> {
    let results = state.services.permissions.has_permissions(caller.user_id, &queries).await;
    Json(results.into_iter().map(|allowed| PermissionCheckResponse { allowed }).collect())
}

// =============================================================================
// ROLE MUTATION
// =============================================================================

/// Add a role to a user (requires users:assign_roles)
#[utoipa::path(
    post,
    path = "/rbac/users/{user_id}/roles",
    tag = "RBAC",
    params(("user_id" = Uuid, Path, description = "Target user")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 400, description = "Unknown role name"),
        (status = 403, description = "Caller lacks users:assign_roles"),
        (status = 404, description = "Target user not found"),
    ),
    security(("bearerAuth" = []))
)]
async fn assign_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AssignRoleRequest>,
) -> AppResult<Json<Profile>> {
    let role: Role = req.role.parse()?;
    let profile = state.services.roles.assign_role(user_id, role, caller.user_id).await?;
    Ok(Json(profile))
}

/// Remove a role; a user left with none becomes a practitioner
#[utoipa::path(
    delete,
    path = "/rbac/users/{user_id}/roles/{role}",
    tag = "RBAC",
    params(
        ("user_id" = Uuid, Path, description = "Target user"),
        ("role" = String, Path, description = "Role name"),
    ),
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 400, description = "Unknown role name"),
        (status = 403, description = "Caller lacks users:assign_roles"),
        (status = 404, description = "Target user not found"),
    ),
    security(("bearerAuth" = []))
)]
async fn remove_role(
    State(state): State<AppState>,
    caller: Caller,
    Path((user_id, role)): Path<(Uuid, String)>,
) -> AppResult<Json<Profile>> {
    let role: Role = role.parse()?;
    let profile = state.services.roles.remove_role(user_id, role, caller.user_id).await?;
    Ok(Json(profile))
}

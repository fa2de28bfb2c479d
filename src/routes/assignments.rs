//! Practitioner ↔ supervisor assignment routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::Caller;
use crate::models::assignment::{Assignment, NewAssignment, ReassignRequest, RemoveAssignmentRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/assignments", post(create_assignment))
        .route("/assignments/reassign", post(reassign_practitioner))
        .route("/assignments/:id", delete(remove_assignment))
        .route("/practitioners/:id/assignments", get(assignment_history))
        .route("/organizations/:id/assignments", get(organization_assignments))
        .route("/supervisors/:id/assignments", get(supervisor_assignments))
}

/// `assigned_by` is always the caller
#[utoipa::path(
    post,
    path = "/assignments",
    tag = "Assignments",
    request_body = NewAssignment,
    responses(
        (status = 201, description = "Assignment created", body = Assignment),
        (status = 400, description = "Invalid assignment"),
        (status = 403, description = "Caller may not manage assignments in this organization"),
        (status = 404, description = "Practitioner or supervisor not found"),
        (status = 409, description = "Practitioner already has an active supervisor in this role"),
    ),
    security(("bearerAuth" = []))
)]
async fn create_assignment(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<NewAssignment>,
) -> AppResult<(StatusCode, Json<Assignment>)> {
    let assignment = state
        .services
        .assignments
        .create_assignment(body, caller.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    delete,
    path = "/assignments/{id}",
    tag = "Assignments",
    params(
        ("id" = Uuid, Path, description = "Assignment id"),
        ("reason" = Option<String>, Query, description = "Why the assignment ended"),
    ),
    responses(
        (status = 200, description = "Deactivated assignment", body = Assignment),
        (status = 403, description = "Caller may not manage assignments in this organization"),
        (status = 404, description = "No active assignment with this id"),
    ),
    security(("bearerAuth" = []))
)]
async fn remove_assignment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<RemoveAssignmentRequest>,
) -> AppResult<Json<Assignment>> {
    let removed = state
        .services
        .assignments
        .remove_assignment(id, caller.user_id, query.reason)
        .await?;
    Ok(Json(removed))
}

#[utoipa::path(
    post,
    path = "/assignments/reassign",
    tag = "Assignments",
    request_body = ReassignRequest,
    responses(
        (status = 201, description = "New active assignment", body = Assignment),
        (status = 400, description = "Invalid assignment"),
        (status = 403, description = "Caller may not manage assignments in this organization"),
        (status = 404, description = "Practitioner or supervisor not found"),
    ),
    security(("bearerAuth" = []))
)]
async fn reassign_practitioner(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<ReassignRequest>,
) -> AppResult<(StatusCode, Json<Assignment>)> {
    let assignment = state
        .services
        .assignments
        .reassign_practitioner(body, caller.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    get,
    path = "/practitioners/{id}/assignments",
    tag = "Assignments",
    params(("id" = Uuid, Path, description = "Practitioner id")),
    responses((status = 200, description = "All assignments, newest first", body = Vec<Assignment>)),
    security(("bearerAuth" = []))
)]
async fn assignment_history(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Assignment>>> {
    let rows = state.services.assignments.get_assignment_history(id, caller.user_id).await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/organizations/{id}/assignments",
    tag = "Assignments",
    params(("id" = Uuid, Path, description = "Organization id")),
    responses((status = 200, description = "Active assignments in the organization", body = Vec<Assignment>)),
    security(("bearerAuth" = []))
)]
async fn organization_assignments(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Assignment>>> {
    let rows = state
        .services
        .assignments
        .get_organization_assignments(id, caller.user_id)
        .await?;
    Ok(Json(rows))
}

#[utoipa::path(
    get,
    path = "/supervisors/{id}/assignments",
    tag = "Assignments",
    params(("id" = Uuid, Path, description = "Supervisor id")),
    responses((status = 200, description = "Active caseload in both supervising roles", body = Vec<Assignment>)),
    security(("bearerAuth" = []))
)]
async fn supervisor_assignments(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Assignment>>> {
    let rows = state
        .services
        .assignments
        .get_supervisor_assignments(id, caller.user_id)
        .await?;
    Ok(Json(rows))
}

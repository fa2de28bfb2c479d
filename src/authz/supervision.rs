use std::sync::Arc;

use uuid::Uuid;

use crate::errors::{AuthzError, AuthzResult};
use crate::events::{log_activity, EventBus};
use crate::models::assignment::{validate_assignment, Assignment, NewAssignment, ReassignRequest};
use crate::models::profile::{Profile, SupervisorRole};
use crate::store::AssignmentStore;

use super::evaluator::PermissionService;
use super::{actions, resources};

pub const DEFAULT_REASSIGN_REASON: &str = "Reassigned to new supervisor";

/// Practitioner ↔ supervisor assignment management.
///
/// Every operation requires `users:manage_assignments` and membership of the
/// organization the assignment lives in.
#[derive(Clone)]
pub struct AssignmentService {
    permissions: PermissionService,
    store: Arc<dyn AssignmentStore>,
    events: EventBus,
}

impl AssignmentService {
    pub fn new(permissions: PermissionService, store: Arc<dyn AssignmentStore>, events: EventBus) -> Self {
        Self {
            permissions,
            store,
            events,
        }
    }

    async fn authorize(&self, caller: Uuid, organization_id: Uuid) -> AuthzResult<()> {
        self.permissions
            .require_permission(caller, resources::USERS, actions::MANAGE_ASSIGNMENTS, None)
            .await?;

        if !self.permissions.validate_organization_access(caller, organization_id).await {
            return Err(AuthzError::access_denied(resources::ORGANIZATION, actions::MANAGE_ASSIGNMENTS));
        }
        Ok(())
    }

    /// Both parties must exist in the organization, and the supervisor must
    /// hold the supervising role.
    async fn check_parties(&self, data: &NewAssignment) -> AuthzResult<()> {
        let contexts = self.permissions.contexts();
        let practitioner = contexts.get_profile(data.practitioner_id).await?;
        let supervisor = contexts.get_profile(data.supervisor_id).await?;

        ensure_member(&practitioner, data.organization_id, "Practitioner")?;
        ensure_member(&supervisor, data.organization_id, "Supervisor")?;

        if !supervisor.has_role(data.supervisor_role.as_role()) {
            return Err(AuthzError::validation(format!(
                "Supervisor does not hold the {} role",
                data.supervisor_role
            )));
        }
        Ok(())
    }

    pub async fn create_assignment(&self, mut data: NewAssignment, assigned_by: Uuid) -> AuthzResult<Assignment> {
        data.assigned_by = assigned_by;
        reject_invalid(&data)?;
        self.authorize(assigned_by, data.organization_id).await?;
        self.check_parties(&data).await?;

        let assignment = self.store.create(data).await?;
        self.permissions
            .assignments()
            .invalidate(assignment.supervisor_id, assignment.supervisor_role);

        tracing::info!(
            assignment_id = %assignment.id,
            practitioner_id = %assignment.practitioner_id,
            supervisor_id = %assignment.supervisor_id,
            role = %assignment.supervisor_role,
            "assignment created"
        );
        log_activity(&self.events, "created", Some(assigned_by), &assignment);
        Ok(assignment)
    }

    /// Deactivates; history is never deleted.
    pub async fn remove_assignment(
        &self,
        assignment_id: Uuid,
        removed_by: Uuid,
        reason: Option<String>,
    ) -> AuthzResult<Assignment> {
        let existing = self
            .store
            .get(assignment_id)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("assignment {}", assignment_id)))?;
        self.authorize(removed_by, existing.organization_id).await?;

        let removed = self
            .store
            .deactivate(assignment_id, removed_by, reason)
            .await?
            .ok_or_else(|| AuthzError::not_found(format!("active assignment {}", assignment_id)))?;
        self.permissions
            .assignments()
            .invalidate(removed.supervisor_id, removed.supervisor_role);

        tracing::info!(assignment_id = %removed.id, removed_by = %removed_by, "assignment removed");
        log_activity(&self.events, "removed", Some(removed_by), &removed);
        Ok(removed)
    }

    /// Replaces the practitioner's active supervisor for the role in one
    /// transaction.
    pub async fn reassign_practitioner(&self, request: ReassignRequest, assigned_by: Uuid) -> AuthzResult<Assignment> {
        let data = NewAssignment {
            practitioner_id: request.practitioner_id,
            supervisor_id: request.new_supervisor_id,
            supervisor_role: request.supervisor_role,
            organization_id: request.organization_id,
            assigned_by,
        };
        reject_invalid(&data)?;
        self.authorize(assigned_by, data.organization_id).await?;
        self.check_parties(&data).await?;

        let reason = request.reason.unwrap_or_else(|| DEFAULT_REASSIGN_REASON.to_string());
        let (previous, assignment) = self.store.replace(data, reason).await?;

        let resolver = self.permissions.assignments();
        if let Some(previous) = &previous {
            resolver.invalidate(previous.supervisor_id, previous.supervisor_role);
            log_activity(&self.events, "removed", Some(assigned_by), previous);
        }
        resolver.invalidate(assignment.supervisor_id, assignment.supervisor_role);

        tracing::info!(
            practitioner_id = %assignment.practitioner_id,
            previous_supervisor = ?previous.as_ref().map(|p| p.supervisor_id),
            new_supervisor = %assignment.supervisor_id,
            role = %assignment.supervisor_role,
            "practitioner reassigned"
        );
        log_activity(&self.events, "reassigned", Some(assigned_by), &assignment);
        Ok(assignment)
    }

    /// Every assignment the practitioner has had, newest first.
    pub async fn get_assignment_history(&self, practitioner_id: Uuid, caller: Uuid) -> AuthzResult<Vec<Assignment>> {
        let practitioner = self.permissions.contexts().get_profile(practitioner_id).await?;
        let organization_id = practitioner
            .organization_id
            .ok_or_else(|| AuthzError::access_denied(resources::ORGANIZATION, actions::MANAGE_ASSIGNMENTS))?;
        self.authorize(caller, organization_id).await?;

        Ok(self.store.list_for_practitioner(practitioner_id).await?)
    }

    pub async fn get_organization_assignments(&self, organization_id: Uuid, caller: Uuid) -> AuthzResult<Vec<Assignment>> {
        self.authorize(caller, organization_id).await?;
        Ok(self.store.list_for_organization(organization_id).await?)
    }

    /// Active caseload in both supervising roles. Active supervisors may
    /// read their own.
    pub async fn get_supervisor_assignments(&self, supervisor_id: Uuid, caller: Uuid) -> AuthzResult<Vec<Assignment>> {
        if caller == supervisor_id {
            let active = self
                .permissions
                .contexts()
                .get_organization_context(caller)
                .await
                .is_some_and(|ctx| ctx.is_active);
            if !active {
                return Err(AuthzError::access_denied(resources::ORGANIZATION, actions::MANAGE_ASSIGNMENTS));
            }
        } else {
            let supervisor = self.permissions.contexts().get_profile(supervisor_id).await?;
            let organization_id = supervisor
                .organization_id
                .ok_or_else(|| AuthzError::access_denied(resources::ORGANIZATION, actions::MANAGE_ASSIGNMENTS))?;
            self.authorize(caller, organization_id).await?;
        }

        let mut rows = self.store.list_active(supervisor_id, SupervisorRole::Coach).await?;
        rows.extend(self.store.list_active(supervisor_id, SupervisorRole::Therapist).await?);
        Ok(rows)
    }
}

fn reject_invalid(data: &NewAssignment) -> AuthzResult<()> {
    let errors = validate_assignment(data);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AuthzError::validation(errors.join("; ")))
    }
}

fn ensure_member(profile: &Profile, organization_id: Uuid, who: &str) -> AuthzResult<()> {
    if profile.organization_id == Some(organization_id) {
        Ok(())
    } else {
        Err(AuthzError::validation(format!("{} is not a member of this organization", who)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{AssignmentResolver, AuthzConfig, OrganizationContextResolver};
    use crate::cache::SystemClock;
    use crate::events::init_event_bus;
    use crate::models::profile::Role;
    use crate::store::memory::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        permissions: PermissionService,
        service: AssignmentService,
        events: EventBus,
        org: Uuid,
        admin: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let assignments = AssignmentResolver::with_config(store.clone(), AuthzConfig::default(), Arc::new(SystemClock));
        let permissions = PermissionService::new(OrganizationContextResolver::new(store.clone()), assignments);
        let (events, _rx) = init_event_bus();
        let org = Uuid::new_v4();

        let fx = Fixture {
            service: AssignmentService::new(permissions.clone(), store.clone(), events.clone()),
            permissions,
            store,
            events,
            org,
            admin: Uuid::nil(),
        };
        let admin = fx.member([Role::Admin]);
        Fixture { admin, ..fx }
    }

    impl Fixture {
        fn member(&self, roles: impl IntoIterator<Item = Role>) -> Uuid {
            let profile = Profile::new(Uuid::new_v4()).with_roles(roles).in_organization(self.org);
            let id = profile.id;
            self.store.put_profile(profile);
            id
        }

        fn request(&self, practitioner: Uuid, supervisor: Uuid, role: SupervisorRole) -> NewAssignment {
            NewAssignment {
                practitioner_id: practitioner,
                supervisor_id: supervisor,
                supervisor_role: role,
                organization_id: self.org,
                assigned_by: Uuid::nil(),
            }
        }

        async fn can_read(&self, supervisor: Uuid, practitioner: Uuid) -> bool {
            self.permissions
                .has_permission(supervisor, resources::PRACTITIONER_DATA, actions::READ, Some(practitioner))
                .await
        }
    }

    #[tokio::test]
    async fn created_assignment_grants_access_immediately() {
        let fx = fixture();
        let coach = fx.member([Role::Coach]);
        let practitioner = fx.member([Role::Practitioner]);
        let other = fx.member([Role::Practitioner]);

        // prime the cache with an empty caseload
        assert!(!fx.can_read(coach, practitioner).await);

        let row = fx
            .service
            .create_assignment(fx.request(practitioner, coach, SupervisorRole::Coach), fx.admin)
            .await
            .unwrap();
        assert_eq!(row.assigned_by, fx.admin);
        assert!(row.active);

        assert!(fx.can_read(coach, practitioner).await);
        assert!(!fx.can_read(coach, other).await);

        fx.service.remove_assignment(row.id, fx.admin, Some("caseload rebalance".into())).await.unwrap();
        assert!(!fx.can_read(coach, practitioner).await);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_with_every_message() {
        let fx = fixture();
        let same = fx.member([Role::Coach]);
        let mut data = fx.request(same, same, SupervisorRole::Coach);
        data.organization_id = Uuid::nil();

        match fx.service.create_assignment(data, fx.admin).await.unwrap_err() {
            AuthzError::Validation(msg) => {
                assert!(msg.contains("Organization ID is required"));
                assert!(msg.contains("Practitioner and supervisor cannot be the same person"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn supervisor_must_hold_the_role() {
        let fx = fixture();
        let therapist = fx.member([Role::Therapist]);
        let practitioner = fx.member([Role::Practitioner]);

        let err = fx
            .service
            .create_assignment(fx.request(practitioner, therapist, SupervisorRole::Coach), fx.admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Validation(_)));
    }

    #[tokio::test]
    async fn second_active_supervisor_in_role_conflicts() {
        let fx = fixture();
        let (c1, c2) = (fx.member([Role::Coach]), fx.member([Role::Coach]));
        let therapist = fx.member([Role::Therapist]);
        let practitioner = fx.member([Role::Practitioner]);

        fx.service
            .create_assignment(fx.request(practitioner, c1, SupervisorRole::Coach), fx.admin)
            .await
            .unwrap();
        fx.service
            .create_assignment(fx.request(practitioner, therapist, SupervisorRole::Therapist), fx.admin)
            .await
            .unwrap();

        let err = fx
            .service
            .create_assignment(fx.request(practitioner, c2, SupervisorRole::Coach), fx.admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Conflict(_)));
    }

    #[tokio::test]
    async fn reassign_moves_access_and_keeps_history() {
        let fx = fixture();
        let mut rx = fx.events.subscribe();
        let (c1, c2) = (fx.member([Role::Coach]), fx.member([Role::Coach]));
        let practitioner = fx.member([Role::Practitioner]);

        fx.service
            .create_assignment(fx.request(practitioner, c1, SupervisorRole::Coach), fx.admin)
            .await
            .unwrap();
        assert!(fx.can_read(c1, practitioner).await);

        let moved = fx
            .service
            .reassign_practitioner(
                ReassignRequest {
                    practitioner_id: practitioner,
                    new_supervisor_id: c2,
                    supervisor_role: SupervisorRole::Coach,
                    organization_id: fx.org,
                    reason: None,
                },
                fx.admin,
            )
            .await
            .unwrap();
        assert_eq!(moved.supervisor_id, c2);

        assert!(!fx.can_read(c1, practitioner).await);
        assert!(fx.can_read(c2, practitioner).await);

        let history = fx.service.get_assignment_history(practitioner, fx.admin).await.unwrap();
        assert_eq!(history.len(), 2);
        let old = history.iter().find(|a| a.supervisor_id == c1).unwrap();
        assert!(!old.active);
        assert_eq!(old.reason.as_deref(), Some(DEFAULT_REASSIGN_REASON));

        let names: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.name).collect();
        assert_eq!(names, vec!["assignment.created", "assignment.removed", "assignment.reassigned"]);
    }

    #[tokio::test]
    async fn callers_outside_the_organization_are_refused() {
        let fx = fixture();
        let coach = fx.member([Role::Coach]);
        let practitioner = fx.member([Role::Practitioner]);

        let outsider = Profile::new(Uuid::new_v4()).with_roles([Role::Admin]).in_organization(Uuid::new_v4());
        fx.store.put_profile(outsider.clone());

        let err = fx
            .service
            .create_assignment(fx.request(practitioner, coach, SupervisorRole::Coach), outsider.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::AccessDenied { ref resource, .. } if resource == "organization"));

        let err = fx.service.get_organization_assignments(fx.org, coach).await.unwrap_err();
        assert!(matches!(err, AuthzError::AccessDenied { ref action, .. } if action == "manage_assignments"));
    }

    #[tokio::test]
    async fn supervisors_read_their_own_caseload() {
        let fx = fixture();
        let supervisor = fx.member([Role::Coach, Role::Therapist]);
        let (p1, p2) = (fx.member([Role::Practitioner]), fx.member([Role::Practitioner]));

        fx.service
            .create_assignment(fx.request(p1, supervisor, SupervisorRole::Coach), fx.admin)
            .await
            .unwrap();
        fx.service
            .create_assignment(fx.request(p2, supervisor, SupervisorRole::Therapist), fx.admin)
            .await
            .unwrap();

        let caseload = fx.service.get_supervisor_assignments(supervisor, supervisor).await.unwrap();
        assert_eq!(caseload.len(), 2);

        let org_rows = fx.service.get_organization_assignments(fx.org, fx.admin).await.unwrap();
        assert_eq!(org_rows.len(), 2);
    }

    #[tokio::test]
    async fn inactive_or_missing_supervisor_cannot_read_own_caseload() {
        let fx = fixture();
        let practitioner = fx.member([Role::Practitioner]);
        let coach = Profile::new(Uuid::new_v4()).with_roles([Role::Coach]).in_organization(fx.org);
        fx.store.put_profile(coach.clone());
        fx.service
            .create_assignment(fx.request(practitioner, coach.id, SupervisorRole::Coach), fx.admin)
            .await
            .unwrap();

        fx.store.put_profile(coach.clone().inactive());
        let err = fx.service.get_supervisor_assignments(coach.id, coach.id).await.unwrap_err();
        assert!(matches!(err, AuthzError::AccessDenied { .. }));

        let ghost = Uuid::new_v4();
        let err = fx.service.get_supervisor_assignments(ghost, ghost).await.unwrap_err();
        assert!(matches!(err, AuthzError::AccessDenied { .. }));
    }
}

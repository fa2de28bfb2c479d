use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::profile::{Role, RoleSet, SupervisorRole};
use crate::models::rbac::Permission;

use super::actions::*;
use super::resources::*;

/// Immutable role → permission table.
#[derive(Debug, Clone, Default)]
pub struct PermissionMatrix {
    entries: HashMap<Role, Vec<Permission>>,
}

impl PermissionMatrix {
    pub fn new(entries: HashMap<Role, Vec<Permission>>) -> Self {
        Self { entries }
    }

    /// The platform's built-in matrix.
    pub fn standard() -> &'static PermissionMatrix {
        static MATRIX: OnceLock<PermissionMatrix> = OnceLock::new();
        MATRIX.get_or_init(build_standard)
    }

    pub fn for_role(&self, role: Role) -> &[Permission] {
        self.entries.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Entries held by `roles` that match `resource`/`action`, across every role.
    pub fn matching<'a>(
        &'a self,
        roles: &'a RoleSet,
        resource: &'a str,
        action: &'a str,
    ) -> impl Iterator<Item = &'a Permission> + 'a {
        roles
            .iter()
            .flat_map(move |role| self.for_role(role).iter())
            .filter(move |p| p.matches(resource, action))
    }

    /// Union of the roles' entries, de-duplicated on (resource, action); the
    /// first occurrence wins. Conditions are carried but not evaluated.
    pub fn union_for(&self, roles: &RoleSet) -> Vec<Permission> {
        let mut out: Vec<Permission> = Vec::new();
        for role in roles.iter() {
            for permission in self.for_role(role) {
                if !out.iter().any(|p| p.matches(&permission.resource, &permission.action)) {
                    out.push(permission.clone());
                }
            }
        }
        out
    }
}

fn build_standard() -> PermissionMatrix {
    use SupervisorRole::{Coach, Therapist};

    let mut entries = HashMap::new();

    entries.insert(
        Role::Admin,
        vec![
            Permission::new(ORGANIZATION, READ),
            Permission::new(ORGANIZATION, UPDATE),
            Permission::new(ORGANIZATION, DELETE),
            Permission::new(ORGANIZATION, MANAGE_SETTINGS),
            Permission::new(USERS, READ),
            Permission::new(USERS, INVITE),
            Permission::new(USERS, ARCHIVE),
            Permission::new(USERS, REACTIVATE),
            Permission::new(USERS, ASSIGN_ROLES),
            Permission::new(USERS, MANAGE_ASSIGNMENTS),
            Permission::new(PRACTITIONER_DATA, READ),
            Permission::new(PRACTITIONER_DATA, WRITE),
            Permission::new(REPORTS, READ),
            Permission::new(REPORTS, GENERATE),
            Permission::new(ANALYTICS, READ),
            Permission::new(BILLING, READ),
            Permission::new(BILLING, MANAGE),
        ],
    );

    entries.insert(
        Role::Therapist,
        vec![
            Permission::assigned(PRACTITIONER_DATA, READ, Therapist),
            Permission::assigned(PRACTITIONER_DATA, WRITE, Therapist),
            Permission::new(CLINICAL_NOTES, READ),
            Permission::new(CLINICAL_NOTES, WRITE),
            Permission::assigned(REPORTS, READ, Therapist),
            Permission::assigned(REPORTS, GENERATE, Therapist),
            Permission::new(COACH_COLLABORATION, READ),
            Permission::new(COACH_COLLABORATION, WRITE),
        ],
    );

    entries.insert(
        Role::Coach,
        vec![
            Permission::assigned(PRACTITIONER_DATA, READ, Coach),
            Permission::new(PRACTITIONER_GUIDANCE, READ),
            Permission::new(PRACTITIONER_GUIDANCE, WRITE),
            Permission::new(PRACTITIONER_MESSAGES, READ),
            Permission::new(PRACTITIONER_MESSAGES, WRITE),
            Permission::new(PROGRESS_TRACKING, READ),
            Permission::assigned(REPORTS, READ, Coach),
            Permission::new(THERAPIST_COLLABORATION, READ),
        ],
    );

    entries.insert(
        Role::Practitioner,
        vec![
            Permission::self_only(PRACTITIONER_DATA, READ),
            Permission::self_only(PRACTITIONER_DATA, WRITE),
            Permission::new(VIRTUE_TOOLS, READ),
            Permission::new(VIRTUE_TOOLS, USE),
            Permission::new(JOURNAL, READ),
            Permission::new(JOURNAL, WRITE),
            Permission::new(ASSESSMENTS, TAKE),
            Permission::new(SUPERVISOR_COMMUNICATION, READ),
            Permission::new(SUPERVISOR_COMMUNICATION, WRITE),
            Permission::self_only(REPORTS, READ),
        ],
    );

    PermissionMatrix::new(entries)
}

//! Authorization core - permission matrix, assignment-scoped conditions and
//! role mutation.
//!
//! - Static role → permission matrix evaluated with union-of-roles semantics
//! - Assignment-scoped supervisor access with a TTL cache
//! - Default deny: missing, org-less or inactive identities are refused
//! - Role mutations gated on `users:assign_roles`

mod assignments;
mod context;
mod evaluator;
mod matrix;
mod roles;
mod supervision;

pub use assignments::{AssignmentCache, AssignmentResolver};
pub use context::OrganizationContextResolver;
pub use evaluator::{MatrixEvaluator, PermissionService, PolicyEvaluator};
pub use matrix::PermissionMatrix;
pub use roles::RoleMutationService;
pub use supervision::AssignmentService;

use chrono::Duration;

use crate::errors::AppError;

const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Tunables for the authorization caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthzConfig {
    pub cache_ttl: Duration,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::seconds(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl AuthzConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secs = std::env::var("AUTHZ_CACHE_TTL_SECS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(DEFAULT_CACHE_TTL_SECS))
            .map_err(|_| AppError::configuration("AUTHZ_CACHE_TTL_SECS must be a valid integer"))?;

        if secs < 0 {
            return Err(AppError::configuration("AUTHZ_CACHE_TTL_SECS must not be negative"));
        }

        Ok(Self {
            cache_ttl: Duration::seconds(secs),
        })
    }
}

/// Well-known resource names
pub mod resources {
    pub const ORGANIZATION: &str = "organization";
    pub const USERS: &str = "users";
    pub const PRACTITIONER_DATA: &str = "practitioner_data";
    pub const REPORTS: &str = "reports";
    pub const ANALYTICS: &str = "analytics";
    pub const BILLING: &str = "billing";
    pub const CLINICAL_NOTES: &str = "clinical_notes";
    pub const COACH_COLLABORATION: &str = "coach_collaboration";
    pub const THERAPIST_COLLABORATION: &str = "therapist_collaboration";
    pub const PRACTITIONER_GUIDANCE: &str = "practitioner_guidance";
    pub const PRACTITIONER_MESSAGES: &str = "practitioner_messages";
    pub const PROGRESS_TRACKING: &str = "progress_tracking";
    pub const VIRTUE_TOOLS: &str = "virtue_tools";
    pub const JOURNAL: &str = "journal";
    pub const ASSESSMENTS: &str = "assessments";
    pub const SUPERVISOR_COMMUNICATION: &str = "supervisor_communication";
}

/// Well-known action names
pub mod actions {
    pub const READ: &str = "read";
    pub const WRITE: &str = "write";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const MANAGE_SETTINGS: &str = "manage_settings";
    pub const INVITE: &str = "invite";
    pub const ARCHIVE: &str = "archive";
    pub const REACTIVATE: &str = "reactivate";
    pub const ASSIGN_ROLES: &str = "assign_roles";
    pub const MANAGE_ASSIGNMENTS: &str = "manage_assignments";
    pub const GENERATE: &str = "generate";
    pub const MANAGE: &str = "manage";
    pub const USE: &str = "use";
    pub const TAKE: &str = "take";
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AuthzError;

// =============================================================================
// ROLE
// =============================================================================

/// Closed set of roles known to the permission matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Therapist,
    Coach,
    Practitioner,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Therapist, Role::Coach, Role::Practitioner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Therapist => "therapist",
            Role::Coach => "coach",
            Role::Practitioner => "practitioner",
        }
    }

    /// The supervising flavour of this role, if it has one.
    pub fn as_supervisor(&self) -> Option<SupervisorRole> {
        match self {
            Role::Coach => Some(SupervisorRole::Coach),
            Role::Therapist => Some(SupervisorRole::Therapist),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "therapist" => Ok(Role::Therapist),
            "coach" => Ok(Role::Coach),
            "practitioner" => Ok(Role::Practitioner),
            other => Err(AuthzError::validation(format!("invalid role name: {other}"))),
        }
    }
}

/// Roles that can be granted assignment-scoped access to practitioners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorRole {
    Coach,
    Therapist,
}

impl SupervisorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorRole::Coach => "coach",
            SupervisorRole::Therapist => "therapist",
        }
    }

    pub fn as_role(&self) -> Role {
        match self {
            SupervisorRole::Coach => Role::Coach,
            SupervisorRole::Therapist => Role::Therapist,
        }
    }
}

impl fmt::Display for SupervisorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SupervisorRole {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coach" => Ok(SupervisorRole::Coach),
            "therapist" => Ok(SupervisorRole::Therapist),
            _ => Err(AuthzError::validation(
                "Valid supervisor role (coach or therapist) is required",
            )),
        }
    }
}

// =============================================================================
// ROLE SET
// =============================================================================

/// Ordered, de-duplicated, never-empty collection of roles.
///
/// The first role is the user's primary role. Every constructor that could
/// yield an empty set substitutes `{practitioner}` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    pub fn practitioner() -> Self {
        Self(vec![Role::Practitioner])
    }

    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut out: Vec<Role> = Vec::new();
        for role in roles {
            if !out.contains(&role) {
                out.push(role);
            }
        }
        if out.is_empty() {
            return Self::practitioner();
        }
        Self(out)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn primary(&self) -> Role {
        // invariant: never empty
        self.0.first().copied().unwrap_or(Role::Practitioner)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Role] {
        &self.0
    }

    /// Returns the set with `role` appended, or `None` when already present.
    pub fn with(&self, role: Role) -> Option<Self> {
        if self.contains(role) {
            return None;
        }
        let mut roles = self.0.clone();
        roles.push(role);
        Some(Self(roles))
    }

    /// Returns the set without `role`, or `None` when it was not present.
    /// Removing the last role leaves `{practitioner}`.
    pub fn without(&self, role: Role) -> Option<Self> {
        if !self.contains(role) {
            return None;
        }
        Some(Self::from_roles(self.0.iter().copied().filter(|r| *r != role)))
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let roles = Vec::<Role>::deserialize(deserializer)?;
        Ok(RoleSet::from_roles(roles))
    }
}

impl Default for RoleSet {
    fn default() -> Self {
        Self::practitioner()
    }
}

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: Option<String>,
    #[schema(value_type = Vec<Role>)]
    pub roles: RoleSet,
    pub organization_id: Option<Uuid>,
    pub is_active: bool,
    pub last_activity: Option<DateTime<Utc>>,
    pub current_virtue_id: Option<i64>,
    pub current_stage: Option<i64>,
}

impl Profile {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            full_name: None,
            roles: RoleSet::practitioner(),
            organization_id: None,
            is_active: true,
            last_activity: None,
            current_virtue_id: None,
            current_stage: None,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = RoleSet::from_roles(roles);
        self
    }

    pub fn in_organization(mut self, organization_id: Uuid) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }
}

/// Partial update applied by `ProfileStore::update`; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub roles: Option<RoleSet>,
    pub is_active: Option<bool>,
    pub full_name: Option<Option<String>>,
}

impl ProfileUpdate {
    pub fn roles(roles: RoleSet) -> Self {
        Self {
            roles: Some(roles),
            ..Self::default()
        }
    }

    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_none() && self.is_active.is_none() && self.full_name.is_none()
    }
}

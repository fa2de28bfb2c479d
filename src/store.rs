//! Storage seams consumed by the authorization core.
//!
//! Implementations are always injected; production code wires the SQLite
//! stores from `crate::db`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::assignment::{Assignment, NewAssignment};
use crate::models::profile::{Profile, ProfileUpdate, SupervisorRole};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` when no profile exists for `user_id`.
    async fn get(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;

    /// Applies the non-empty fields of `update`. Returns `false` when the profile does not exist.
    async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get(&self, assignment_id: Uuid) -> Result<Option<Assignment>, StoreError>;

    /// Active assignments held by `supervisor_id` in `role`.
    async fn list_active(&self, supervisor_id: Uuid, role: SupervisorRole) -> Result<Vec<Assignment>, StoreError>;

    /// Every assignment (active or not) for a practitioner, newest first.
    async fn list_for_practitioner(&self, practitioner_id: Uuid) -> Result<Vec<Assignment>, StoreError>;

    /// Active assignments inside an organization.
    async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<Assignment>, StoreError>;

    /// Fails with `StoreError::Conflict` when `(practitioner, role)` already has an active assignment.
    async fn create(&self, assignment: NewAssignment) -> Result<Assignment, StoreError>;

    /// Marks an active assignment inactive. `Ok(None)` when it does not exist or is already inactive.
    async fn deactivate(
        &self,
        assignment_id: Uuid,
        removed_by: Uuid,
        reason: Option<String>,
    ) -> Result<Option<Assignment>, StoreError>;

    /// Deactivates the active `(practitioner, role)` assignment, if any, and
    /// creates `assignment` in the same transaction. Returns the replaced
    /// assignment alongside the new one.
    async fn replace(
        &self,
        assignment: NewAssignment,
        reason: String,
    ) -> Result<(Option<Assignment>, Assignment), StoreError>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-process store double with a switch for simulating outages.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    #[derive(Default)]
    pub struct MemoryStore {
        profiles: Mutex<HashMap<Uuid, Profile>>,
        assignments: Mutex<Vec<Assignment>>,
        failing: AtomicBool,
        pub list_active_calls: AtomicUsize,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn put_profile(&self, profile: Profile) {
            self.profiles.lock().unwrap().insert(profile.id, profile);
        }

        pub fn profile(&self, user_id: Uuid) -> Option<Profile> {
            self.profiles.lock().unwrap().get(&user_id).cloned()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }

        fn deactivate_locked(
            rows: &mut [Assignment],
            pred: impl Fn(&Assignment) -> bool,
            removed_by: Uuid,
            reason: Option<String>,
        ) -> Option<Assignment> {
            let row = rows.iter_mut().find(|a| a.active && pred(a))?;
            row.active = false;
            row.removed_at = Some(Utc::now());
            row.removed_by = Some(removed_by);
            row.reason = reason;
            Some(row.clone())
        }
    }

    #[async_trait]
    impl ProfileStore for MemoryStore {
        async fn get(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
            self.check()?;
            Ok(self.profile(user_id))
        }

        async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> Result<bool, StoreError> {
            self.check()?;
            let mut profiles = self.profiles.lock().unwrap();
            let Some(profile) = profiles.get_mut(&user_id) else {
                return Ok(false);
            };
            if let Some(roles) = update.roles {
                profile.roles = roles;
            }
            if let Some(is_active) = update.is_active {
                profile.is_active = is_active;
            }
            if let Some(full_name) = update.full_name {
                profile.full_name = full_name;
            }
            Ok(true)
        }
    }

    #[async_trait]
    impl AssignmentStore for MemoryStore {
        async fn get(&self, assignment_id: Uuid) -> Result<Option<Assignment>, StoreError> {
            self.check()?;
            Ok(self.assignments.lock().unwrap().iter().find(|a| a.id == assignment_id).cloned())
        }

        async fn list_active(&self, supervisor_id: Uuid, role: SupervisorRole) -> Result<Vec<Assignment>, StoreError> {
            self.list_active_calls.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            Ok(self
                .assignments
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.active && a.supervisor_id == supervisor_id && a.supervisor_role == role)
                .cloned()
                .collect())
        }

        async fn list_for_practitioner(&self, practitioner_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
            self.check()?;
            let mut rows: Vec<Assignment> = self
                .assignments
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.practitioner_id == practitioner_id)
                .cloned()
                .collect();
            rows.reverse();
            Ok(rows)
        }

        async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
            self.check()?;
            Ok(self
                .assignments
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.active && a.organization_id == organization_id)
                .cloned()
                .collect())
        }

        async fn create(&self, assignment: NewAssignment) -> Result<Assignment, StoreError> {
            self.check()?;
            let mut rows = self.assignments.lock().unwrap();
            let taken = rows.iter().any(|a| {
                a.active && a.practitioner_id == assignment.practitioner_id && a.supervisor_role == assignment.supervisor_role
            });
            if taken {
                return Err(StoreError::Conflict("practitioner already has an active supervisor in this role".into()));
            }
            let row = assignment.into_assignment(Uuid::new_v4(), Utc::now());
            rows.push(row.clone());
            Ok(row)
        }

        async fn deactivate(
            &self,
            assignment_id: Uuid,
            removed_by: Uuid,
            reason: Option<String>,
        ) -> Result<Option<Assignment>, StoreError> {
            self.check()?;
            let mut rows = self.assignments.lock().unwrap();
            Ok(Self::deactivate_locked(&mut rows, |a| a.id == assignment_id, removed_by, reason))
        }

        async fn replace(
            &self,
            assignment: NewAssignment,
            reason: String,
        ) -> Result<(Option<Assignment>, Assignment), StoreError> {
            self.check()?;
            let mut rows = self.assignments.lock().unwrap();
            let previous = Self::deactivate_locked(
                &mut rows,
                |a| a.practitioner_id == assignment.practitioner_id && a.supervisor_role == assignment.supervisor_role,
                assignment.assigned_by,
                Some(reason),
            );
            let row = assignment.into_assignment(Uuid::new_v4(), Utc::now());
            rows.push(row.clone());
            Ok((previous, row))
        }
    }
}

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::{Cache, Clock, TtlCache};
use crate::models::profile::SupervisorRole;
use crate::store::AssignmentStore;

use super::AuthzConfig;

/// Active practitioner ids keyed by `(supervisor, role)`.
pub type AssignmentCache = dyn Cache<(Uuid, SupervisorRole), Vec<Uuid>>;

/// Answers "does this supervisor currently hold this practitioner in this role".
///
/// Lists are cached per supervisor and role so a dashboard checking many
/// practitioners for one coach costs a single store query per TTL window.
#[derive(Clone)]
pub struct AssignmentResolver {
    store: Arc<dyn AssignmentStore>,
    cache: Arc<AssignmentCache>,
}

impl AssignmentResolver {
    pub fn new(store: Arc<dyn AssignmentStore>, cache: Arc<AssignmentCache>) -> Self {
        Self { store, cache }
    }

    pub fn with_config(store: Arc<dyn AssignmentStore>, config: AuthzConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(store, Arc::new(TtlCache::new(config.cache_ttl, clock)))
    }

    /// Fail-closed: a store error answers `false` and leaves the cache untouched.
    pub async fn is_assigned_practitioner(
        &self,
        supervisor_id: Uuid,
        practitioner_id: Uuid,
        role: SupervisorRole,
    ) -> bool {
        let key = (supervisor_id, role);

        if let Some(practitioners) = self.cache.get(&key) {
            return practitioners.contains(&practitioner_id);
        }

        let assignments = match self.store.list_active(supervisor_id, role).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(
                    supervisor_id = %supervisor_id,
                    role = %role,
                    error = %e,
                    "assignment lookup failed; denying"
                );
                return false;
            }
        };

        let practitioners: Vec<Uuid> = assignments.into_iter().map(|a| a.practitioner_id).collect();
        let assigned = practitioners.contains(&practitioner_id);
        self.cache.set(key, practitioners);
        assigned
    }

    pub fn invalidate(&self, supervisor_id: Uuid, role: SupervisorRole) {
        self.cache.remove(&(supervisor_id, role));
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

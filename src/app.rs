use std::sync::Arc;

use axum::http::Method;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{
    AssignmentResolver, AssignmentService, AuthzConfig, OrganizationContextResolver, PermissionService,
    RoleMutationService,
};
use crate::cache::{Clock, SystemClock};
use crate::db::{SqliteAssignmentStore, SqliteProfileStore};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_audit_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::payments::{PaymentPermissionService, UserContextService};
use crate::routes::{assignments, health, payments, rbac};

/// The authorization services wired over one pair of stores.
#[derive(Clone)]
pub struct Services {
    pub permissions: PermissionService,
    pub roles: RoleMutationService,
    pub assignments: AssignmentService,
    pub payments: PaymentPermissionService,
}

impl Services {
    pub fn sqlite(pool: &SqlitePool, config: AuthzConfig, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        let profiles = Arc::new(SqliteProfileStore::new(pool.clone()));
        let assignment_store = Arc::new(SqliteAssignmentStore::new(pool.clone()));

        let contexts = OrganizationContextResolver::new(profiles.clone());
        let resolver = AssignmentResolver::with_config(assignment_store.clone(), config, clock.clone());
        let permissions = PermissionService::new(contexts.clone(), resolver);
        let user_contexts = UserContextService::with_config(contexts, config, clock);

        Self {
            roles: RoleMutationService::new(permissions.clone(), profiles, user_contexts.clone(), events.clone()),
            assignments: AssignmentService::new(permissions.clone(), assignment_store, events),
            payments: PaymentPermissionService::new(user_contexts),
            permissions,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub services: Services,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, services: Services) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            services,
        }
    }
}

/// Builds the router from environment configuration and starts the audit
/// listener on `pool`.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let authz_config = AuthzConfig::from_env()?;

    let (events, rx) = init_event_bus();
    tokio::spawn(start_audit_listener(rx, pool.clone()));

    let services = Services::sqlite(&pool, authz_config, Arc::new(SystemClock), events);
    Ok(router(AppState::new(pool, jwt_config, services)))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::routes())
        .nest("/rbac", rbac::routes())
        .merge(assignments::routes())
        .nest("/payments", payments::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#![allow(dead_code)]

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use virtue_authz::create_app;
use virtue_authz::db::SqliteProfileStore;
use virtue_authz::jwt::JwtConfig;
use virtue_authz::models::profile::{Profile, Role};

pub const JWT_SECRET: &str = "test-secret";

/// Router over a migrated temp-file database.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    jwt: JwtConfig,
    _dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let opts = SqliteConnectOptions::new()
            .filename(dir.path().join("test.db"))
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator =
            sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;

        std::env::set_var("JWT_SECRET", JWT_SECRET);
        let app = create_app(pool.clone()).await?;

        Ok(Self {
            app,
            pool,
            jwt: JwtConfig::new(JWT_SECRET, 1),
            _dir: dir,
        })
    }

    /// Seeds a profile and returns its id.
    pub async fn profile(&self, roles: &[Role], organization: Option<Uuid>) -> Result<Uuid> {
        let mut profile = Profile::new(Uuid::new_v4()).with_roles(roles.iter().copied());
        profile.organization_id = organization;
        SqliteProfileStore::new(self.pool.clone()).insert(&profile).await?;
        Ok(profile.id)
    }

    pub fn token(&self, user_id: Uuid) -> Result<String> {
        Ok(self.jwt.encode(user_id)?)
    }

    pub async fn send(&self, method: &str, uri: &str, as_user: Option<Uuid>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = as_user {
            builder = builder.header("authorization", format!("Bearer {}", self.token(user)?));
        }
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }
}

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::profile::{Profile, ProfileUpdate, RoleSet};
use crate::store::ProfileStore;

use super::row_parsers::profile_from_row;

const PROFILE_COLUMNS: &str =
    "id, full_name, roles, organization_id, is_active, last_activity, current_virtue_id, current_stage";

#[derive(Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a profile row. Account signup owns this in production; the
    /// admin CLI and tests use it for seeding.
    pub async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO profiles (id, full_name, roles, organization_id, is_active, last_activity, current_virtue_id, current_stage, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(profile.id.to_string())
        .bind(&profile.full_name)
        .bind(encode_roles(&profile.roles)?)
        .bind(profile.organization_id.map(|id| id.to_string()))
        .bind(profile.is_active)
        .bind(profile.last_activity.map(|t| t.to_rfc3339()))
        .bind(profile.current_virtue_id)
        .bind(profile.current_stage)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, "profile already exists"))?;
        Ok(())
    }
}

fn encode_roles(roles: &RoleSet) -> Result<String, StoreError> {
    serde_json::to_string(roles).map_err(|e| StoreError::corrupt(format!("unencodable roles: {}", e)))
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let sql = format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn update(&self, user_id: Uuid, update: ProfileUpdate) -> Result<bool, StoreError> {
        if update.is_empty() {
            let exists: Option<String> = sqlx::query_scalar("SELECT id FROM profiles WHERE id = ?")
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            return Ok(exists.is_some());
        }

        let roles = update.roles.as_ref().map(encode_roles).transpose()?;
        let set_full_name = update.full_name.is_some();
        let full_name = update.full_name.flatten();

        // single UPDATE; COALESCE keeps untouched columns
        let result = sqlx::query(
            "UPDATE profiles SET roles = COALESCE(?, roles), is_active = COALESCE(?, is_active), full_name = CASE WHEN ? THEN ? ELSE full_name END, updated_at = ? WHERE id = ?",
        )
        .bind(roles)
        .bind(update.is_active)
        .bind(set_full_name)
        .bind(full_name)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

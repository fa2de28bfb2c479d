use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::assignment::{Assignment, NewAssignment};
use crate::models::profile::SupervisorRole;
use crate::store::AssignmentStore;

use super::row_parsers::assignment_from_row;

const ASSIGNMENT_COLUMNS: &str = "id, practitioner_id, supervisor_id, supervisor_role, organization_id, assigned_at, assigned_by, active, removed_at, removed_by, reason";

const ACTIVE_ROLE_TAKEN: &str = "practitioner already has an active supervisor in this role";

#[derive(Clone)]
pub struct SqliteAssignmentStore {
    pool: SqlitePool,
}

impl SqliteAssignmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_many(&self, sql: &str, binds: &[String]) -> Result<Vec<Assignment>, StoreError> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(assignment_from_row).collect()
    }
}

async fn insert_in(tx: &mut Transaction<'_, Sqlite>, assignment: NewAssignment) -> Result<Assignment, StoreError> {
    let row = assignment.into_assignment(Uuid::new_v4(), Utc::now());

    sqlx::query(
        "INSERT INTO practitioner_assignments (id, practitioner_id, supervisor_id, supervisor_role, organization_id, assigned_at, assigned_by, active) VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(row.id.to_string())
    .bind(row.practitioner_id.to_string())
    .bind(row.supervisor_id.to_string())
    .bind(row.supervisor_role.as_str())
    .bind(row.organization_id.to_string())
    .bind(row.assigned_at.to_rfc3339())
    .bind(row.assigned_by.to_string())
    .execute(&mut **tx)
    .await
    .map_err(|e| StoreError::from_write(e, ACTIVE_ROLE_TAKEN))?;

    Ok(row)
}

async fn deactivate_where(
    tx: &mut Transaction<'_, Sqlite>,
    filter: &str,
    binds: &[String],
    removed_by: Uuid,
    reason: Option<String>,
) -> Result<Option<Assignment>, StoreError> {
    let select = format!(
        "SELECT {} FROM practitioner_assignments WHERE active = 1 AND {}",
        ASSIGNMENT_COLUMNS, filter
    );
    let mut query = sqlx::query(&select);
    for value in binds {
        query = query.bind(value);
    }
    let Some(row) = query.fetch_optional(&mut **tx).await? else {
        return Ok(None);
    };
    let mut assignment = assignment_from_row(&row)?;

    let removed_at = Utc::now();
    sqlx::query(
        "UPDATE practitioner_assignments SET active = 0, removed_at = ?, removed_by = ?, reason = ? WHERE id = ?",
    )
    .bind(removed_at.to_rfc3339())
    .bind(removed_by.to_string())
    .bind(&reason)
    .bind(assignment.id.to_string())
    .execute(&mut **tx)
    .await?;

    assignment.active = false;
    assignment.removed_at = Some(removed_at);
    assignment.removed_by = Some(removed_by);
    assignment.reason = reason;
    Ok(Some(assignment))
}

#[async_trait]
impl AssignmentStore for SqliteAssignmentStore {
    async fn get(&self, assignment_id: Uuid) -> Result<Option<Assignment>, StoreError> {
        let sql = format!("SELECT {} FROM practitioner_assignments WHERE id = ?", ASSIGNMENT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(assignment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(assignment_from_row).transpose()
    }

    async fn list_active(&self, supervisor_id: Uuid, role: SupervisorRole) -> Result<Vec<Assignment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM practitioner_assignments WHERE supervisor_id = ? AND supervisor_role = ? AND active = 1",
            ASSIGNMENT_COLUMNS
        );
        self.fetch_many(&sql, &[supervisor_id.to_string(), role.as_str().to_string()]).await
    }

    async fn list_for_practitioner(&self, practitioner_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM practitioner_assignments WHERE practitioner_id = ? ORDER BY assigned_at DESC",
            ASSIGNMENT_COLUMNS
        );
        self.fetch_many(&sql, &[practitioner_id.to_string()]).await
    }

    async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<Assignment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM practitioner_assignments WHERE organization_id = ? AND active = 1 ORDER BY assigned_at DESC",
            ASSIGNMENT_COLUMNS
        );
        self.fetch_many(&sql, &[organization_id.to_string()]).await
    }

    async fn create(&self, assignment: NewAssignment) -> Result<Assignment, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = insert_in(&mut tx, assignment).await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn deactivate(
        &self,
        assignment_id: Uuid,
        removed_by: Uuid,
        reason: Option<String>,
    ) -> Result<Option<Assignment>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let removed = deactivate_where(&mut tx, "id = ?", &[assignment_id.to_string()], removed_by, reason).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn replace(
        &self,
        assignment: NewAssignment,
        reason: String,
    ) -> Result<(Option<Assignment>, Assignment), StoreError> {
        let mut tx = self.pool.begin().await?;
        let previous = deactivate_where(
            &mut tx,
            "practitioner_id = ? AND supervisor_role = ?",
            &[assignment.practitioner_id.to_string(), assignment.supervisor_role.as_str().to_string()],
            assignment.assigned_by,
            Some(reason),
        )
        .await?;
        let created = insert_in(&mut tx, assignment).await?;
        tx.commit().await?;
        Ok((previous, created))
    }
}

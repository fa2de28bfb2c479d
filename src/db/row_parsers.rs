use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::models::assignment::Assignment;
use crate::models::profile::{Profile, RoleSet, SupervisorRole};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    let s = s.trim();

    // RFC3339 (what this crate writes)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP format
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| StoreError::corrupt("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(StoreError::corrupt(format!("invalid datetime: {}", s)))
}

fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

fn parse_uuid(s: &str, column: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s.trim()).map_err(|e| StoreError::corrupt(format!("invalid uuid in {}: {}", column, e)))
}

fn parse_opt_uuid(s: Option<String>, column: &str) -> Result<Option<Uuid>, StoreError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_uuid(&s, column)?)),
        _ => Ok(None),
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::corrupt(format!("missing {}: {}", name, e)))
}

/// Parses the JSON `roles` column. An empty array reads as `{practitioner}`;
/// an unknown role tag makes the whole record unreadable.
pub fn parse_roles(raw: &str) -> Result<RoleSet, StoreError> {
    serde_json::from_str::<RoleSet>(raw).map_err(|e| StoreError::corrupt(format!("invalid roles: {}", e)))
}

pub fn profile_from_row(row: &SqliteRow) -> Result<Profile, StoreError> {
    let id_s: String = column(row, "id")?;
    let full_name: Option<String> = column(row, "full_name")?;
    let roles_s: String = column(row, "roles")?;
    let organization_id_s: Option<String> = column(row, "organization_id")?;
    let is_active: bool = column(row, "is_active")?;
    let last_activity_s: Option<String> = column(row, "last_activity")?;
    let current_virtue_id: Option<i64> = column(row, "current_virtue_id")?;
    let current_stage: Option<i64> = column(row, "current_stage")?;

    Ok(Profile {
        id: parse_uuid(&id_s, "id")?,
        full_name,
        roles: parse_roles(&roles_s)?,
        organization_id: parse_opt_uuid(organization_id_s, "organization_id")?,
        is_active,
        last_activity: parse_opt_datetime(last_activity_s)?,
        current_virtue_id,
        current_stage,
    })
}

pub fn assignment_from_row(row: &SqliteRow) -> Result<Assignment, StoreError> {
    let id_s: String = column(row, "id")?;
    let practitioner_id_s: String = column(row, "practitioner_id")?;
    let supervisor_id_s: String = column(row, "supervisor_id")?;
    let supervisor_role_s: String = column(row, "supervisor_role")?;
    let organization_id_s: String = column(row, "organization_id")?;
    let assigned_at_s: String = column(row, "assigned_at")?;
    let assigned_by_s: String = column(row, "assigned_by")?;
    let active: bool = column(row, "active")?;
    let removed_at_s: Option<String> = column(row, "removed_at")?;
    let removed_by_s: Option<String> = column(row, "removed_by")?;
    let reason: Option<String> = column(row, "reason")?;

    let supervisor_role: SupervisorRole = supervisor_role_s
        .parse()
        .map_err(|_| StoreError::corrupt(format!("invalid supervisor_role: {}", supervisor_role_s)))?;

    Ok(Assignment {
        id: parse_uuid(&id_s, "id")?,
        practitioner_id: parse_uuid(&practitioner_id_s, "practitioner_id")?,
        supervisor_id: parse_uuid(&supervisor_id_s, "supervisor_id")?,
        supervisor_role,
        organization_id: parse_uuid(&organization_id_s, "organization_id")?,
        assigned_at: parse_datetime(&assigned_at_s)?,
        assigned_by: parse_uuid(&assigned_by_s, "assigned_by")?,
        active,
        removed_at: parse_opt_datetime(removed_at_s)?,
        removed_by: parse_opt_uuid(removed_by_s, "removed_by")?,
        reason,
    })
}

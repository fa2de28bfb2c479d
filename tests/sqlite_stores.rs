use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use virtue_authz::db::{SqliteAssignmentStore, SqliteProfileStore};
use virtue_authz::errors::StoreError;
use virtue_authz::models::assignment::NewAssignment;
use virtue_authz::models::profile::{Profile, ProfileUpdate, Role, RoleSet, SupervisorRole};
use virtue_authz::store::{AssignmentStore, ProfileStore};

async fn pool(dir: &tempfile::TempDir) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("stores.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;
    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;
    Ok(pool)
}

fn new_assignment(practitioner: Uuid, supervisor: Uuid, org: Uuid) -> NewAssignment {
    NewAssignment {
        practitioner_id: practitioner,
        supervisor_id: supervisor,
        supervisor_role: SupervisorRole::Coach,
        organization_id: org,
        assigned_by: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn profile_roles_round_trip_and_update() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pool = pool(&dir).await?;
    let store = SqliteProfileStore::new(pool.clone());

    let org = Uuid::new_v4();
    let profile = Profile::new(Uuid::new_v4()).with_roles([Role::Coach, Role::Therapist]).in_organization(org);
    store.insert(&profile).await?;

    let loaded = store.get(profile.id).await?.expect("profile stored");
    assert_eq!(loaded.roles.as_slice(), &[Role::Coach, Role::Therapist]);
    assert_eq!(loaded.organization_id, Some(org));

    assert!(store.update(profile.id, ProfileUpdate::roles(RoleSet::from_roles([Role::Admin]))).await?);
    let loaded = store.get(profile.id).await?.expect("profile stored");
    assert_eq!(loaded.roles.as_slice(), &[Role::Admin]);

    assert!(!store.update(Uuid::new_v4(), ProfileUpdate::roles(RoleSet::practitioner())).await?);
    assert!(store.get(Uuid::new_v4()).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn partial_update_leaves_other_columns_alone() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pool = pool(&dir).await?;
    let store = SqliteProfileStore::new(pool.clone());

    let mut profile = Profile::new(Uuid::new_v4()).with_roles([Role::Coach]);
    profile.full_name = Some("Ada Coach".into());
    store.insert(&profile).await?;

    assert!(store.update(profile.id, ProfileUpdate::active(false)).await?);
    let loaded = store.get(profile.id).await?.expect("profile stored");
    assert!(!loaded.is_active);
    assert_eq!(loaded.full_name.as_deref(), Some("Ada Coach"));
    assert_eq!(loaded.roles.as_slice(), &[Role::Coach]);

    let rename = ProfileUpdate {
        full_name: Some(None),
        ..ProfileUpdate::default()
    };
    assert!(store.update(profile.id, rename).await?);
    let loaded = store.get(profile.id).await?.expect("profile stored");
    assert_eq!(loaded.full_name, None);
    assert!(!loaded.is_active);

    let renamed = ProfileUpdate {
        full_name: Some(Some("Ada Lovelace".into())),
        is_active: Some(true),
        ..ProfileUpdate::default()
    };
    assert!(store.update(profile.id, renamed).await?);
    let loaded = store.get(profile.id).await?.expect("profile stored");
    assert_eq!(loaded.full_name.as_deref(), Some("Ada Lovelace"));
    assert!(loaded.is_active);
    assert_eq!(loaded.roles.as_slice(), &[Role::Coach]);

    // nothing to change still reports whether the profile exists
    assert!(store.update(profile.id, ProfileUpdate::default()).await?);
    assert!(!store.update(Uuid::new_v4(), ProfileUpdate::default()).await?);

    Ok(())
}

#[tokio::test]
async fn empty_roles_read_as_practitioner_and_unknown_roles_are_corrupt() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pool = pool(&dir).await?;
    let store = SqliteProfileStore::new(pool.clone());

    let empty = Uuid::new_v4();
    let bogus = Uuid::new_v4();
    for (id, roles) in [(empty, "[]"), (bogus, r#"["overlord"]"#)] {
        sqlx::query("INSERT INTO profiles (id, roles, is_active, created_at, updated_at) VALUES (?, ?, 1, ?, ?)")
            .bind(id.to_string())
            .bind(roles)
            .bind("2025-01-01 00:00:00")
            .bind("2025-01-01 00:00:00")
            .execute(&pool)
            .await?;
    }

    let profile = store.get(empty).await?.expect("profile stored");
    assert_eq!(profile.roles.as_slice(), &[Role::Practitioner]);

    let err = store.get(bogus).await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)), "got {:?}", err);

    Ok(())
}

#[tokio::test]
async fn one_active_supervisor_per_role() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pool = pool(&dir).await?;
    let store = SqliteAssignmentStore::new(pool);

    let (practitioner, org) = (Uuid::new_v4(), Uuid::new_v4());
    let first = store.create(new_assignment(practitioner, Uuid::new_v4(), org)).await?;

    let err = store
        .create(new_assignment(practitioner, Uuid::new_v4(), org))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "got {:?}", err);

    let removed = store
        .deactivate(first.id, Uuid::new_v4(), Some("done".into()))
        .await?
        .expect("active assignment");
    assert!(!removed.active);
    assert!(store.deactivate(first.id, Uuid::new_v4(), None).await?.is_none());

    // the slot is free again once the previous assignment ended
    store.create(new_assignment(practitioner, Uuid::new_v4(), org)).await?;
    assert_eq!(store.list_for_practitioner(practitioner).await?.len(), 2);
    assert_eq!(store.list_for_organization(org).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn replace_swaps_supervisor_atomically() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pool = pool(&dir).await?;
    let store = SqliteAssignmentStore::new(pool);

    let (practitioner, org) = (Uuid::new_v4(), Uuid::new_v4());
    let (old_coach, new_coach) = (Uuid::new_v4(), Uuid::new_v4());
    store.create(new_assignment(practitioner, old_coach, org)).await?;

    let (previous, current) = store
        .replace(new_assignment(practitioner, new_coach, org), "handover".into())
        .await?;
    let previous = previous.expect("previous assignment");
    assert_eq!(previous.supervisor_id, old_coach);
    assert_eq!(previous.reason.as_deref(), Some("handover"));
    assert_eq!(current.supervisor_id, new_coach);

    assert!(store.list_active(old_coach, SupervisorRole::Coach).await?.is_empty());
    assert_eq!(store.list_active(new_coach, SupervisorRole::Coach).await?.len(), 1);

    Ok(())
}

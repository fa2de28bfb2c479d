mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use common::TestApp;
use virtue_authz::db::SqliteProfileStore;
use virtue_authz::models::profile::{ProfileUpdate, Role};
use virtue_authz::store::ProfileStore;

struct Org {
    id: Uuid,
    admin: Uuid,
    coach: Uuid,
    practitioner: Uuid,
}

async fn seed(app: &TestApp) -> Result<Org> {
    let id = Uuid::new_v4();
    Ok(Org {
        id,
        admin: app.profile(&[Role::Admin], Some(id)).await?,
        coach: app.profile(&[Role::Coach], Some(id)).await?,
        practitioner: app.profile(&[Role::Practitioner], Some(id)).await?,
    })
}

fn assignment(org: &Org, supervisor: Uuid) -> Value {
    json!({
        "practitioner_id": org.practitioner,
        "supervisor_id": supervisor,
        "supervisor_role": "coach",
        "organization_id": org.id,
    })
}

async fn can_read(app: &TestApp, caller: Uuid, practitioner: Uuid) -> Result<bool> {
    let (status, body) = app
        .send(
            "POST",
            "/rbac/check",
            Some(caller),
            Some(json!({ "resource": "practitioner_data", "action": "read", "resource_id": practitioner })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(body["allowed"].as_bool().unwrap_or(false))
}

#[tokio::test]
async fn assignment_grants_coach_access() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = seed(&app).await?;

    assert!(!can_read(&app, org.coach, org.practitioner).await?);

    let (status, body) = app
        .send("POST", "/assignments", Some(org.admin), Some(assignment(&org, org.coach)))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["assigned_by"], org.admin.to_string());
    assert_eq!(body["active"], true);

    assert!(can_read(&app, org.coach, org.practitioner).await?);

    let (status, _) = app
        .send("POST", "/assignments", Some(org.admin), Some(assignment(&org, org.coach)))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn non_admin_cannot_assign() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = seed(&app).await?;

    let (status, body) = app
        .send("POST", "/assignments", Some(org.coach), Some(assignment(&org, org.coach)))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["required"]["action"], "manage_assignments");

    Ok(())
}

#[tokio::test]
async fn supervisor_must_hold_the_role() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = seed(&app).await?;
    let plain = app.profile(&[Role::Practitioner], Some(org.id)).await?;

    let (status, _) = app
        .send("POST", "/assignments", Some(org.admin), Some(assignment(&org, plain)))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let outsider = app.profile(&[Role::Coach], Some(Uuid::new_v4())).await?;
    let (status, _) = app
        .send("POST", "/assignments", Some(org.admin), Some(assignment(&org, outsider)))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn reassign_moves_access_and_keeps_history() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = seed(&app).await?;
    let second_coach = app.profile(&[Role::Coach], Some(org.id)).await?;

    let (status, _) = app
        .send("POST", "/assignments", Some(org.admin), Some(assignment(&org, org.coach)))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(can_read(&app, org.coach, org.practitioner).await?);

    let (status, body) = app
        .send(
            "POST",
            "/assignments/reassign",
            Some(org.admin),
            Some(json!({
                "practitioner_id": org.practitioner,
                "new_supervisor_id": second_coach,
                "supervisor_role": "coach",
                "organization_id": org.id,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["supervisor_id"], second_coach.to_string());

    assert!(!can_read(&app, org.coach, org.practitioner).await?);
    assert!(can_read(&app, second_coach, org.practitioner).await?);

    let (status, body) = app
        .send("GET", &format!("/practitioners/{}/assignments", org.practitioner), Some(org.admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let history = body.as_array().expect("history array");
    assert_eq!(history.len(), 2);
    let ended = history
        .iter()
        .find(|a| a["active"] == false)
        .expect("previous assignment kept");
    assert_eq!(ended["supervisor_id"], org.coach.to_string());
    assert_eq!(ended["reason"], "Reassigned to new supervisor");

    Ok(())
}

#[tokio::test]
async fn remove_revokes_access() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = seed(&app).await?;

    let (_, created) = app
        .send("POST", "/assignments", Some(org.admin), Some(assignment(&org, org.coach)))
        .await?;
    let id = created["id"].as_str().expect("assignment id").to_string();

    let (status, body) = app
        .send("DELETE", &format!("/assignments/{}?reason=moved", id), Some(org.admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["active"], false);
    assert_eq!(body["reason"], "moved");
    assert!(!can_read(&app, org.coach, org.practitioner).await?);

    let (status, _) = app
        .send("DELETE", &format!("/assignments/{}", id), Some(org.admin), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn listing_by_organization_and_supervisor() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = seed(&app).await?;

    app.send("POST", "/assignments", Some(org.admin), Some(assignment(&org, org.coach)))
        .await?;

    let (status, body) = app
        .send("GET", &format!("/organizations/{}/assignments", org.id), Some(org.admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    // coaches read their own caseload but not the organization's
    let (status, body) = app
        .send("GET", &format!("/supervisors/{}/assignments", org.coach), Some(org.coach), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["practitioner_id"], org.practitioner.to_string());

    let (status, _) = app
        .send("GET", &format!("/organizations/{}/assignments", org.id), Some(org.coach), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn deactivated_supervisor_loses_own_caseload() -> Result<()> {
    let app = TestApp::spawn().await?;
    let org = seed(&app).await?;

    let (status, _) = app
        .send("POST", "/assignments", Some(org.admin), Some(assignment(&org, org.coach)))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    SqliteProfileStore::new(app.pool.clone())
        .update(org.coach, ProfileUpdate::active(false))
        .await?;

    let (status, body) = app
        .send("GET", &format!("/supervisors/{}/assignments", org.coach), Some(org.coach), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "body: {}", body);

    let ghost = Uuid::new_v4();
    let (status, _) = app
        .send("GET", &format!("/supervisors/{}/assignments", ghost), Some(ghost), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

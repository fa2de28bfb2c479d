use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes::{assignments, health, payments, rbac};

#[derive(OpenApi)]
#[openapi(
	paths(
		health::health,
		rbac::my_permissions,
		rbac::my_role_context,
		rbac::check_permission,
		rbac::check_permissions,
		rbac::assign_role,
		rbac::remove_role,
		assignments::create_assignment,
		assignments::remove_assignment,
		assignments::reassign_practitioner,
		assignments::assignment_history,
		assignments::organization_assignments,
		assignments::supervisor_assignments,
		payments::payment_context,
		payments::validate_payment
	),
	components(
		schemas(
			health::HealthResponse,
			models::profile::Role,
			models::profile::SupervisorRole,
			models::profile::Profile,
			models::rbac::Permission,
			models::rbac::PermissionQuery,
			models::rbac::PermissionCheckResponse,
			models::rbac::AssignRoleRequest,
			models::rbac::EffectivePermissions,
			models::organization::RoleContext,
			models::assignment::Assignment,
			models::assignment::NewAssignment,
			models::assignment::ReassignRequest,
			models::user_context::UserType,
			models::user_context::PaymentPermissions,
			models::user_context::UserContext,
			models::user_context::PaymentPermissionCheck,
			models::user_context::PaymentCapabilities,
			models::user_context::PaymentUiContext,
			models::user_context::PaymentAccessGrant,
			models::user_context::PaymentApiResponse,
			models::user_context::PaymentValidationRequest
		)
	),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "RBAC", description = "Permission checks and role management"),
		(name = "Assignments", description = "Practitioner to supervisor assignments"),
		(name = "Payments", description = "Payment permission gating")
	)
)]
pub struct ApiDoc;

/// Generated document plus the bearer scheme and a local server entry.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;
	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root must be an object"))?;

	ensure_security_components(root);
	root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	ensure_servers(root, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(root: &mut Map<String, Value>) {
	let components = root.entry("components").or_insert_with(|| json!({}));
	if !components.is_object() {
		*components = json!({});
	}
	let schemes = &mut components["securitySchemes"];
	if !schemes.is_object() {
		*schemes = json!({});
	}
	schemes["bearerAuth"] = json!({
		"type": "http",
		"scheme": "bearer",
		"bearerFormat": "JWT"
	});
}

fn ensure_servers(root: &mut Map<String, Value>, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match root.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			root.insert("servers".to_string(), json!([{ "url": server_url }]));
		}
	}
}

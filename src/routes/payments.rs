//! Payment gating routes. Payment execution itself lives elsewhere; these
//! endpoints answer whether it may happen.

use axum::{extract::State, routing::{get, post}, Json, Router};

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::Caller;
use crate::models::user_context::{PaymentApiResponse, PaymentUiContext, PaymentValidationRequest};
use crate::payments::OPERATION_NOT_ALLOWED;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/context", get(payment_context))
        .route("/validate", post(validate_payment))
}

#[utoipa::path(
    get,
    path = "/payments/context",
    tag = "Payments",
    responses((status = 200, description = "What the payment UI may show the caller", body = PaymentUiContext)),
    security(("bearerAuth" = []))
)]
async fn payment_context(State(state): State<AppState>, caller: Caller) -> Json<PaymentUiContext> {
    Json(state.services.payments.get_payment_ui_context(caller.user_id).await)
}

/// 403 echoes the denial reason with the caller's user type and organization
#[utoipa::path(
    post,
    path = "/payments/validate",
    tag = "Payments",
    request_body = PaymentValidationRequest,
    responses(
        (status = 200, description = "Operation permitted", body = PaymentApiResponse),
        (status = 403, description = "Operation refused; body carries reason, user_type and organization_id"),
    ),
    security(("bearerAuth" = []))
)]
async fn validate_payment(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<PaymentValidationRequest>,
) -> AppResult<Json<PaymentApiResponse>> {
    let response = state
        .services
        .payments
        .validate_payment_api_access(caller.user_id, &body.operation, body.amount)
        .await;

    if !response.success {
        return Err(AppError::PaymentDenied {
            reason: response.error.unwrap_or_else(|| OPERATION_NOT_ALLOWED.to_string()),
            user_type: response.user_type,
            organization_id: response.organization_id,
        });
    }
    Ok(Json(response))
}

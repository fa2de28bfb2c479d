//! Entry points for payment HTTP handlers and UI rendering.

use uuid::Uuid;

use crate::models::user_context::{PaymentAccessGrant, PaymentApiResponse, PaymentUiContext};

use super::permissions::{interface_message, PaymentPermissionService, ACCOUNT_INACTIVE};

pub const SESSION_INVALID: &str = "User not found or invalid session";
pub const OPERATION_NOT_ALLOWED: &str = "Operation not allowed";

impl PaymentPermissionService {
    /// Gate run before any state-changing payment logic. A `success: false`
    /// response is an authoritative refusal.
    pub async fn validate_payment_api_access(
        &self,
        user_id: Uuid,
        operation: &str,
        amount: Option<f64>,
    ) -> PaymentApiResponse {
        let Some(user_context) = self.user_contexts().get_user_context(user_id).await else {
            return PaymentApiResponse::failure(SESSION_INVALID);
        };

        if !user_context.is_active {
            return PaymentApiResponse {
                user_type: Some(user_context.user_type),
                ..PaymentApiResponse::failure(ACCOUNT_INACTIVE)
            };
        }

        let permission_check = self.validate_payment_operation(user_id, operation, amount).await;
        if !permission_check.allowed {
            tracing::info!(
                user_id = %user_id,
                operation,
                reason = ?permission_check.reason,
                "payment operation refused"
            );
            return PaymentApiResponse {
                user_type: permission_check.user_type,
                organization_id: permission_check.organization_id,
                ..PaymentApiResponse::failure(
                    permission_check
                        .reason
                        .clone()
                        .unwrap_or_else(|| OPERATION_NOT_ALLOWED.to_string()),
                )
            };
        }

        PaymentApiResponse {
            success: true,
            error: None,
            user_type: Some(user_context.user_type),
            organization_id: user_context.organization_id,
            data: Some(PaymentAccessGrant {
                user_context,
                permission_check,
            }),
        }
    }

    pub async fn get_payment_ui_context(&self, user_id: Uuid) -> PaymentUiContext {
        let context = self.get_payment_context(user_id).await;
        let interface = &context.permissions.can_access_interface;

        PaymentUiContext {
            should_show_interface: interface.allowed,
            message: interface_message(interface),
            user_context: context.user_context,
            permissions: context.permissions,
        }
    }
}

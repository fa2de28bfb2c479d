use uuid::Uuid;

use crate::models::user_context::{
    PaymentCapabilities, PaymentContext, PaymentOperation, PaymentPermissionCheck, UserContext, UserType,
};

use super::context::UserContextService;

pub const CONTEXT_NOT_FOUND: &str = "User context not found";
pub const ACCOUNT_INACTIVE: &str = "User account is inactive";
pub const MEMBERS_CANNOT_PAY: &str =
    "Organization members cannot make payments - payments are handled by organization administrators";
pub const NO_PAYMENT_PERMISSIONS: &str = "User does not have payment permissions";
pub const AMOUNT_OUT_OF_RANGE: &str = "Payment amount must be between $1.00 and $10,000.00";
pub const NO_HISTORY_PERMISSION: &str = "User does not have permission to view payment history";
pub const NO_SUBSCRIPTION_PERMISSION: &str = "User does not have permission to manage subscriptions";
pub const AMOUNT_REQUIRED: &str = "Payment amount is required";
pub const UNKNOWN_OPERATION: &str = "Unknown payment operation";

pub const MEMBER_INTERFACE_MESSAGE: &str = "Your organization handles payments for all members. Contact your organization administrator if you have questions about billing.";
pub const DEFAULT_INTERFACE_MESSAGE: &str = "Payment interface is not available for your account type.";

pub const MIN_PAYMENT_AMOUNT: f64 = 1.0;
pub const MAX_PAYMENT_AMOUNT: f64 = 10_000.0;

/// Amount used to probe make-payment capability for UI rendering.
const PROBE_AMOUNT: f64 = 100.0;

/// Inclusive bounds; NaN is out of range.
pub fn is_valid_amount(amount: f64) -> bool {
    (MIN_PAYMENT_AMOUNT..=MAX_PAYMENT_AMOUNT).contains(&amount)
}

/// Payment gating by user type. Every check returns a structured result whose
/// `reason` is shown to clients verbatim.
#[derive(Clone)]
pub struct PaymentPermissionService {
    user_contexts: UserContextService,
}

impl PaymentPermissionService {
    pub fn new(user_contexts: UserContextService) -> Self {
        Self { user_contexts }
    }

    pub fn user_contexts(&self) -> &UserContextService {
        &self.user_contexts
    }

    /// Missing context or inactive account.
    async fn active_context(&self, user_id: Uuid) -> Result<UserContext, PaymentPermissionCheck> {
        let context = self
            .user_contexts
            .get_user_context(user_id)
            .await
            .ok_or_else(|| PaymentPermissionCheck::deny(CONTEXT_NOT_FOUND))?;

        if !context.is_active {
            return Err(PaymentPermissionCheck::deny(ACCOUNT_INACTIVE).for_user_type(context.user_type));
        }
        Ok(context)
    }

    pub async fn can_access_payment_interface(&self, user_id: Uuid) -> PaymentPermissionCheck {
        let context = match self.active_context(user_id).await {
            Ok(context) => context,
            Err(denied) => return denied,
        };

        match context.user_type {
            UserType::OrganizationMember => PaymentPermissionCheck::deny(MEMBERS_CANNOT_PAY)
                .for_user_type(context.user_type)
                .in_organization(context.organization_id),
            UserType::Individual | UserType::OrganizationAdmin => PaymentPermissionCheck::allow(&context),
        }
    }

    pub async fn can_make_payment(&self, user_id: Uuid, amount: f64) -> PaymentPermissionCheck {
        let interface = self.can_access_payment_interface(user_id).await;
        if !interface.allowed {
            return interface;
        }

        let Some(context) = self.user_contexts.get_user_context(user_id).await else {
            return PaymentPermissionCheck::deny(CONTEXT_NOT_FOUND);
        };

        if !context.payment_permissions.can_make_payments {
            return PaymentPermissionCheck::deny(NO_PAYMENT_PERMISSIONS).for_user_type(context.user_type);
        }

        if !is_valid_amount(amount) {
            tracing::debug!(user_id = %user_id, amount, "payment amount out of range");
            return PaymentPermissionCheck::deny(AMOUNT_OUT_OF_RANGE).for_user_type(context.user_type);
        }

        PaymentPermissionCheck::allow(&context)
    }

    pub async fn can_view_payment_history(&self, user_id: Uuid) -> PaymentPermissionCheck {
        match self.active_context(user_id).await {
            Ok(context) if context.payment_permissions.can_view_payment_history => PaymentPermissionCheck::allow(&context),
            Ok(context) => PaymentPermissionCheck::deny(NO_HISTORY_PERMISSION).for_user_type(context.user_type),
            Err(denied) => denied,
        }
    }

    pub async fn can_manage_subscriptions(&self, user_id: Uuid) -> PaymentPermissionCheck {
        match self.active_context(user_id).await {
            Ok(context) if context.payment_permissions.can_manage_subscriptions => PaymentPermissionCheck::allow(&context),
            Ok(context) => PaymentPermissionCheck::deny(NO_SUBSCRIPTION_PERMISSION).for_user_type(context.user_type),
            Err(denied) => denied,
        }
    }

    pub async fn get_payment_context(&self, user_id: Uuid) -> PaymentContext {
        let user_context = self.user_contexts.get_user_context(user_id).await;
        let permissions = PaymentCapabilities {
            can_access_interface: self.can_access_payment_interface(user_id).await,
            can_make_payments: self.can_make_payment(user_id, PROBE_AMOUNT).await,
            can_view_history: self.can_view_payment_history(user_id).await,
            can_manage_subscriptions: self.can_manage_subscriptions(user_id).await,
        };

        PaymentContext {
            user_context,
            permissions,
        }
    }

    pub async fn should_show_payment_interface(&self, user_id: Uuid) -> bool {
        self.can_access_payment_interface(user_id).await.allowed
    }

    /// `None` when the interface is available.
    pub async fn get_payment_interface_message(&self, user_id: Uuid) -> Option<String> {
        interface_message(&self.can_access_payment_interface(user_id).await)
    }

    /// Dispatch by operation name. An unparseable name is denied.
    pub async fn validate_payment_operation(
        &self,
        user_id: Uuid,
        operation: &str,
        amount: Option<f64>,
    ) -> PaymentPermissionCheck {
        match operation.parse::<PaymentOperation>() {
            Ok(operation) => self.check_operation(user_id, operation, amount).await,
            Err(_) => PaymentPermissionCheck::deny(UNKNOWN_OPERATION),
        }
    }

    pub async fn check_operation(
        &self,
        user_id: Uuid,
        operation: PaymentOperation,
        amount: Option<f64>,
    ) -> PaymentPermissionCheck {
        match operation {
            PaymentOperation::CreatePayment => match amount {
                Some(amount) => self.can_make_payment(user_id, amount).await,
                None => PaymentPermissionCheck::deny(AMOUNT_REQUIRED),
            },
            PaymentOperation::ViewHistory => self.can_view_payment_history(user_id).await,
            PaymentOperation::ManageSubscription => self.can_manage_subscriptions(user_id).await,
        }
    }
}

pub(crate) fn interface_message(check: &PaymentPermissionCheck) -> Option<String> {
    if check.allowed {
        return None;
    }

    match check.user_type {
        Some(UserType::OrganizationMember) => Some(MEMBER_INTERFACE_MESSAGE.to_string()),
        _ => Some(
            check
                .reason
                .clone()
                .unwrap_or_else(|| DEFAULT_INTERFACE_MESSAGE.to_string()),
        ),
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::profile::Role;

// =============================================================================
// USER TYPE
// =============================================================================

/// Coarse payment-relevant classification of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Individual,
    OrganizationAdmin,
    OrganizationMember,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Individual => "individual",
            UserType::OrganizationAdmin => "organization_admin",
            UserType::OrganizationMember => "organization_member",
        }
    }

    /// Organization members never pay directly; their organization is billed.
    pub fn payment_permissions(&self) -> PaymentPermissions {
        match self {
            UserType::Individual | UserType::OrganizationAdmin => PaymentPermissions::all(),
            UserType::OrganizationMember => PaymentPermissions::none(),
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentPermissions {
    pub can_make_payments: bool,
    pub can_view_payment_history: bool,
    pub can_manage_subscriptions: bool,
}

impl PaymentPermissions {
    pub fn all() -> Self {
        Self {
            can_make_payments: true,
            can_view_payment_history: true,
            can_manage_subscriptions: true,
        }
    }

    pub fn none() -> Self {
        Self {
            can_make_payments: false,
            can_view_payment_history: false,
            can_manage_subscriptions: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserContext {
    pub user_id: Uuid,
    pub user_type: UserType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_role: Option<Role>,
    pub payment_permissions: PaymentPermissions,
    pub is_active: bool,
}

// =============================================================================
// PAYMENT CHECKS
// =============================================================================

/// Outcome of a payment permission check. `reason` is surfaced verbatim to clients.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PaymentPermissionCheck {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
}

impl PaymentPermissionCheck {
    pub fn allow(context: &UserContext) -> Self {
        Self {
            allowed: true,
            reason: None,
            user_type: Some(context.user_type),
            organization_id: context.organization_id,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            user_type: None,
            organization_id: None,
        }
    }

    pub fn for_user_type(mut self, user_type: UserType) -> Self {
        self.user_type = Some(user_type);
        self
    }

    pub fn in_organization(mut self, organization_id: Option<Uuid>) -> Self {
        self.organization_id = organization_id;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOperation {
    CreatePayment,
    ViewHistory,
    ManageSubscription,
}

impl PaymentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOperation::CreatePayment => "create_payment",
            PaymentOperation::ViewHistory => "view_history",
            PaymentOperation::ManageSubscription => "manage_subscription",
        }
    }
}

impl FromStr for PaymentOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_payment" => Ok(PaymentOperation::CreatePayment),
            "view_history" => Ok(PaymentOperation::ViewHistory),
            "manage_subscription" => Ok(PaymentOperation::ManageSubscription),
            other => Err(format!("unknown payment operation: {other}")),
        }
    }
}

/// Every check the UI needs to decide what to render.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentCapabilities {
    pub can_access_interface: PaymentPermissionCheck,
    pub can_make_payments: PaymentPermissionCheck,
    pub can_view_history: PaymentPermissionCheck,
    pub can_manage_subscriptions: PaymentPermissionCheck,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentContext {
    pub user_context: Option<UserContext>,
    pub permissions: PaymentCapabilities,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentUiContext {
    pub user_context: Option<UserContext>,
    pub permissions: PaymentCapabilities,
    pub should_show_interface: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload carried by a successful `validate_payment_api_access`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentAccessGrant {
    pub user_context: UserContext,
    pub permission_check: PaymentPermissionCheck,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PaymentAccessGrant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Uuid>,
}

impl PaymentApiResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            user_type: None,
            organization_id: None,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentValidationRequest {
    #[schema(example = "create_payment")]
    pub operation: String,
    #[schema(example = 49.0)]
    pub amount: Option<f64>,
}

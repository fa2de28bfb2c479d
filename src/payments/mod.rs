//! Payment gating layered on the user context.
//!
//! Individuals and organization admins pay; organization members are billed
//! through their organization and never reach a payment form.

mod api;
mod context;
pub mod permissions;

pub use api::{OPERATION_NOT_ALLOWED, SESSION_INVALID};
pub use context::{determine_user_type, UserContextCache, UserContextService};
pub use permissions::PaymentPermissionService;

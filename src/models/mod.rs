pub mod assignment;
pub mod organization;
pub mod profile;
pub mod rbac;
pub mod user_context;

pub mod assignments;
pub mod health;
pub mod payments;
pub mod rbac;

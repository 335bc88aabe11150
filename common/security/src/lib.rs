pub mod coordinator;
pub mod error;
pub mod policy;

pub use coordinator::{AccessDenied, Action, AuthorizationCoordinator, DenyReason, Grant, Stage, Target};
pub use policy::{require_ownership, require_role, PolicyDenial};

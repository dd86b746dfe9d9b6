//! Data models for rolegrid.
//!
//! Permission keys, the action vocabulary, identifiers, and the canonical
//! snapshot of a role's remote permissions.

mod action;
mod canonical;
mod ids;
mod key;

pub use action::Action;
pub use canonical::{CanonicalPermission, CanonicalState};
pub use ids::{PermissionId, RoleId};
pub use key::{KEY_SEPARATOR, PermissionKey};

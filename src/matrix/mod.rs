//! Permission matrix editing.
//!
//! Pure, synchronous building blocks for editing a role's permissions as a
//! batch of pending changes:
//!
//! - [`DesiredState`]: what the operator wants, edited through toggles
//! - [`Diff`]: additions and removals against the canonical snapshot
//! - [`MatrixPresenter`]: checked state and change highlight per cell
//! - [`PermissionGroups`]: grouped, searchable listing of any key set
//!
//! Nothing here talks to the network. The diff is recomputed from two
//! snapshots on demand; callers rebuild it after each edit.
//!
//! # Example
//!
//! ```rust
//! use rolegrid::matrix::{DesiredState, Diff};
//! use rolegrid::models::{CanonicalPermission, CanonicalState, PermissionId, PermissionKey};
//!
//! let canonical = CanonicalState::from_permissions(vec![CanonicalPermission::new(
//!     PermissionId::new("p1"),
//!     PermissionKey::new("user", "read")?,
//! )]);
//! let mut desired = DesiredState::from_canonical(&canonical);
//! desired.toggle("user", "create", true)?;
//!
//! let diff = Diff::compute(&canonical, &desired);
//! assert_eq!(diff.added().len(), 1);
//! assert!(diff.removed().is_empty());
//! # Ok::<(), rolegrid::Error>(())
//! ```

mod desired;
mod diff;
mod groups;
mod presenter;

pub use desired::DesiredState;
pub use diff::{ChangeStatus, Diff};
pub use groups::PermissionGroups;
pub use presenter::{MatrixCell, MatrixPresenter, MatrixRow, ResourceMatrix};

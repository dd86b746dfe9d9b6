//! Permission service clients.
//!
//! The engine talks to the RBAC service only through [`PermissionService`].
//! Two implementations ship with the crate:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`HttpPermissionService`] | The REST API, via blocking `reqwest` |
//! | [`InMemoryPermissionService`] | Tests and offline demos, with failure injection |

mod http;
mod memory;

pub use http::{HttpPermissionService, PermissionRecord};
pub use memory::{CallLog, InMemoryPermissionService};

use crate::Result;
use crate::models::{CanonicalPermission, PermissionId, PermissionKey, RoleId};

/// Operations the engine needs from the permission service.
///
/// Calls are independent and carry no transaction; the engine never retries
/// them on its own. Implementations must be thread-safe because a commit
/// issues its calls concurrently.
pub trait PermissionService: Send + Sync {
    /// The backend name, for logs.
    fn name(&self) -> &'static str;

    /// Lists every permission of a role.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    fn list_permissions(&self, role: &RoleId) -> Result<Vec<CanonicalPermission>>;

    /// Creates a permission on a role.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the permission or is
    /// unreachable.
    fn create_permission(&self, role: &RoleId, key: &PermissionKey)
    -> Result<CanonicalPermission>;

    /// Deletes a permission by remote ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the deletion or is
    /// unreachable.
    fn delete_permission(&self, id: &PermissionId) -> Result<()>;
}

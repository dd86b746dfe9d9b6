//! In-memory permission service.

use super::PermissionService;
use crate::models::{CanonicalPermission, PermissionId, PermissionKey, RoleId};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Counts of calls received, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallLog {
    /// `list_permissions` calls.
    pub lists: usize,
    /// `create_permission` calls.
    pub creates: usize,
    /// `delete_permission` calls.
    pub deletes: usize,
}

impl CallLog {
    /// Total number of calls.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.lists + self.creates + self.deletes
    }
}

#[derive(Debug, Default)]
struct Inner {
    roles: HashMap<RoleId, Vec<CanonicalPermission>>,
    failing_creates: HashSet<PermissionKey>,
    failing_deletes: HashSet<PermissionId>,
    failing_lists: usize,
    calls: CallLog,
}

/// Permission service held entirely in memory.
///
/// Behaves like the REST service (IDs are assigned on create, duplicate
/// creates conflict, unknown deletes are not found) and can be told to fail
/// specific calls.
#[derive(Debug, Default)]
pub struct InMemoryPermissionService {
    inner: Mutex<Inner>,
}

impl InMemoryPermissionService {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|e| Error::OperationFailed {
            operation: "in_memory_lock".to_string(),
            cause: e.to_string(),
        })
    }

    /// Adds a permission directly, without counting it as a call.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed.
    pub fn seed(&self, role: &RoleId, resource: &str, action: &str) -> Result<PermissionId> {
        let key = PermissionKey::new(resource, action)?;
        let mut inner = self.lock()?;
        let permission = CanonicalPermission::new(new_id(), key);
        let id = permission.remote_id.clone();
        inner.roles.entry(role.clone()).or_default().push(permission);
        Ok(id)
    }

    /// Makes every create of `key` fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn fail_creates_of(&self, key: PermissionKey) -> Result<()> {
        self.lock()?.failing_creates.insert(key);
        Ok(())
    }

    /// Makes every delete of `id` fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn fail_deletes_of(&self, id: PermissionId) -> Result<()> {
        self.lock()?.failing_deletes.insert(id);
        Ok(())
    }

    /// Makes the next `count` list calls fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn fail_next_lists(&self, count: usize) -> Result<()> {
        self.lock()?.failing_lists = count;
        Ok(())
    }

    /// Returns the calls received so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn calls(&self) -> Result<CallLog> {
        Ok(self.lock()?.calls)
    }

    /// Returns the role's current keys, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn keys(&self, role: &RoleId) -> Result<Vec<PermissionKey>> {
        let inner = self.lock()?;
        let mut keys: Vec<_> = inner
            .roles
            .get(role)
            .map(|perms| perms.iter().map(|p| p.key.clone()).collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

impl PermissionService for InMemoryPermissionService {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn list_permissions(&self, role: &RoleId) -> Result<Vec<CanonicalPermission>> {
        let mut inner = self.lock()?;
        inner.calls.lists += 1;
        if inner.failing_lists > 0 {
            inner.failing_lists -= 1;
            return Err(Error::Service {
                operation: "list_permissions".to_string(),
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(inner.roles.get(role).cloned().unwrap_or_default())
    }

    fn create_permission(
        &self,
        role: &RoleId,
        key: &PermissionKey,
    ) -> Result<CanonicalPermission> {
        let mut inner = self.lock()?;
        inner.calls.creates += 1;
        if inner.failing_creates.contains(key) {
            return Err(Error::Service {
                operation: "create_permission".to_string(),
                status: 500,
                message: format!("failed to create {key}"),
            });
        }

        let permissions = inner.roles.entry(role.clone()).or_default();
        if permissions.iter().any(|p| &p.key == key) {
            return Err(Error::Service {
                operation: "create_permission".to_string(),
                status: 409,
                message: format!("permission {key} already exists"),
            });
        }

        let permission = CanonicalPermission::new(new_id(), key.clone());
        permissions.push(permission.clone());
        Ok(permission)
    }

    fn delete_permission(&self, id: &PermissionId) -> Result<()> {
        let mut inner = self.lock()?;
        inner.calls.deletes += 1;
        if inner.failing_deletes.contains(id) {
            return Err(Error::Service {
                operation: "delete_permission".to_string(),
                status: 500,
                message: format!("failed to delete {id}"),
            });
        }

        for permissions in inner.roles.values_mut() {
            if let Some(pos) = permissions.iter().position(|p| &p.remote_id == id) {
                permissions.remove(pos);
                return Ok(());
            }
        }

        Err(Error::Service {
            operation: "delete_permission".to_string(),
            status: 404,
            message: format!("permission {id} not found"),
        })
    }
}

fn new_id() -> PermissionId {
    PermissionId::new(uuid::Uuid::new_v4().to_string())
}

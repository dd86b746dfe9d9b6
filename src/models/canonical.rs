//! Server-confirmed permission snapshot.

use super::{PermissionId, PermissionKey};
use std::collections::BTreeMap;

/// One permission as it exists on the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPermission {
    /// Remote identifier, needed to delete the permission.
    pub remote_id: PermissionId,
    /// The `(resource, action)` pair.
    pub key: PermissionKey,
}

impl CanonicalPermission {
    /// Creates a canonical permission.
    #[must_use]
    pub const fn new(remote_id: PermissionId, key: PermissionKey) -> Self {
        Self { remote_id, key }
    }

    /// Returns the resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.key.resource()
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        self.key.action()
    }
}

/// Immutable snapshot of a role's remote permissions.
///
/// Replaced wholesale on every (re)load; never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalState {
    entries: BTreeMap<PermissionKey, CanonicalPermission>,
}

impl CanonicalState {
    /// Builds a snapshot from the service's list.
    ///
    /// If the service reports the same key twice, the first entry wins.
    #[must_use]
    pub fn from_permissions(permissions: impl IntoIterator<Item = CanonicalPermission>) -> Self {
        let mut entries = BTreeMap::new();
        for permission in permissions {
            if entries.contains_key(&permission.key) {
                tracing::warn!(
                    key = %permission.key,
                    remote_id = %permission.remote_id,
                    "Duplicate permission in catalog, keeping first entry"
                );
                continue;
            }
            entries.insert(permission.key.clone(), permission);
        }
        Self { entries }
    }

    /// Returns the permission for a key.
    #[must_use]
    pub fn get(&self, key: &PermissionKey) -> Option<&CanonicalPermission> {
        self.entries.get(key)
    }

    /// Returns true if the key exists remotely.
    #[must_use]
    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates keys in lexicographic order.
    pub fn keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.entries.keys()
    }

    /// Iterates permissions in key order.
    pub fn permissions(&self) -> impl Iterator<Item = &CanonicalPermission> {
        self.entries.values()
    }

    /// Number of permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the role has no permissions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(id: &str, resource: &str, action: &str) -> CanonicalPermission {
        CanonicalPermission::new(
            PermissionId::new(id),
            PermissionKey::new(resource, action).unwrap(),
        )
    }

    #[test]
    fn test_keys_are_sorted() {
        let state = CanonicalState::from_permissions(vec![
            perm("1", "user", "update"),
            perm("2", "report", "read"),
            perm("3", "user", "read"),
        ]);

        let keys: Vec<_> = state.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["report:read", "user:read", "user:update"]);
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let state = CanonicalState::from_permissions(vec![
            perm("1", "user", "read"),
            perm("2", "user", "read"),
        ]);

        assert_eq!(state.len(), 1);
        let key = PermissionKey::new("user", "read").unwrap();
        assert_eq!(state.get(&key).unwrap().remote_id.as_str(), "1");
    }

    #[test]
    fn test_empty() {
        let state = CanonicalState::default();
        assert!(state.is_empty());
        assert!(!state.contains(&PermissionKey::new("user", "read").unwrap()));
    }
}

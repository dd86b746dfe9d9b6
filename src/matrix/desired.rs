//! Operator intent: the permission set the role should have after save.

use crate::models::{Action, CanonicalState, PermissionKey};
use crate::{Error, Result};
use std::collections::BTreeSet;

/// Locally mutable set of permission keys.
///
/// Seeded from [`CanonicalState`] and edited through [`toggle`](Self::toggle)
/// and [`toggle_all`](Self::toggle_all). Every key it holds passed
/// [`PermissionKey::new`] validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    keys: BTreeSet<PermissionKey>,
}

impl DesiredState {
    /// Creates a desired state equal to the canonical key set.
    #[must_use]
    pub fn from_canonical(canonical: &CanonicalState) -> Self {
        let mut state = Self::default();
        state.initialize(canonical.keys().cloned());
        state
    }

    /// Replaces the set with exactly `canonical_keys`.
    pub fn initialize(&mut self, canonical_keys: impl IntoIterator<Item = PermissionKey>) {
        self.keys = canonical_keys.into_iter().collect();
    }

    /// Discards all pending edits.
    pub fn reset(&mut self, canonical: &CanonicalState) {
        self.initialize(canonical.keys().cloned());
    }

    /// Grants or revokes a single matrix cell.
    ///
    /// Idempotent: returns `Ok(false)` when the cell is already in the
    /// requested state. Surrounding whitespace on the resource is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the resource is malformed or the
    /// action is not part of the [`Action`] vocabulary. The set is left
    /// untouched.
    pub fn toggle(&mut self, resource: &str, action: &str, checked: bool) -> Result<bool> {
        let action = Action::parse(action).ok_or_else(|| {
            Error::InvalidInput(format!(
                "action '{action}' is not editable in the permission matrix"
            ))
        })?;
        let key = PermissionKey::for_action(resource.trim(), action)?;
        Ok(self.set(key, checked))
    }

    /// Grants or revokes every vocabulary action on a resource.
    ///
    /// Only the four matrix actions are touched; custom actions on the same
    /// resource are kept. Returns how many keys changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the resource is malformed.
    pub fn toggle_all(&mut self, resource: &str, checked: bool) -> Result<usize> {
        let resource = resource.trim();
        let keys = Action::all()
            .iter()
            .map(|action| PermissionKey::for_action(resource, *action))
            .collect::<Result<Vec<_>>>()?;

        Ok(keys
            .into_iter()
            .filter(|key| self.set(key.clone(), checked))
            .count())
    }

    fn set(&mut self, key: PermissionKey, checked: bool) -> bool {
        if checked {
            self.keys.insert(key)
        } else {
            self.keys.remove(&key)
        }
    }

    /// Returns true if the key is wanted.
    #[must_use]
    pub fn contains(&self, key: &PermissionKey) -> bool {
        self.keys.contains(key)
    }

    /// Returns the keys in lexicographic order.
    #[must_use]
    pub const fn keys(&self) -> &BTreeSet<PermissionKey> {
        &self.keys
    }

    /// Number of wanted permissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if nothing is wanted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

//! Difference between canonical and desired permission sets.

use super::DesiredState;
use crate::models::{CanonicalState, PermissionKey};
use std::collections::BTreeSet;

/// Presentation annotation for one matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeStatus {
    /// Wanted but not yet on the service.
    Added,
    /// On the service but no longer wanted.
    Removed,
    /// Desired matches canonical.
    Unchanged,
}

/// Additions and removals that turn canonical state into desired state.
///
/// Always derived from two snapshots and never edited directly, so
/// `desired == (canonical \ removed) ∪ added` holds by construction.
/// Both sets enumerate in lexicographic key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    added: BTreeSet<PermissionKey>,
    removed: BTreeSet<PermissionKey>,
}

impl Diff {
    /// Computes `added = D \ C` and `removed = C \ D`.
    #[must_use]
    pub fn compute(canonical: &CanonicalState, desired: &DesiredState) -> Self {
        let added = desired
            .keys()
            .iter()
            .filter(|key| !canonical.contains(key))
            .cloned()
            .collect();
        let removed = canonical
            .keys()
            .filter(|key| !desired.contains(key))
            .cloned()
            .collect();

        Self { added, removed }
    }

    /// Keys to create.
    #[must_use]
    pub const fn added(&self) -> &BTreeSet<PermissionKey> {
        &self.added
    }

    /// Keys to delete.
    #[must_use]
    pub const fn removed(&self) -> &BTreeSet<PermissionKey> {
        &self.removed
    }

    /// Returns true when there is nothing to commit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Total number of pending changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// Returns the annotation for a key.
    #[must_use]
    pub fn status(&self, key: &PermissionKey) -> ChangeStatus {
        if self.added.contains(key) {
            ChangeStatus::Added
        } else if self.removed.contains(key) {
            ChangeStatus::Removed
        } else {
            ChangeStatus::Unchanged
        }
    }

    /// Returns true if any pending change touches the resource.
    #[must_use]
    pub fn touches_resource(&self, resource: &str) -> bool {
        self.added
            .iter()
            .chain(self.removed.iter())
            .any(|key| key.resource() == resource)
    }

    /// Applies the diff to a canonical snapshot, yielding the desired keys.
    #[must_use]
    pub fn apply(&self, canonical: &CanonicalState) -> BTreeSet<PermissionKey> {
        canonical
            .keys()
            .filter(|key| !self.removed.contains(key))
            .chain(self.added.iter())
            .cloned()
            .collect()
    }
}

//! Resource × action grid derived from desired state and the diff.

use super::{ChangeStatus, DesiredState, Diff};
use crate::models::{Action, CanonicalState, PermissionKey};
use std::collections::BTreeSet;

/// Distinct resources that get a matrix row.
///
/// The union of canonical and desired resources, so a resource with only a
/// pending addition still renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceMatrix {
    resources: BTreeSet<String>,
}

impl ResourceMatrix {
    /// Collects resources from both snapshots.
    #[must_use]
    pub fn new(canonical: &CanonicalState, desired: &DesiredState) -> Self {
        let resources = canonical
            .keys()
            .chain(desired.keys().iter())
            .map(|key| key.resource().to_string())
            .collect();
        Self { resources }
    }

    /// Returns true if the resource has a row.
    #[must_use]
    pub fn contains(&self, resource: &str) -> bool {
        self.resources.contains(resource)
    }

    /// Iterates resources in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(String::as_str)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// One checkbox in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixCell {
    /// Column.
    pub action: Action,
    /// Whether the permission is wanted.
    pub checked: bool,
    /// Highlight relative to canonical state.
    pub status: ChangeStatus,
}

/// One resource row in the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    /// Row label.
    pub resource: String,
    /// State of the row's "all" checkbox.
    pub all_checked: bool,
    /// Whether any cell in the row has a pending change.
    pub has_changes: bool,
    /// Cells in [`Action::all`] order.
    pub cells: Vec<MatrixCell>,
}

/// Read-only view over a desired state and its diff.
///
/// Annotations come from the diff and never feed back into the desired
/// state. Build a new presenter after every edit.
#[derive(Debug)]
pub struct MatrixPresenter<'a> {
    desired: &'a DesiredState,
    diff: Diff,
    resources: ResourceMatrix,
}

impl<'a> MatrixPresenter<'a> {
    /// Builds the view, computing a fresh diff.
    #[must_use]
    pub fn new(canonical: &CanonicalState, desired: &'a DesiredState) -> Self {
        Self {
            desired,
            diff: Diff::compute(canonical, desired),
            resources: ResourceMatrix::new(canonical, desired),
        }
    }

    /// Returns true if `(resource, action)` is checked.
    #[must_use]
    pub fn has_permission(&self, resource: &str, action: Action) -> bool {
        PermissionKey::for_action(resource, action).is_ok_and(|key| self.desired.contains(&key))
    }

    /// Returns true if every vocabulary action is checked for the resource.
    #[must_use]
    pub fn has_all_permissions(&self, resource: &str) -> bool {
        Action::all()
            .iter()
            .all(|action| self.has_permission(resource, *action))
    }

    /// Returns the highlight for a cell.
    #[must_use]
    pub fn change_status(&self, resource: &str, action: Action) -> ChangeStatus {
        PermissionKey::for_action(resource, action)
            .map_or(ChangeStatus::Unchanged, |key| self.diff.status(&key))
    }

    /// Returns true if any cell of the resource has a pending change.
    #[must_use]
    pub fn resource_has_changes(&self, resource: &str) -> bool {
        Action::all()
            .iter()
            .any(|action| self.change_status(resource, *action) != ChangeStatus::Unchanged)
    }

    /// Returns the row index.
    #[must_use]
    pub const fn resources(&self) -> &ResourceMatrix {
        &self.resources
    }

    /// Returns the diff the annotations were computed from.
    #[must_use]
    pub const fn diff(&self) -> &Diff {
        &self.diff
    }

    /// Builds every row of the grid.
    #[must_use]
    pub fn rows(&self) -> Vec<MatrixRow> {
        self.resources
            .iter()
            .map(|resource| MatrixRow {
                resource: resource.to_string(),
                all_checked: self.has_all_permissions(resource),
                has_changes: self.resource_has_changes(resource),
                cells: Action::all()
                    .iter()
                    .map(|action| MatrixCell {
                        action: *action,
                        checked: self.has_permission(resource, *action),
                        status: self.change_status(resource, *action),
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalPermission, PermissionId};

    fn canonical(pairs: &[(&str, &str)]) -> CanonicalState {
        CanonicalState::from_permissions(pairs.iter().enumerate().map(|(i, (r, a))| {
            CanonicalPermission::new(
                PermissionId::new(format!("p{i}")),
                PermissionKey::new(*r, *a).unwrap(),
            )
        }))
    }

    #[test]
    fn test_pending_resource_gets_a_row() {
        let base = canonical(&[("user", "read")]);
        let mut desired = DesiredState::from_canonical(&base);
        desired.toggle("report", "read", true).unwrap();

        let presenter = MatrixPresenter::new(&base, &desired);
        let rows: Vec<_> = presenter.resources().iter().collect();
        assert_eq!(rows, vec!["report", "user"]);
        assert_eq!(
            presenter.change_status("report", Action::Read),
            ChangeStatus::Added
        );
    }

    #[test]
    fn test_has_all_permissions() {
        let base = canonical(&[("user", "read"), ("user", "create"), ("user", "update")]);
        let mut desired = DesiredState::from_canonical(&base);

        let presenter = MatrixPresenter::new(&base, &desired);
        assert!(!presenter.has_all_permissions("user"));

        desired.toggle("user", "delete", true).unwrap();
        let presenter = MatrixPresenter::new(&base, &desired);
        assert!(presenter.has_all_permissions("user"));
        assert!(presenter.resource_has_changes("user"));
    }

    #[test]
    fn test_removed_cell_is_unchecked_and_marked() {
        let base = canonical(&[("user", "read"), ("user", "update")]);
        let mut desired = DesiredState::from_canonical(&base);
        desired.toggle("user", "update", false).unwrap();

        let presenter = MatrixPresenter::new(&base, &desired);
        assert!(!presenter.has_permission("user", Action::Update));
        assert_eq!(
            presenter.change_status("user", Action::Update),
            ChangeStatus::Removed
        );
        assert_eq!(
            presenter.change_status("user", Action::Read),
            ChangeStatus::Unchanged
        );
    }

    #[test]
    fn test_custom_action_resource_renders_unchecked_row() {
        let base = canonical(&[("audit", "export")]);
        let desired = DesiredState::from_canonical(&base);
        let presenter = MatrixPresenter::new(&base, &desired);

        let rows = presenter.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resource, "audit");
        assert!(rows[0].cells.iter().all(|cell| !cell.checked));
        assert!(!rows[0].has_changes);
    }

    #[test]
    fn test_rows_follow_column_order() {
        let base = canonical(&[("user", "delete")]);
        let desired = DesiredState::from_canonical(&base);
        let rows = MatrixPresenter::new(&base, &desired).rows();

        let columns: Vec<_> = rows[0].cells.iter().map(|c| c.action).collect();
        assert_eq!(columns, Action::all().to_vec());
        assert!(rows[0].cells[3].checked);
    }
}

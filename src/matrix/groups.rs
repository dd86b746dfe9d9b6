//! Read-only grouped view with search, covering custom actions too.

use crate::models::PermissionKey;
use std::collections::BTreeMap;

/// Permissions grouped by resource, actions sorted within each group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionGroups {
    groups: BTreeMap<String, Vec<String>>,
}

impl PermissionGroups {
    /// Groups a set of keys by resource.
    #[must_use]
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a PermissionKey>) -> Self {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in keys {
            groups
                .entry(key.resource().to_string())
                .or_default()
                .push(key.action().to_string());
        }
        for actions in groups.values_mut() {
            actions.sort();
            actions.dedup();
        }
        Self { groups }
    }

    /// Narrows the view to a search query.
    ///
    /// Case-insensitive. A resource whose name matches keeps all of its
    /// actions; otherwise only matching actions survive, and resources with
    /// none left are dropped. A blank query keeps everything.
    #[must_use]
    pub fn filter(&self, query: &str) -> Self {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.clone();
        }

        let groups = self
            .groups
            .iter()
            .filter_map(|(resource, actions)| {
                if resource.to_lowercase().contains(&query) {
                    return Some((resource.clone(), actions.clone()));
                }
                let matching: Vec<String> = actions
                    .iter()
                    .filter(|action| action.to_lowercase().contains(&query))
                    .cloned()
                    .collect();
                (!matching.is_empty()).then(|| (resource.clone(), matching))
            })
            .collect();

        Self { groups }
    }

    /// Iterates `(resource, actions)` in resource order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups
            .iter()
            .map(|(resource, actions)| (resource.as_str(), actions.as_slice()))
    }

    /// Actions for one resource.
    #[must_use]
    pub fn actions(&self, resource: &str) -> Option<&[String]> {
        self.groups.get(resource).map(Vec::as_slice)
    }

    /// Number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no resource is shown.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

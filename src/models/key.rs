//! Structured permission keys.

use super::Action;
use crate::{Error, Result};
use std::fmt;

/// Character reserved for the `resource:action` display form.
///
/// Neither component of a key may contain it, so the display form always
/// splits back into exactly one key.
pub const KEY_SEPARATOR: char = ':';

/// A `(resource, action)` pair identifying one grantable permission.
///
/// Equality, hashing, and ordering are defined over both fields; ordering
/// is lexicographic by resource, then action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionKey {
    resource: String,
    action: String,
}

impl PermissionKey {
    /// Creates a validated key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if either component is blank, has
    /// surrounding whitespace, or contains [`KEY_SEPARATOR`] or control
    /// characters.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Result<Self> {
        let resource = resource.into();
        let action = action.into();
        validate_component("resource", &resource)?;
        validate_component("action", &action)?;
        Ok(Self { resource, action })
    }

    /// Creates a key for a vocabulary action.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the resource is malformed.
    pub fn for_action(resource: impl Into<String>, action: Action) -> Result<Self> {
        Self::new(resource, action.as_str())
    }

    /// Parses the `resource:action` form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless the input contains exactly one
    /// separator with a valid component on each side.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(KEY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(resource), Some(action), None) => Self::new(resource, action),
            _ => Err(Error::InvalidInput(format!(
                "expected 'resource{KEY_SEPARATOR}action', got '{s}'"
            ))),
        }
    }

    /// Returns the resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the vocabulary action, if this key has one.
    ///
    /// Matching is exact: a remote `READ` permission is not the matrix's
    /// `read` cell.
    #[must_use]
    pub fn vocabulary_action(&self) -> Option<Action> {
        Action::all()
            .iter()
            .copied()
            .find(|a| a.as_str() == self.action)
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.resource, self.action)
    }
}

fn validate_component(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{kind} cannot be empty")));
    }
    if value.trim() != value {
        return Err(Error::InvalidInput(format!(
            "{kind} '{value}' has leading or trailing whitespace"
        )));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(Error::InvalidInput(format!(
            "{kind} '{value}' contains reserved character '{KEY_SEPARATOR}'"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::InvalidInput(format!(
            "{kind} contains control characters"
        )));
    }
    Ok(())
}

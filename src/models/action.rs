//! Matrix action vocabulary.

use std::fmt;

/// Actions the permission matrix can edit.
///
/// This is a closed set. Permissions with other actions can exist on the
/// service (created through the free-form path) but never appear as matrix
/// cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// View a resource.
    Read,
    /// Create a resource.
    Create,
    /// Modify a resource.
    Update,
    /// Remove a resource.
    Delete,
}

impl Action {
    /// Returns every action in matrix column order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Read, Self::Create, Self::Update, Self::Delete]
    }

    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Returns the column label shown to the operator.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }

    /// Parses an action name, case-insensitively.
    ///
    /// Returns `None` for anything outside the vocabulary.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "read" => Some(Self::Read),
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

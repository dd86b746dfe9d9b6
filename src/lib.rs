//! # Rolegrid
//!
//! Permission-set reconciliation for a role-based access control service.
//!
//! An operator edits a role's (resource, action) permission matrix as a
//! batch of pending changes. Rolegrid computes the minimal difference
//! against the last-known server state and applies it as concurrent
//! create/delete calls. After every commit it refetches the role's
//! permissions so local state matches the service, even after partial
//! failure.
//!
//! ## Layers
//!
//! - [`models`]: permission keys, the action vocabulary, canonical snapshots
//! - [`matrix`]: desired state, diff engine, matrix presenter
//! - [`client`]: the [`PermissionService`] seam with HTTP and in-memory backends
//! - [`services`]: catalog loading, commit orchestration, editing sessions
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rolegrid::{EditingSession, InMemoryPermissionService, RoleId};
//!
//! let service = Arc::new(InMemoryPermissionService::new());
//! let role = RoleId::new("editors");
//! service.seed(&role, "user", "read")?;
//!
//! let mut session = EditingSession::new(service, role);
//! session.load()?;
//! session.toggle("user", "create", true)?;
//! assert_eq!(session.diff()?.added().len(), 1);
//!
//! session.commit()?;
//! assert!(session.diff()?.is_empty());
//! # Ok::<(), rolegrid::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod client;
pub mod config;
pub mod matrix;
pub mod models;
pub mod observability;
pub mod services;

pub use client::{HttpPermissionService, InMemoryPermissionService, PermissionService};
pub use config::ConsoleConfig;
pub use matrix::{ChangeStatus, DesiredState, Diff, MatrixPresenter, PermissionGroups};
pub use models::{Action, CanonicalPermission, CanonicalState, PermissionId, PermissionKey, RoleId};
pub use services::{CatalogLoader, CommitOrchestrator, CommitReport, EditingSession};

/// Error type for rolegrid operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed permission key, non-matrix action in a toggle, bad config |
/// | `OperationFailed` | Transport errors, undecodable responses, config file I/O |
/// | `Service` | The permission service answered with an HTTP error status |
/// | `NotLoaded` | Editing before the first successful catalog load |
/// | `CommitFailed` | One or more create/delete calls of a commit failed |
/// | `Resync` | The refetch after a commit failed |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A permission resource or action is blank, untrimmed, or contains the
    ///   separator
    /// - A matrix toggle names an action outside the vocabulary
    /// - Configuration values fail validation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed before the service could answer.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The permission service rejected a request.
    #[error("operation '{operation}' rejected with status {status}: {message}")]
    Service {
        /// The operation that was rejected.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Error detail reported by the service.
        message: String,
    },

    /// Canonical state has not been loaded yet.
    #[error("permissions for role '{0}' have not been loaded")]
    NotLoaded(String),

    /// Some calls of a commit failed.
    ///
    /// Local state has already been resynchronized from the service when
    /// this is returned.
    #[error("commit failed: {failed} of {attempted} changes were not applied")]
    CommitFailed {
        /// Number of failed calls.
        failed: usize,
        /// Number of calls issued.
        attempted: usize,
        /// One line per failed call.
        failures: Vec<String>,
    },

    /// The refetch after a commit failed; local state may be stale.
    #[error("failed to refresh permissions after commit ({failed} of {attempted} changes failed): {cause}")]
    Resync {
        /// Number of failed commit calls.
        failed: usize,
        /// Number of commit calls issued.
        attempted: usize,
        /// One line per failed commit call.
        failures: Vec<String>,
        /// Why the refetch failed.
        cause: String,
    },
}

/// Result type alias for rolegrid operations.
pub type Result<T> = std::result::Result<T, Error>;

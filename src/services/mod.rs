//! Business logic services.
//!
//! Services drive a [`PermissionService`](crate::client::PermissionService)
//! on behalf of an editing session.

mod catalog;
mod commit;
mod session;

pub use catalog::CatalogLoader;
pub use commit::{ChangeKind, CommitFailure, CommitOrchestrator, CommitReport, MAX_IN_FLIGHT};
pub use session::EditingSession;

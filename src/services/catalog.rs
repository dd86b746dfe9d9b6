//! Permission catalog loading.

use crate::Result;
use crate::client::PermissionService;
use crate::models::{CanonicalState, RoleId};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Fetches a role's permissions and builds a [`CanonicalState`].
pub struct CatalogLoader {
    service: Arc<dyn PermissionService>,
}

impl CatalogLoader {
    /// Creates a loader backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn PermissionService>) -> Self {
        Self { service }
    }

    /// Loads the canonical permission set of a role.
    ///
    /// When the service returns the same key twice, the first record wins.
    ///
    /// # Errors
    ///
    /// Returns the service error if the list cannot be fetched. No partial
    /// state is produced.
    #[instrument(skip(self), fields(operation = "catalog.load", backend = self.service.name()))]
    pub fn load(&self, role: &RoleId) -> Result<CanonicalState> {
        let start = Instant::now();
        let result = self
            .service
            .list_permissions(role)
            .map(CanonicalState::from_permissions);

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("permission_catalog_loads_total", "status" => status).increment(1);
        metrics::histogram!("permission_catalog_load_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(state) => tracing::debug!(role = %role, permissions = state.len(), "Loaded catalog"),
            Err(e) => tracing::warn!(role = %role, error = %e, "Failed to load catalog"),
        }

        result
    }
}

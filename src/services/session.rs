//! Editing session for one role.

use super::{CatalogLoader, CommitOrchestrator, CommitReport};
use crate::client::PermissionService;
use crate::matrix::{DesiredState, Diff, MatrixPresenter, PermissionGroups};
use crate::models::{CanonicalState, PermissionKey, RoleId};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone)]
struct Loaded {
    canonical: CanonicalState,
    desired: DesiredState,
}

/// Canonical and desired state of one role, owned by one operator.
///
/// Nothing is editable until [`load`](Self::load) succeeds. A failed load
/// leaves whatever state the session had before.
pub struct EditingSession {
    role: RoleId,
    loader: CatalogLoader,
    orchestrator: CommitOrchestrator,
    state: Option<Loaded>,
    needs_reload: bool,
}

impl EditingSession {
    /// Creates an unloaded session.
    #[must_use]
    pub fn new(service: Arc<dyn PermissionService>, role: RoleId) -> Self {
        Self {
            role,
            loader: CatalogLoader::new(Arc::clone(&service)),
            orchestrator: CommitOrchestrator::new(service),
            state: None,
            needs_reload: false,
        }
    }

    /// The role being edited.
    #[must_use]
    pub const fn role(&self) -> &RoleId {
        &self.role
    }

    /// Returns true once canonical state has been loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// Returns true if the refetch after the last commit failed.
    ///
    /// Local state may not match the service until the next successful
    /// [`load`](Self::load).
    #[must_use]
    pub const fn needs_reload(&self) -> bool {
        self.needs_reload
    }

    /// Fetches canonical state and seeds desired state from it.
    ///
    /// Discards pending edits.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; existing state is kept.
    pub fn load(&mut self) -> Result<()> {
        let canonical = self.loader.load(&self.role)?;
        let desired = DesiredState::from_canonical(&canonical);
        self.state = Some(Loaded { canonical, desired });
        self.needs_reload = false;
        Ok(())
    }

    fn loaded(&self) -> Result<&Loaded> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::NotLoaded(self.role.to_string()))
    }

    fn loaded_mut(&mut self) -> Result<&mut Loaded> {
        let role = &self.role;
        self.state
            .as_mut()
            .ok_or_else(|| Error::NotLoaded(role.to_string()))
    }

    /// The last loaded canonical snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first load.
    pub fn canonical(&self) -> Result<&CanonicalState> {
        Ok(&self.loaded()?.canonical)
    }

    /// The operator's pending permission set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first load.
    pub fn desired(&self) -> Result<&DesiredState> {
        Ok(&self.loaded()?.desired)
    }

    /// Grants or revokes one matrix cell. See [`DesiredState::toggle`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first load, or
    /// [`Error::InvalidInput`] for a malformed key.
    pub fn toggle(&mut self, resource: &str, action: &str, checked: bool) -> Result<bool> {
        self.loaded_mut()?.desired.toggle(resource, action, checked)
    }

    /// Grants or revokes a whole matrix row. See [`DesiredState::toggle_all`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first load, or
    /// [`Error::InvalidInput`] for a malformed resource.
    pub fn toggle_all(&mut self, resource: &str, checked: bool) -> Result<usize> {
        self.loaded_mut()?.desired.toggle_all(resource, checked)
    }

    /// Discards pending edits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first load.
    pub fn reset(&mut self) -> Result<()> {
        let state = self.loaded_mut()?;
        state.desired.reset(&state.canonical);
        Ok(())
    }

    /// Computes the pending changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first load.
    pub fn diff(&self) -> Result<Diff> {
        let state = self.loaded()?;
        Ok(Diff::compute(&state.canonical, &state.desired))
    }

    /// Builds the matrix view of the current state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first load.
    pub fn presenter(&self) -> Result<MatrixPresenter<'_>> {
        let state = self.loaded()?;
        Ok(MatrixPresenter::new(&state.canonical, &state.desired))
    }

    /// Groups the desired keys by resource, for the search view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`] before the first load.
    pub fn groups(&self) -> Result<PermissionGroups> {
        Ok(PermissionGroups::from_keys(self.loaded()?.desired.keys()))
    }

    /// Commits pending edits and resynchronizes from the service.
    ///
    /// See [`CommitOrchestrator::commit`]. When the refetch fails,
    /// [`needs_reload`](Self::needs_reload) is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotLoaded`], [`Error::CommitFailed`] or
    /// [`Error::Resync`].
    pub fn commit(&mut self) -> Result<CommitReport> {
        let Some(state) = self.state.as_mut() else {
            return Err(Error::NotLoaded(self.role.to_string()));
        };
        let result = self
            .orchestrator
            .commit(&self.role, &mut state.canonical, &mut state.desired);
        self.needs_reload = matches!(result, Err(Error::Resync { .. }));
        result
    }

    /// Creates permissions outside the matrix, then reloads once.
    ///
    /// Actions may lie outside the vocabulary. Surrounding whitespace is
    /// trimmed and repeated actions are created once. Every key is validated
    /// before any call is issued. The creates share the commit path's
    /// bounded dispatch. Pending matrix edits are discarded by the reload.
    ///
    /// # Errors
    ///
    /// - [`Error::NotLoaded`] before the first load.
    /// - [`Error::InvalidInput`] if no action is given or a key is
    ///   malformed; nothing is sent.
    /// - [`Error::CommitFailed`] if any create failed; state was reloaded.
    /// - [`Error::Resync`] if the reload failed.
    #[instrument(skip(self, actions), fields(operation = "session.create_custom", role = %self.role))]
    pub fn create_custom<S: AsRef<str>>(
        &mut self,
        resource: &str,
        actions: &[S],
    ) -> Result<CommitReport> {
        self.loaded()?;
        if actions.is_empty() {
            return Err(Error::InvalidInput(
                "at least one action is required".to_string(),
            ));
        }
        let keys = actions
            .iter()
            .map(|action| PermissionKey::new(resource.trim(), action.as_ref().trim()))
            .collect::<Result<BTreeSet<_>>>()?;

        let report = self.orchestrator.create_all(&self.role, &keys);

        if let Err(e) = self.load() {
            tracing::warn!(error = %e, "Reload after create failed");
            self.needs_reload = true;
            return Err(report.into_resync_error(&e));
        }
        report.into_result()
    }
}

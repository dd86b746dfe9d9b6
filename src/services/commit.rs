//! Commit orchestration.
//!
//! A commit turns a [`Diff`] into create and delete calls, issues them
//! concurrently, waits for all of them, then refetches the role's
//! permissions and reseeds the desired state from what the service reports.
//! The refetch runs whether or not the calls succeeded: after a partial
//! failure the remote state is known only to the service.

use super::CatalogLoader;
use crate::client::PermissionService;
use crate::matrix::{DesiredState, Diff};
use crate::models::{CanonicalState, PermissionId, PermissionKey, RoleId};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Instant;
use tracing::instrument;

/// Upper bound on calls in flight at once.
pub const MAX_IN_FLIGHT: usize = 16;

/// Kind of remote call issued for one pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Create call for an added key.
    Create,
    /// Delete call for a removed key.
    Delete,
}

impl ChangeKind {
    /// Returns the kind name, used as a metrics label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending change that was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    /// The key the change was for.
    pub key: PermissionKey,
    /// The call that failed.
    pub kind: ChangeKind,
    /// Why it failed.
    pub error: String,
}

impl fmt::Display for CommitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.key, self.error)
    }
}

/// Outcome of the calls issued by one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Keys created, in key order.
    pub created: Vec<PermissionKey>,
    /// Keys deleted, in key order.
    pub deleted: Vec<PermissionKey>,
    /// Changes that were not applied, in key order within each kind.
    pub failures: Vec<CommitFailure>,
}

impl CommitReport {
    /// Number of pending changes the commit handled.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.created.len() + self.deleted.len() + self.failures.len()
    }

    /// Returns true when nothing was committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempted() == 0
    }

    /// Returns true when every change was applied.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Builds the error returned when the refetch after these calls failed.
    ///
    /// Keeps one line per failed change so the operator still learns which
    /// changes did not apply.
    #[must_use]
    pub fn into_resync_error(self, cause: &Error) -> Error {
        Error::Resync {
            failed: self.failures.len(),
            attempted: self.attempted(),
            failures: self.failures.iter().map(ToString::to_string).collect(),
            cause: cause.to_string(),
        }
    }

    /// Converts the report into an error if any change failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommitFailed`] listing each failed change.
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        Err(Error::CommitFailed {
            failed: self.failures.len(),
            attempted: self.attempted(),
            failures: self.failures.iter().map(ToString::to_string).collect(),
        })
    }
}

/// Result of one call, with the error rendered for the report.
type CallOutcome = std::result::Result<(), String>;

/// One call to issue.
enum Call {
    Create(PermissionKey),
    Delete(PermissionKey, PermissionId),
}

impl Call {
    const fn kind(&self) -> ChangeKind {
        match self {
            Self::Create(_) => ChangeKind::Create,
            Self::Delete(..) => ChangeKind::Delete,
        }
    }

    const fn key(&self) -> &PermissionKey {
        match self {
            Self::Create(key) | Self::Delete(key, _) => key,
        }
    }
}

/// Applies diffs to the permission service and resynchronizes afterwards.
pub struct CommitOrchestrator {
    service: Arc<dyn PermissionService>,
    loader: CatalogLoader,
}

impl CommitOrchestrator {
    /// Creates an orchestrator backed by `service`.
    #[must_use]
    pub fn new(service: Arc<dyn PermissionService>) -> Self {
        let loader = CatalogLoader::new(Arc::clone(&service));
        Self { service, loader }
    }

    /// Commits the pending edits of a role.
    ///
    /// An empty diff issues no calls and leaves both states untouched.
    /// Otherwise every change is issued, the canonical state is refetched,
    /// and `desired` is reinitialized from it, even when calls failed.
    ///
    /// # Errors
    ///
    /// - [`Error::CommitFailed`] if any call failed; both states have
    ///   already been replaced by the refetched snapshot.
    /// - [`Error::Resync`] if the refetch failed; both states are left as
    ///   they were and must be reloaded before further edits are trusted.
    #[instrument(skip(self, canonical, desired), fields(operation = "commit.run"))]
    pub fn commit(
        &self,
        role: &RoleId,
        canonical: &mut CanonicalState,
        desired: &mut DesiredState,
    ) -> Result<CommitReport> {
        let diff = Diff::compute(canonical, desired);
        if diff.is_empty() {
            tracing::debug!(role = %role, "Nothing to commit");
            return Ok(CommitReport::default());
        }

        let start = Instant::now();
        let report = self.execute(role, &diff, canonical);

        let refreshed = match self.loader.load(role) {
            Ok(state) => state,
            Err(e) => {
                record_commit("resync_error", start);
                tracing::warn!(role = %role, error = %e, "Refetch after commit failed");
                return Err(report.into_resync_error(&e));
            },
        };

        desired.initialize(refreshed.keys().cloned());
        *canonical = refreshed;

        let status = if report.is_success() { "success" } else { "partial" };
        record_commit(status, start);
        tracing::info!(
            role = %role,
            created = report.created.len(),
            deleted = report.deleted.len(),
            failed = report.failures.len(),
            "Commit finished"
        );

        report.into_result()
    }

    /// Issues the create and delete calls for `diff` and waits for all.
    ///
    /// Calls run concurrently, at most [`MAX_IN_FLIGHT`] at a time, with no
    /// ordering between them. A removed key with no canonical entry is
    /// reported as failed without a call. Does not refetch.
    #[instrument(skip(self, diff, canonical), fields(operation = "commit.execute", changes = diff.len()))]
    pub fn execute(&self, role: &RoleId, diff: &Diff, canonical: &CanonicalState) -> CommitReport {
        let mut report = CommitReport::default();
        let mut calls: Vec<Call> = diff.added().iter().cloned().map(Call::Create).collect();

        for key in diff.removed() {
            match canonical.get(key) {
                Some(permission) => {
                    calls.push(Call::Delete(key.clone(), permission.remote_id.clone()));
                },
                None => report.failures.push(CommitFailure {
                    key: key.clone(),
                    kind: ChangeKind::Delete,
                    error: "no remote id for permission".to_string(),
                }),
            }
        }

        self.dispatch(role, &calls, &mut report);
        report
    }

    /// Creates every key on the service and waits for all.
    ///
    /// Uses the same bounded dispatch as [`execute`](Self::execute). Does
    /// not refetch.
    #[instrument(skip(self, keys), fields(operation = "commit.create_all", changes = keys.len()))]
    pub fn create_all(&self, role: &RoleId, keys: &BTreeSet<PermissionKey>) -> CommitReport {
        let calls: Vec<Call> = keys.iter().cloned().map(Call::Create).collect();
        let mut report = CommitReport::default();
        self.dispatch(role, &calls, &mut report);
        report
    }

    /// Runs `calls` and folds the outcomes into `report`, sorted by key.
    fn dispatch(&self, role: &RoleId, calls: &[Call], report: &mut CommitReport) {
        for (call, outcome) in calls.iter().zip(self.run_pool(role, calls)) {
            record_call(call.kind(), outcome.is_ok());
            match (outcome, call) {
                (Ok(()), Call::Create(key)) => report.created.push(key.clone()),
                (Ok(()), Call::Delete(key, _)) => report.deleted.push(key.clone()),
                (Err(error), _) => {
                    tracing::warn!(
                        role = %role,
                        key = %call.key(),
                        kind = call.kind().as_str(),
                        error = %error,
                        "Permission change failed"
                    );
                    report.failures.push(CommitFailure {
                        key: call.key().clone(),
                        kind: call.kind(),
                        error,
                    });
                },
            }
        }

        report.created.sort();
        report.deleted.sort();
        report
            .failures
            .sort_by(|a, b| (a.kind.as_str(), &a.key).cmp(&(b.kind.as_str(), &b.key)));
    }

    /// Issues `calls` from a pool of at most [`MAX_IN_FLIGHT`] workers.
    ///
    /// Each worker takes the next unclaimed call as soon as its previous one
    /// returns, so one slow call never holds back the rest. Outcomes come
    /// back in `calls` order. Calls claimed by a worker that panicked are
    /// reported as failed.
    fn run_pool(&self, role: &RoleId, calls: &[Call]) -> Vec<CallOutcome> {
        let workers = calls.len().min(MAX_IN_FLIGHT);
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel();

        std::thread::scope(|s| {
            let next = &next;
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let tx = tx.clone();
                    s.spawn(move || {
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(call) = calls.get(index) else {
                                break;
                            };
                            // The receiver outlives the scope.
                            let _ = tx.send((index, self.issue(role, call)));
                        }
                    })
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    tracing::error!(role = %role, "Commit worker panicked");
                }
            }
        });
        drop(tx);

        let mut outcomes: Vec<Option<CallOutcome>> =
            std::iter::repeat_with(|| None).take(calls.len()).collect();
        for (index, outcome) in rx {
            if let Some(slot) = outcomes.get_mut(index) {
                *slot = Some(outcome);
            }
        }
        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(|| Err("call panicked".to_string())))
            .collect()
    }

    fn issue(&self, role: &RoleId, call: &Call) -> CallOutcome {
        tracing::debug!(role = %role, key = %call.key(), kind = call.kind().as_str(), "Dispatching");
        let result = match call {
            Call::Create(key) => self.service.create_permission(role, key).map(|_| ()),
            Call::Delete(_, id) => self.service.delete_permission(id),
        };
        result.map_err(|e| e.to_string())
    }
}

fn record_call(kind: ChangeKind, ok: bool) {
    let status = if ok { "success" } else { "error" };
    metrics::counter!(
        "permission_commit_calls_total",
        "kind" => kind.as_str(),
        "status" => status
    )
    .increment(1);
}

fn record_commit(status: &'static str, start: Instant) {
    metrics::counter!("permission_commit_total", "status" => status).increment(1);
    metrics::histogram!("permission_commit_duration_ms")
        .record(start.elapsed().as_secs_f64() * 1000.0);
}

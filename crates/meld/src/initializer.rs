//! "Ensure my schema exists" entry point.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::guard::ConcurrentGuard;
use crate::ledger::VersionLedger;
use crate::reconciler::{ReconcileOutcome, SchemaReconciler};
use crate::target::{Target, TargetConnection};

/// Runs the reconciler at most once per target and connection.
///
/// Components that each need a schema can all call
/// [`ensure_schema`](Self::ensure_schema); only the first call for a given
/// key reconciles, later ones return [`ReconcileOutcome::AlreadyAdmitted`].
/// Share the guard between initializers to widen the scope of "once".
pub struct SchemaInitializer {
    guard: Arc<ConcurrentGuard>,
    reconciler: SchemaReconciler,
}

impl SchemaInitializer {
    /// Creates an initializer with its own guard.
    pub fn new(reconciler: SchemaReconciler) -> Self {
        Self::with_guard(Arc::new(ConcurrentGuard::new()), reconciler)
    }

    /// Creates an initializer sharing `guard`.
    pub fn with_guard(guard: Arc<ConcurrentGuard>, reconciler: SchemaReconciler) -> Self {
        Self { guard, reconciler }
    }

    /// Returns the guard.
    #[must_use]
    pub fn guard(&self) -> &Arc<ConcurrentGuard> {
        &self.guard
    }

    /// Returns the reconciler.
    #[must_use]
    pub fn reconciler(&self) -> &SchemaReconciler {
        &self.reconciler
    }

    /// Reconciles `target` unless it was already admitted for this
    /// connection.
    ///
    /// The key is consumed even when reconciliation fails.
    pub async fn ensure_schema(
        &self,
        target: &Target,
        connection: &mut dyn TargetConnection,
        ledger: &dyn VersionLedger,
    ) -> Result<ReconcileOutcome> {
        let key = target.guard_key(connection.identity());
        if !self.guard.try_admit(key.as_str()) {
            debug!(key = %key, "Schema already initialized");
            return Ok(ReconcileOutcome::AlreadyAdmitted);
        }

        self.reconciler.initialize(target, connection, ledger).await
    }
}

//! Brings a target's schema up to the version of its script catalog.

use std::sync::Arc;

use tracing::{debug, info};

use crate::apply::{ApplyUnit, PlannedBatch};
use crate::catalog::Catalog;
use crate::config::MeldConfig;
use crate::error::{MeldError, Result};
use crate::ledger::{StagedScript, VersionLedger, VersionLedgerModel};
use crate::provider::ScriptProvider;
use crate::script::{join_batches, RenderContext};
use crate::target::{Target, TargetConnection};

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The ledger already records the catalog's version.
    UpToDate {
        /// Current version.
        version: u32,
    },
    /// Pending scripts were applied and recorded.
    Migrated {
        /// Version before the migration.
        from: u32,
        /// Version after the migration.
        to: u32,
        /// Number of scripts applied.
        scripts: usize,
    },
    /// Dry run: the rendered plan, neither executed nor recorded.
    DryRun {
        /// Current version.
        from: u32,
        /// Version the plan would reach.
        to: u32,
        /// Batches that would be executed, in order.
        batches: Vec<PlannedBatch>,
    },
    /// The target was already initialized through the same guard.
    AlreadyAdmitted,
}

/// Migrates targets using the scripts of a [`ScriptProvider`].
pub struct SchemaReconciler {
    provider: Arc<dyn ScriptProvider>,
    config: MeldConfig,
}

impl SchemaReconciler {
    /// Creates a reconciler with the default configuration.
    pub fn new(provider: Arc<dyn ScriptProvider>) -> Self {
        Self {
            provider,
            config: MeldConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: MeldConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MeldConfig {
        &self.config
    }

    /// Loads and validates the catalog named `name`.
    ///
    /// Validation problems are reported through
    /// [`ScriptProvider::report_missing_scripts`].
    pub fn catalog(&self, name: &str) -> Result<Catalog> {
        let scripts = self.provider.get_scripts(name)?;
        Catalog::new(name, scripts)
            .map_err(|issue| self.provider.report_missing_scripts(name, issue.describe(name)))
    }

    /// Migrates `target` to the latest version of the catalog named after it.
    pub async fn initialize(
        &self,
        target: &Target,
        connection: &mut dyn TargetConnection,
        ledger: &dyn VersionLedger,
    ) -> Result<ReconcileOutcome> {
        let catalog = self.catalog(target.name())?;
        self.reconcile(target, &catalog, connection, ledger).await
    }

    /// Migrates `target` to the latest version of `catalog`.
    ///
    /// Pending scripts run in one transaction, except that a script which
    /// cannot run inside a transaction is applied on its own between two
    /// transactions. The ledger is written after each of these steps, so
    /// it never records a version whose changes were not committed.
    pub async fn reconcile(
        &self,
        target: &Target,
        catalog: &Catalog,
        connection: &mut dyn TargetConnection,
        ledger: &dyn VersionLedger,
    ) -> Result<ReconcileOutcome> {
        let mut model = match ledger.get_version(target).await {
            Ok(model) => model,
            Err(MeldError::LedgerNotProvisioned) => {
                debug!(database = %target.name(), "Ledger not provisioned, starting from version 0");
                VersionLedgerModel::new()
            }
            Err(err) => return Err(err),
        };

        let plan = catalog.plan(model.number())?;
        if plan.is_empty() {
            debug!(
                database = %target.name(),
                schema = %target.schema(),
                version = plan.current_version(),
                "Schema is up to date"
            );
            return Ok(ReconcileOutcome::UpToDate {
                version: plan.current_version(),
            });
        }

        let (from, to) = (plan.current_version(), plan.target_version());
        info!(
            database = %target.name(),
            schema = %target.schema(),
            from,
            to,
            "Migrating schema"
        );

        let context = RenderContext::new(
            connection.database_name().await?,
            target.schema(),
            connection.engine_version().await?,
        );

        let mut units: Vec<(ApplyUnit, Vec<StagedScript>)> = Vec::new();
        for script in plan.scripts() {
            let rendered = script.render(&context)?;
            let staged = StagedScript {
                version: script.version(),
                description: script.description().to_string(),
                body: join_batches(&rendered),
            };
            let batches: Vec<PlannedBatch> = rendered
                .into_iter()
                .enumerate()
                .map(|(index, sql)| PlannedBatch {
                    version: script.version(),
                    index,
                    sql,
                })
                .collect();

            let transactional = script.is_transaction_safe();
            let joins_previous =
                transactional && units.last().is_some_and(|(unit, _)| unit.transactional);
            match units.last_mut() {
                Some((unit, scripts)) if joins_previous => {
                    unit.batches.extend(batches);
                    scripts.push(staged);
                }
                _ => units.push((
                    ApplyUnit {
                        transactional,
                        batches,
                    },
                    vec![staged],
                )),
            }
        }

        if self.config.dry_run {
            let batches: Vec<PlannedBatch> = units
                .into_iter()
                .flat_map(|(unit, _)| unit.batches)
                .collect();
            for batch in &batches {
                info!(version = batch.version, batch = batch.index, sql = %batch.sql, "Dry run");
            }
            return Ok(ReconcileOutcome::DryRun { from, to, batches });
        }

        for (unit, scripts) in units {
            let description = scripts
                .last()
                .map(|script| script.description.clone())
                .unwrap_or_default();

            unit.apply(connection).await?;

            model.apply(scripts);
            ledger.set_version(target, &description, &model).await?;
            model.mark_recorded();
            debug!(
                database = %target.name(),
                schema = %target.schema(),
                version = model.number(),
                "Recorded version"
            );
        }

        info!(
            database = %target.name(),
            schema = %target.schema(),
            version = to,
            "Schema migrated"
        );

        Ok(ReconcileOutcome::Migrated {
            from,
            to,
            scripts: plan.scripts().len(),
        })
    }
}

//! Application of rendered batches.
//!
//! Transaction-safe scripts are grouped and applied atomically. A script
//! that cannot run in a transaction is applied on its own, outside one.

use tracing::{debug, warn};

use crate::error::Result;
use crate::target::TargetConnection;

/// A rendered batch ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBatch {
    /// Version of the script the batch belongs to.
    pub version: u32,
    /// Position of the batch within its script.
    pub index: usize,
    /// SQL to execute.
    pub sql: String,
}

/// Consecutive scripts applied as one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyUnit {
    /// Whether the batches run inside a single transaction.
    pub transactional: bool,
    /// Batches in execution order.
    pub batches: Vec<PlannedBatch>,
}

impl ApplyUnit {
    /// Applies the unit through [`apply_atomically`] or [`apply_standalone`].
    pub async fn apply(&self, connection: &mut dyn TargetConnection) -> Result<()> {
        if self.transactional {
            apply_atomically(connection, &self.batches).await
        } else {
            apply_standalone(connection, &self.batches).await
        }
    }
}

/// Executes `batches` in order inside a single transaction.
///
/// The first failing batch rolls back everything executed so far and its
/// error is returned as is. On success the transaction is committed once;
/// a failed commit is rolled back too.
pub async fn apply_atomically(
    connection: &mut dyn TargetConnection,
    batches: &[PlannedBatch],
) -> Result<()> {
    connection.begin().await?;

    for batch in batches {
        debug!(
            version = batch.version,
            batch = batch.index,
            sql = %batch.sql,
            "Executing batch"
        );

        if let Err(err) = connection.execute(&batch.sql).await {
            warn!(
                version = batch.version,
                batch = batch.index,
                error = %err,
                "Batch failed, rolling back"
            );
            rollback_quietly(connection).await;
            return Err(err);
        }
    }

    if let Err(err) = connection.commit().await {
        warn!(error = %err, "Commit failed, rolling back");
        rollback_quietly(connection).await;
        return Err(err);
    }
    Ok(())
}

/// Executes `batches` in order without a transaction.
///
/// Used for scripts holding statements the engine refuses to run inside a
/// transaction; such scripts have a single batch.
pub async fn apply_standalone(
    connection: &mut dyn TargetConnection,
    batches: &[PlannedBatch],
) -> Result<()> {
    for batch in batches {
        debug!(
            version = batch.version,
            batch = batch.index,
            sql = %batch.sql,
            "Executing batch outside a transaction"
        );
        connection.execute_autocommit(&batch.sql).await?;
    }
    Ok(())
}

async fn rollback_quietly(connection: &mut dyn TargetConnection) {
    if let Err(err) = connection.rollback().await {
        warn!(error = %err, "Rollback failed");
    }
}

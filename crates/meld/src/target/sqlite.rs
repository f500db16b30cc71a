//! SQLite migration target.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};

use super::TargetConnection;
use crate::error::{MeldError, Result};

/// Runs migration batches against a SQLite pool.
///
/// A pooled connection is held only between `begin` and `commit`/`rollback`,
/// so the same pool can serve the version ledger outside the transaction.
pub struct SqliteTarget {
    pool: SqlitePool,
    identity: String,
    database: String,
    transaction: Option<Transaction<'static, Sqlite>>,
}

impl SqliteTarget {
    /// Creates a new target over `pool`; `identity` distinguishes databases
    /// for the once-per-process guard.
    pub fn new(pool: SqlitePool, identity: impl Into<String>) -> Self {
        Self {
            pool,
            identity: identity.into(),
            database: "main".to_string(),
            transaction: None,
        }
    }

    /// Sets the database name substituted for `$database` (default `main`).
    #[must_use]
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database = name.into();
        self
    }

    /// Returns the pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns whether a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }
}

fn no_transaction() -> MeldError {
    MeldError::InvalidState("no open transaction".to_string())
}

#[async_trait]
impl TargetConnection for SqliteTarget {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn database_name(&mut self) -> Result<String> {
        Ok(self.database.clone())
    }

    async fn engine_version(&mut self) -> Result<String> {
        let row: (String,) = sqlx::query_as("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn begin(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(MeldError::InvalidState(
                "transaction already open".to_string(),
            ));
        }

        self.transaction = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn execute(&mut self, batch: &str) -> Result<()> {
        let tx = self.transaction.as_mut().ok_or_else(no_transaction)?;
        sqlx::query(batch).execute(&mut **tx).await?;
        Ok(())
    }

    async fn execute_autocommit(&mut self, batch: &str) -> Result<()> {
        if self.transaction.is_some() {
            return Err(MeldError::InvalidState(
                "cannot run outside a transaction while one is open".to_string(),
            ));
        }

        sqlx::query(batch).execute(&self.pool).await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.transaction.take().ok_or_else(no_transaction)?;
        // A failed commit drops `tx`, which rolls it back
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

//! SQLite-backed version ledger.
//!
//! Each applied script is one row of the ledger table, keyed by target and
//! version. The row of the highest version carries the baseline label.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::{VersionLedger, VersionLedgerModel};
use crate::error::{MeldError, Result};
use crate::target::Target;

/// Default name of the ledger table.
pub const DEFAULT_LEDGER_TABLE: &str = "meld_versions";

/// A recorded version.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Script version.
    pub version: u32,
    /// Description (the baseline label for the latest version).
    pub description: String,
    /// Whether the rendered script body was recorded.
    pub has_script: bool,
    /// When the version was applied.
    pub applied_at: DateTime<Utc>,
}

/// Version ledger stored in a SQLite table.
pub struct SqliteVersionLedger {
    pool: SqlitePool,
    table: String,
}

impl SqliteVersionLedger {
    /// Creates a ledger using the default table name.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }

    /// Uses `table` instead of the default table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted_table(&self) -> String {
        format!("\"{}\"", self.table.replace('"', "\"\""))
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
CREATE TABLE IF NOT EXISTS {} (
    database_name TEXT NOT NULL COLLATE NOCASE,
    schema_name TEXT NOT NULL COLLATE NOCASE,
    version INTEGER NOT NULL,
    description TEXT NOT NULL,
    script TEXT,
    applied_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (database_name, schema_name, version)
)
"#,
            self.quoted_table()
        )
    }

    /// Ensures the ledger table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns whether the ledger table exists.
    pub async fn is_provisioned(&self) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&self.table)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Lists the recorded versions of `target` in ascending order.
    pub async fn history(&self, target: &Target) -> Result<Vec<LedgerEntry>> {
        if !self.is_provisioned().await? {
            return Ok(Vec::new());
        }

        let rows: Vec<(i64, String, Option<String>, String)> = sqlx::query_as(&format!(
            "SELECT version, description, script, applied_at FROM {} \
             WHERE database_name = ? AND schema_name = ? ORDER BY version",
            self.quoted_table()
        ))
        .bind(target.name())
        .bind(target.schema())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(version, description, script, applied_at)| {
                Ok(LedgerEntry {
                    version: to_version(version)?,
                    description,
                    has_script: script.is_some(),
                    applied_at: parse_timestamp(&applied_at),
                })
            })
            .collect()
    }
}

#[async_trait]
impl VersionLedger for SqliteVersionLedger {
    async fn get_version(&self, target: &Target) -> Result<VersionLedgerModel> {
        if !self.is_provisioned().await? {
            return Err(MeldError::LedgerNotProvisioned);
        }

        let rows: Vec<(i64, Option<String>)> = sqlx::query_as(&format!(
            "SELECT version, script FROM {} WHERE database_name = ? AND schema_name = ?",
            self.quoted_table()
        ))
        .bind(target.name())
        .bind(target.schema())
        .fetch_all(&self.pool)
        .await?;

        let mut recorded = BTreeMap::new();
        for (version, script) in rows {
            recorded.insert(to_version(version)?, script);
        }

        Ok(VersionLedgerModel::from_recorded(recorded))
    }

    async fn set_version(
        &self,
        target: &Target,
        description: &str,
        model: &VersionLedgerModel,
    ) -> Result<()> {
        let table = self.quoted_table();
        let mut tx = self.pool.begin().await?;

        sqlx::query(&self.create_table_sql())
            .execute(&mut *tx)
            .await?;

        for script in model.staged() {
            let label = if script.version == model.number() {
                description
            } else {
                script.description.as_str()
            };

            debug!(
                database = %target.name(),
                schema = %target.schema(),
                version = script.version,
                "Recording version"
            );

            sqlx::query(&format!(
                "INSERT INTO {table} (database_name, schema_name, version, description, script) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT (database_name, schema_name, version) \
                 DO UPDATE SET script = excluded.script WHERE {table}.script IS NULL"
            ))
            .bind(target.name())
            .bind(target.schema())
            .bind(i64::from(script.version))
            .bind(label)
            .bind(&script.body)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn to_version(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| MeldError::InvalidState(format!("ledger version {value} is out of range")))
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            // SQLite datetime format fallback
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|dt| dt.and_utc())
                .unwrap_or_else(|_| Utc::now())
        })
}

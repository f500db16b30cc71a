//! SQL Server dialect.

use super::ScriptDialect;

/// Statements SQL Server rejects inside a user transaction.
const NON_TRANSACTIONAL_STATEMENTS: &[&str] = &[
    "ALTER DATABASE",
    "ALTER FULLTEXT CATALOG",
    "ALTER FULLTEXT INDEX",
    "BACKUP",
    "CREATE DATABASE",
    "CREATE FULLTEXT CATALOG",
    "CREATE FULLTEXT INDEX",
    "DROP DATABASE",
    "DROP FULLTEXT CATALOG",
    "DROP FULLTEXT INDEX",
    "RECONFIGURE",
    "RESTORE",
];

const SCHEMA_GUARD: &str = "IF NOT EXISTS (SELECT * FROM information_schema.schemata WHERE schema_name = 'dbo')
    EXEC sp_executesql N'CREATE SCHEMA [dbo];';";

/// SQL Server script dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ScriptDialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn non_transactional_statements(&self) -> &'static [&'static str] {
        NON_TRANSACTIONAL_STATEMENTS
    }

    fn schema_guard(&self) -> Option<&'static str> {
        Some(SCHEMA_GUARD)
    }
}

//! SQLite dialect.
//!
//! SQLite has no creatable schemas (only `main`, `temp` and attached
//! databases), so scripts get no schema guard.

use super::ScriptDialect;

/// Statements SQLite rejects inside a transaction.
const NON_TRANSACTIONAL_STATEMENTS: &[&str] = &["ATTACH", "DETACH", "VACUUM"];

/// SQLite script dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ScriptDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn non_transactional_statements(&self) -> &'static [&'static str] {
        NON_TRANSACTIONAL_STATEMENTS
    }

    fn schema_guard(&self) -> Option<&'static str> {
        None
    }
}

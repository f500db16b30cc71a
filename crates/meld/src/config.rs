//! Reconciler options.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ledger::DEFAULT_LEDGER_TABLE;
use crate::placeholder::SCHEMA_TOKEN;
use crate::target::Target;

/// Options shared by the reconciler and the SQLite ledger.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use meld::MeldConfig;
///
/// let config = MeldConfig::from_json(r#"{ "dry_run": true }"#).unwrap();
/// assert!(config.dry_run);
/// assert_eq!(config.default_schema, "dbo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeldConfig {
    /// Schema migrated when a caller gives none.
    pub default_schema: String,
    /// Name of the ledger table.
    pub ledger_table: String,
    /// Render and log the plan without executing it.
    pub dry_run: bool,
}

impl Default for MeldConfig {
    fn default() -> Self {
        Self {
            default_schema: SCHEMA_TOKEN.to_string(),
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            dry_run: false,
        }
    }
}

impl MeldConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the default schema.
    #[must_use]
    pub fn default_schema(mut self, schema: impl Into<String>) -> Self {
        self.default_schema = schema.into();
        self
    }

    /// Sets the ledger table name.
    #[must_use]
    pub fn ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = table.into();
        self
    }

    /// Enables dry-run mode.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Target for `database` in the default schema.
    #[must_use]
    pub fn target(&self, database: impl Into<String>) -> Target {
        Target::new(database, self.default_schema.clone())
    }
}

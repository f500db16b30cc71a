//! Error types for the migration engine.

use std::path::PathBuf;

/// Errors that can occur while reconciling a database schema.
#[derive(Debug, thiserror::Error)]
pub enum MeldError {
    /// The script catalog is empty, lacks version one, is non-contiguous or
    /// holds conflicting scripts for the same version.
    #[error("Invalid script catalog '{catalog}': {message}")]
    CatalogValidation {
        /// Catalog (database) name.
        catalog: String,
        /// What is wrong with the catalog.
        message: String,
    },

    /// The database is at a newer version than the scripts shipped with this
    /// build.
    #[error(
        "The database version '{current}' is ahead of the database version '{supported}' supported by this library"
    )]
    VersionAhead {
        /// Version recorded in the ledger.
        current: u32,
        /// Highest version known to the catalog.
        supported: u32,
    },

    /// A preprocessor directive is malformed or out of sequence.
    #[error("Invalid directive on line {line_number} ('{line}'): {reason}")]
    DirectiveSyntax {
        /// One-based line number within the batch.
        line_number: usize,
        /// The offending line, trimmed.
        line: String,
        /// Why the directive was rejected.
        reason: String,
    },

    /// A multi-batch script contains statements that cannot run inside a
    /// transaction.
    #[error(
        "Script version {version} has multiple batches but contains statements not supported in a transaction: {}",
        .statements.join(", ")
    )]
    ScriptShape {
        /// Script version.
        version: u32,
        /// The non-transactional statements found.
        statements: Vec<String>,
    },

    /// A script body or version is unusable.
    #[error("Invalid script: {0}")]
    InvalidScript(String),

    /// A script resource name does not follow `<catalog>.<version>.sql`.
    #[error("Invalid script resource name: {0}")]
    InvalidScriptName(String),

    /// The version ledger has not been created for this database yet.
    #[error("Version ledger has not been provisioned")]
    LedgerNotProvisioned,

    /// Database error, passed through untouched.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Invalid connection or ledger state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error (reading script files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Scripts directory not found.
    #[error("Scripts directory not found: {0}")]
    ScriptsDirNotFound(PathBuf),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MeldError {
    /// Returns whether this error was raised while validating the catalog.
    #[must_use]
    pub fn is_catalog_validation(&self) -> bool {
        matches!(self, Self::CatalogValidation { .. })
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MeldError>;

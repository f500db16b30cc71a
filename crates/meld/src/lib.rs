//! Embedded, versioned SQL script migrations.
//!
//! `meld` keeps a database schema in step with the application that uses
//! it. The application ships numbered SQL scripts; at startup `meld`
//! compares them with the version recorded for the target and applies the
//! missing ones:
//! - Scripts are validated as a catalog (versions 1..N, no gaps) before any
//!   I/O happens
//! - Pending scripts run in one transaction and the version is recorded
//!   only after it commits; scripts such as `VACUUM` run on their own
//!   between transactions
//! - Scripts can select engine-specific SQL with `#if`/`#elseif`/`#else`/`#endif`
//!   directives and are rendered for the real database and schema names
//!
//! # Architecture
//!
//! - **Script** - One version of SQL, split into batches on `GO` lines
//! - **Catalog** - The validated scripts of one database, and the plan to reach its version
//! - **Provider** - Where scripts come from (`include_str!`, a directory)
//! - **Ledger** - Which version each target is at
//! - **Reconciler** - Plans, renders, applies and records
//! - **Initializer** - Runs the reconciler once per target
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use meld::prelude::*;
//!
//! let provider = EmbeddedScripts::new("shop 1.4.0")
//!     .with_dialect(SqliteDialect::new())
//!     .script("Shop.1.sql", include_str!("../sql/Shop.1.sql"))
//!     .script("Shop.2.sql", include_str!("../sql/Shop.2.sql"));
//!
//! let config = MeldConfig::default();
//! let initializer = SchemaInitializer::new(
//!     SchemaReconciler::new(Arc::new(provider)).with_config(config.clone()),
//! );
//!
//! let ledger = SqliteVersionLedger::new(pool.clone()).with_table(&config.ledger_table);
//! let mut connection = SqliteTarget::new(pool, "sqlite://shop.db");
//!
//! initializer
//!     .ensure_schema(&config.target("Shop"), &mut connection, &ledger)
//!     .await?;
//! ```

pub mod apply;
pub mod catalog;
pub mod config;
pub mod dialect;
pub mod directive;
pub mod error;
pub mod guard;
pub mod initializer;
pub mod ledger;
pub mod placeholder;
pub mod provider;
pub mod reconciler;
pub mod script;
pub mod target;

pub use config::MeldConfig;
pub use error::{MeldError, Result};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::apply::{apply_atomically, apply_standalone, ApplyUnit, PlannedBatch};
    pub use crate::catalog::{Catalog, CatalogIssue, MigrationPlan};
    pub use crate::config::MeldConfig;
    pub use crate::dialect::{ScriptDialect, SqlServerDialect, SqliteDialect};
    pub use crate::error::{MeldError, Result};
    pub use crate::guard::ConcurrentGuard;
    pub use crate::initializer::SchemaInitializer;
    pub use crate::ledger::{
        LedgerEntry, SqliteVersionLedger, StagedScript, VersionLedger, VersionLedgerModel,
    };
    pub use crate::provider::{EmbeddedScripts, ScriptProvider};
    pub use crate::reconciler::{ReconcileOutcome, SchemaReconciler};
    pub use crate::script::{RenderContext, Script};
    pub use crate::target::{SqliteTarget, Target, TargetConnection};
}

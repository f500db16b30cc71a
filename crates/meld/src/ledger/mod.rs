//! Version ledger.
//!
//! The ledger records, per [`Target`], the version the database is at and
//! the rendered body of every script applied to reach it.

mod model;
mod sqlite;

pub use model::{StagedScript, VersionLedgerModel};
pub use sqlite::{LedgerEntry, SqliteVersionLedger, DEFAULT_LEDGER_TABLE};

use async_trait::async_trait;

use crate::error::Result;
use crate::target::Target;

/// Storage for applied versions.
#[async_trait]
pub trait VersionLedger: Send + Sync {
    /// Loads the ledger for `target`.
    ///
    /// Returns [`MeldError::LedgerNotProvisioned`](crate::MeldError::LedgerNotProvisioned)
    /// when the backing storage does not exist yet; an unknown target yields
    /// an empty model (version 0).
    async fn get_version(&self, target: &Target) -> Result<VersionLedgerModel>;

    /// Persists the staged scripts of `model` with `description` as the
    /// label of the new baseline.
    ///
    /// Must be atomic: readers see either the old or the new ledger.
    async fn set_version(
        &self,
        target: &Target,
        description: &str,
        model: &VersionLedgerModel,
    ) -> Result<()>;
}

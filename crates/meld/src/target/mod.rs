//! Migration targets.
//!
//! A [`Target`] names the logical database (which is also the name of its
//! script catalog) and the schema being migrated. A [`TargetConnection`] is
//! the live connection the scripts are executed on.

mod sqlite;

pub use sqlite::SqliteTarget;

use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::error::Result;

/// The (database, schema) pair being migrated.
///
/// Names compare case-insensitively.
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    schema: String,
}

impl Target {
    /// Creates a new target.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
        }
    }

    /// Logical database name; scripts are looked up under this catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema name substituted for `dbo` in scripts.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Key admitting this target once per connection identity.
    #[must_use]
    pub fn guard_key(&self, connection: &str) -> String {
        format!("{connection}|{}|{}", self.name, self.schema).to_ascii_lowercase()
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.schema.eq_ignore_ascii_case(&other.schema)
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_ascii_lowercase().hash(state);
        self.schema.to_ascii_lowercase().hash(state);
    }
}

/// A live connection to the database being migrated.
///
/// Transaction-safe scripts are driven through one `begin`, a sequence of
/// `execute` calls and then `commit`, or `rollback` on failure. Scripts that
/// cannot run in a transaction go through `execute_autocommit` instead.
#[async_trait]
pub trait TargetConnection: Send {
    /// Identity of the underlying connection (e.g. a sanitized connection
    /// string); used to admit each target once per connection.
    fn identity(&self) -> &str;

    /// Real name of the connected database, substituted for `$database`.
    async fn database_name(&mut self) -> Result<String>;

    /// Engine version string matched by `#if` directives.
    async fn engine_version(&mut self) -> Result<String>;

    /// Opens the transaction all batches run in.
    async fn begin(&mut self) -> Result<()>;

    /// Executes one rendered batch inside the open transaction.
    async fn execute(&mut self, batch: &str) -> Result<()>;

    /// Executes one rendered batch outside any transaction.
    ///
    /// Fails when a transaction is open.
    async fn execute_autocommit(&mut self, batch: &str) -> Result<()>;

    /// Commits the open transaction.
    ///
    /// The transaction is closed even when the commit fails; whatever it
    /// held is rolled back.
    async fn commit(&mut self) -> Result<()>;

    /// Rolls back the open transaction; does nothing when none is open.
    async fn rollback(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_target_equality_ignores_case() {
        let a = Target::new("Shop", "dbo");
        let b = Target::new("SHOP", "DBO");
        assert_eq!(a, b);
        assert_ne!(a, Target::new("Shop", "audit"));

        let set: HashSet<Target> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_guard_key() {
        let target = Target::new("Shop", "Sales");
        assert_eq!(target.guard_key("Server=A"), "server=a|shop|sales");
        assert_ne!(target.guard_key("Server=A"), target.guard_key("Server=B"));
    }

    #[test]
    fn test_guard_key_folds_like_equality() {
        let ascii = (Target::new("Shop", "dbo"), Target::new("SHOP", "DBO"));
        assert_eq!(ascii.0 == ascii.1, ascii.0.guard_key("c") == ascii.1.guard_key("c"));

        // Only ASCII letters fold
        let accented = (Target::new("Ökonomie", "dbo"), Target::new("ökonomie", "dbo"));
        assert_ne!(accented.0, accented.1);
        assert_ne!(accented.0.guard_key("c"), accented.1.guard_key("c"));
    }
}

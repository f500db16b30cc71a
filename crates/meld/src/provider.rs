//! Script discovery.
//!
//! A [`ScriptProvider`] hands the reconciler the scripts of a catalog.
//! [`EmbeddedScripts`] keeps them in memory, typically from `include_str!`:
//!
//! ```rust,ignore
//! let provider = EmbeddedScripts::new(concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")))
//!     .script("Shop.1.sql", include_str!("../scripts/Shop.1.sql"))
//!     .script("Shop.2.sql", include_str!("../scripts/Shop.2.sql"));
//! ```

use std::fs;
use std::path::Path;

use crate::dialect::{ScriptDialect, SqlServerDialect};
use crate::error::{MeldError, Result};
use crate::script::{split_batches, Script};

/// Source of versioned scripts.
pub trait ScriptProvider: Send + Sync {
    /// Returns the scripts of `catalog` in ascending version order.
    fn get_scripts(&self, catalog: &str) -> Result<Vec<Script>>;

    /// Builds the error reported when a catalog fails validation.
    ///
    /// Hosts can override this to map catalog problems onto their own
    /// error classification.
    fn report_missing_scripts(&self, catalog: &str, message: String) -> MeldError {
        MeldError::CatalogValidation {
            catalog: catalog.to_string(),
            message,
        }
    }
}

/// Scripts bundled with the application.
///
/// Resource names have the shape `<catalog>.<version>.sql`; the catalog part
/// matches case-insensitively.
#[derive(Debug)]
pub struct EmbeddedScripts {
    description: String,
    dialect: Box<dyn ScriptDialect>,
    resources: Vec<(String, String)>,
}

impl EmbeddedScripts {
    /// Creates an empty provider; `description` labels every script, usually
    /// the host's package name and version.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            dialect: Box::new(SqlServerDialect::new()),
            resources: Vec::new(),
        }
    }

    /// Builds scripts with `dialect` instead of SQL Server.
    #[must_use]
    pub fn with_dialect(mut self, dialect: impl ScriptDialect + 'static) -> Self {
        self.dialect = Box::new(dialect);
        self
    }

    /// Registers a script resource.
    #[must_use]
    pub fn script(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.resources.push((name.into(), body.into()));
        self
    }

    /// Registers every `*.sql` file found directly in `dir`.
    pub fn load_dir(mut self, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(MeldError::ScriptsDirNotFound(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_sql = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
            if !is_sql || !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                files.push((name.to_string(), fs::read_to_string(&path)?));
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        self.resources.extend(files);
        Ok(self)
    }

    /// Number of registered resources, across all catalogs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns whether no resource is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ScriptProvider for EmbeddedScripts {
    fn get_scripts(&self, catalog: &str) -> Result<Vec<Script>> {
        let mut scripts = Vec::new();

        for (name, body) in &self.resources {
            let (resource_catalog, version) = match parse_resource_name(name) {
                Ok(parsed) => parsed,
                Err(err) if has_catalog_prefix(name, catalog) => return Err(err),
                Err(_) => continue,
            };
            if !resource_catalog.eq_ignore_ascii_case(catalog) {
                continue;
            }

            if split_batches(body).is_empty() {
                return Err(self.report_missing_scripts(
                    catalog,
                    format!(
                        "The SQL script version {version} for the database named '{catalog}' is empty."
                    ),
                ));
            }

            scripts.push(Script::with_dialect(
                self.dialect.as_ref(),
                version,
                self.description.clone(),
                body,
            )?);
        }

        scripts.sort_by_key(Script::version);
        Ok(scripts)
    }
}

/// Returns whether `name` is written as a resource of `catalog`.
fn has_catalog_prefix(name: &str, catalog: &str) -> bool {
    name.get(..catalog.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(catalog))
        && name[catalog.len()..].starts_with('.')
}

/// Splits `<catalog>.<version>.sql` into its catalog and version.
fn parse_resource_name(name: &str) -> Result<(&str, u32)> {
    let invalid = || MeldError::InvalidScriptName(name.to_string());

    let stem = name
        .len()
        .checked_sub(4)
        .filter(|&at| name.is_char_boundary(at) && name[at..].eq_ignore_ascii_case(".sql"))
        .map(|at| &name[..at])
        .ok_or_else(invalid)?;
    let (catalog, version) = stem.rsplit_once('.').ok_or_else(invalid)?;
    if catalog.is_empty() {
        return Err(invalid());
    }

    let version = version
        .parse::<u32>()
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(invalid)?;
    Ok((catalog, version))
}

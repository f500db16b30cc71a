//! Script catalogs and migration plans.

use std::fmt;

use crate::error::{MeldError, Result};
use crate::script::Script;

/// Why a set of scripts cannot be used as a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogIssue {
    /// No scripts at all.
    Empty,
    /// The lowest version is not 1.
    MissingVersionOne,
    /// A version is skipped.
    NonContiguous {
        /// Last version before the gap.
        after: u32,
        /// First version after the gap.
        next: u32,
    },
    /// Two scripts share a version but differ in content.
    ConflictingVersion(u32),
}

impl CatalogIssue {
    /// Describes the issue for the catalog named `catalog`.
    #[must_use]
    pub fn describe(&self, catalog: &str) -> String {
        match self {
            Self::Empty => format!("Cannot find any SQL scripts for the database named '{catalog}'."),
            Self::MissingVersionOne => format!(
                "Cannot find version one of the SQL script for the database named '{catalog}'."
            ),
            Self::NonContiguous { after, next } => format!(
                "The SQL scripts for the database named '{catalog}' are non-contiguous (version {after} is followed by version {next})."
            ),
            Self::ConflictingVersion(version) => format!(
                "The SQL scripts for the database named '{catalog}' contain different scripts for version {version}."
            ),
        }
    }
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("catalog is empty"),
            Self::MissingVersionOne => f.write_str("catalog has no version 1"),
            Self::NonContiguous { after, next } => {
                write!(f, "catalog skips from version {after} to {next}")
            }
            Self::ConflictingVersion(version) => {
                write!(f, "catalog has conflicting scripts for version {version}")
            }
        }
    }
}

/// A validated, ordered set of scripts for one database.
///
/// Versions start at 1 and have no gaps. Identical duplicates collapse into
/// one script.
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    scripts: Vec<Script>,
}

impl Catalog {
    /// Builds a catalog, deduplicating and validating `scripts`.
    pub fn new(
        name: impl Into<String>,
        mut scripts: Vec<Script>,
    ) -> std::result::Result<Self, CatalogIssue> {
        scripts.sort_by_key(Script::version);

        let mut unique: Vec<Script> = Vec::with_capacity(scripts.len());
        for script in scripts {
            match unique.last() {
                Some(last) if last.version() == script.version() => {
                    if *last != script {
                        return Err(CatalogIssue::ConflictingVersion(script.version()));
                    }
                }
                _ => unique.push(script),
            }
        }

        let first = unique.first().ok_or(CatalogIssue::Empty)?;
        if first.version() != 1 {
            return Err(CatalogIssue::MissingVersionOne);
        }

        if let Some(pair) = unique
            .windows(2)
            .find(|pair| pair[1].version() != pair[0].version() + 1)
        {
            return Err(CatalogIssue::NonContiguous {
                after: pair[0].version(),
                next: pair[1].version(),
            });
        }

        Ok(Self {
            name: name.into(),
            scripts: unique,
        })
    }

    /// Returns the catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the scripts in ascending version order.
    #[must_use]
    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    /// Returns the highest version in the catalog.
    #[must_use]
    pub fn target_version(&self) -> u32 {
        self.scripts.last().map_or(0, Script::version)
    }

    /// Returns the script with the given version.
    #[must_use]
    pub fn get(&self, version: u32) -> Option<&Script> {
        let index = usize::try_from(version.checked_sub(1)?).ok()?;
        self.scripts.get(index)
    }

    /// Plans the migration from `current_version` to the catalog's target.
    ///
    /// Fails with [`MeldError::VersionAhead`] when the database is newer than
    /// the catalog.
    pub fn plan(&self, current_version: u32) -> Result<MigrationPlan<'_>> {
        let target_version = self.target_version();
        if current_version > target_version {
            return Err(MeldError::VersionAhead {
                current: current_version,
                supported: target_version,
            });
        }

        Ok(MigrationPlan {
            current_version,
            target_version,
            scripts: self
                .scripts
                .iter()
                .filter(|script| script.version() > current_version)
                .collect(),
        })
    }
}

/// The scripts still to be applied, in ascending version order.
#[derive(Debug, Clone)]
pub struct MigrationPlan<'a> {
    current_version: u32,
    target_version: u32,
    scripts: Vec<&'a Script>,
}

impl<'a> MigrationPlan<'a> {
    /// Version recorded in the ledger when the plan was made.
    #[must_use]
    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    /// Version the database will be at once the plan is applied.
    #[must_use]
    pub fn target_version(&self) -> u32 {
        self.target_version
    }

    /// Pending scripts.
    #[must_use]
    pub fn scripts(&self) -> &[&'a Script] {
        &self.scripts
    }

    /// Returns whether the database is already up to date.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Description of the last pending script, used as the new baseline
    /// label.
    #[must_use]
    pub fn description(&self) -> Option<&'a str> {
        self.scripts.last().map(|script| script.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(version: u32) -> Script {
        Script::new(version, format!("v{version}"), &format!("SELECT {version};")).unwrap()
    }

    fn catalog(versions: &[u32]) -> std::result::Result<Catalog, CatalogIssue> {
        Catalog::new("Shop", versions.iter().copied().map(script).collect())
    }

    #[test]
    fn test_valid_catalog_sorted() {
        let catalog = catalog(&[3, 1, 2]).unwrap();
        let versions: Vec<u32> = catalog.scripts().iter().map(Script::version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(catalog.target_version(), 3);
        assert_eq!(catalog.get(2).map(Script::version), Some(2));
        assert!(catalog.get(0).is_none());
        assert!(catalog.get(4).is_none());
    }

    #[test]
    fn test_empty_catalog() {
        assert_eq!(catalog(&[]).unwrap_err(), CatalogIssue::Empty);
    }

    #[test]
    fn test_missing_version_one() {
        assert_eq!(catalog(&[2, 3]).unwrap_err(), CatalogIssue::MissingVersionOne);
    }

    #[test]
    fn test_non_contiguous() {
        assert_eq!(
            catalog(&[1, 2, 4]).unwrap_err(),
            CatalogIssue::NonContiguous { after: 2, next: 4 }
        );
    }

    #[test]
    fn test_identical_duplicates_collapse() {
        let catalog = catalog(&[1, 2, 2, 1]).unwrap();
        assert_eq!(catalog.scripts().len(), 2);
    }

    #[test]
    fn test_conflicting_duplicates_rejected() {
        let scripts = vec![
            script(1),
            Script::new(1, "other", "SELECT 'different';").unwrap(),
        ];
        assert_eq!(
            Catalog::new("Shop", scripts).unwrap_err(),
            CatalogIssue::ConflictingVersion(1)
        );
    }

    #[test]
    fn test_issue_messages_name_catalog() {
        assert!(CatalogIssue::Empty.describe("Shop").contains("'Shop'"));
        assert!(CatalogIssue::NonContiguous { after: 2, next: 4 }
            .describe("Shop")
            .contains("non-contiguous"));
    }

    #[test]
    fn test_plan_from_empty_ledger() {
        let catalog = catalog(&[1, 2, 3]).unwrap();
        let plan = catalog.plan(0).unwrap();

        assert_eq!(plan.current_version(), 0);
        assert_eq!(plan.target_version(), 3);
        let versions: Vec<u32> = plan.scripts().iter().map(|s| s.version()).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(plan.description(), Some("v3"));
    }

    #[test]
    fn test_plan_partial() {
        let catalog = catalog(&[1, 2, 3]).unwrap();
        let plan = catalog.plan(2).unwrap();
        assert_eq!(plan.scripts().len(), 1);
        assert_eq!(plan.scripts()[0].version(), 3);
    }

    #[test]
    fn test_plan_up_to_date() {
        let catalog = catalog(&[1, 2, 3]).unwrap();
        let plan = catalog.plan(3).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.description(), None);
    }

    #[test]
    fn test_plan_version_ahead() {
        let catalog = catalog(&[1, 2, 3]).unwrap();
        match catalog.plan(5).unwrap_err() {
            MeldError::VersionAhead { current, supported } => {
                assert_eq!(current, 5);
                assert_eq!(supported, 3);
            }
            other => panic!("Expected VersionAhead, got {other:?}"),
        }
    }
}

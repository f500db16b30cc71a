//! Versioned SQL scripts.
//!
//! A [`Script`] is one versioned unit of migration SQL. Its body is split
//! into batches on lines holding only the `GO` separator; each batch is
//! rendered for a concrete target right before execution (see
//! [`Script::render`]).

use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;

use crate::dialect::{ScriptDialect, SqlServerDialect};
use crate::directive;
use crate::error::{MeldError, Result};
use crate::placeholder;

/// The batch separator token.
pub const BATCH_SEPARATOR: &str = "GO";

static SEPARATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*GO[ \t]*(?:--[^\r\n]*)?\r?$").expect("Invalid batch separator regex")
});

/// Concrete identifiers and engine version a script is rendered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    /// Real database name, substituted for `$database`.
    pub database: String,
    /// Real schema name, substituted for `dbo`.
    pub schema: String,
    /// Engine version string matched by `#if`/`#elseif` prefixes.
    pub engine_version: String,
}

impl RenderContext {
    /// Creates a new render context.
    #[must_use]
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        engine_version: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            engine_version: engine_version.into(),
        }
    }
}

/// One versioned unit of migration SQL.
///
/// Scripts are immutable. Two scripts are equal when their versions and
/// batch sequences are equal; descriptions are labels and do not take part.
#[derive(Debug, Clone)]
pub struct Script {
    version: u32,
    description: String,
    batches: Vec<String>,
    transaction_safe: bool,
}

impl Script {
    /// Creates a SQL Server script from its raw body.
    pub fn new(version: u32, description: impl Into<String>, sql: &str) -> Result<Self> {
        Self::with_dialect(&SqlServerDialect::new(), version, description, sql)
    }

    /// Creates a script from its raw body using the given dialect.
    pub fn with_dialect(
        dialect: &dyn ScriptDialect,
        version: u32,
        description: impl Into<String>,
        sql: &str,
    ) -> Result<Self> {
        Self::from_batches(dialect, version, description, split_batches(sql))
    }

    /// Creates a script from already split batches.
    ///
    /// Fails with [`MeldError::ScriptShape`] when more than one batch is
    /// given and any of them holds a statement the engine cannot run in a
    /// transaction. Transaction-safe scripts get the dialect's schema guard
    /// as their first batch.
    pub fn from_batches(
        dialect: &dyn ScriptDialect,
        version: u32,
        description: impl Into<String>,
        batches: Vec<String>,
    ) -> Result<Self> {
        if version == 0 {
            return Err(MeldError::InvalidScript(
                "script versions start at 1".to_string(),
            ));
        }

        let mut batches: Vec<String> = batches
            .into_iter()
            .filter(|batch| !batch.trim().is_empty())
            .collect();
        if batches.is_empty() {
            return Err(MeldError::InvalidScript(format!(
                "script version {version} has no SQL"
            )));
        }

        let mut statements: Vec<String> = Vec::new();
        for batch in &batches {
            for statement in dialect.find_non_transactional(batch) {
                if !statements.iter().any(|s| s == statement) {
                    statements.push(statement.to_string());
                }
            }
        }

        let transaction_safe = statements.is_empty();
        if !transaction_safe && batches.len() > 1 {
            return Err(MeldError::ScriptShape {
                version,
                statements,
            });
        }

        if transaction_safe {
            if let Some(guard) = dialect.schema_guard() {
                batches.insert(0, guard.to_string());
            }
        }

        Ok(Self {
            version,
            description: description.into(),
            batches,
            transaction_safe,
        })
    }

    /// Returns the script version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the description recorded in the ledger.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the raw batches, schema guard included.
    #[must_use]
    pub fn batches(&self) -> &[String] {
        &self.batches
    }

    /// Returns whether every batch can run inside a transaction.
    #[must_use]
    pub fn is_transaction_safe(&self) -> bool {
        self.transaction_safe
    }

    /// Renders every batch for `context`.
    ///
    /// Placeholders are substituted first, then directives are evaluated
    /// against the engine version. Batches that render to nothing are
    /// dropped.
    pub fn render(&self, context: &RenderContext) -> Result<Vec<String>> {
        let mut rendered = Vec::with_capacity(self.batches.len());
        for batch in &self.batches {
            let batch = placeholder::substitute(batch, &context.database, &context.schema);
            let batch = directive::preprocess(&batch, &context.engine_version)?;
            if !batch.trim().is_empty() {
                rendered.push(batch);
            }
        }
        Ok(rendered)
    }
}

impl PartialEq for Script {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.batches == other.batches
    }
}

impl Eq for Script {}

impl Hash for Script {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
        self.batches.hash(state);
    }
}

/// Splits a script body into batches.
///
/// The separator is a line holding only `GO` (any case), optionally followed
/// by a `--` comment. Blank segments are discarded; each batch loses its
/// leading blank lines and trailing whitespace.
#[must_use]
pub fn split_batches(sql: &str) -> Vec<String> {
    SEPARATOR_PATTERN
        .split(sql)
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| trim_leading_blank_lines(segment.trim_end()).to_string())
        .collect()
}

/// Joins rendered batches back into a single body, one separator line
/// between batches.
#[must_use]
pub fn join_batches(batches: &[String]) -> String {
    batches.join(&format!("\n{BATCH_SEPARATOR}\n"))
}

fn trim_leading_blank_lines(mut text: &str) -> &str {
    while let Some(end) = text.find('\n') {
        if !text[..end].trim().is_empty() {
            break;
        }
        text = &text[end + 1..];
    }
    text
}

//! Database and schema placeholders.
//!
//! Scripts are written against the placeholder database `$database` and the
//! default schema `dbo`; both are swapped for the real identifiers before a
//! batch is executed.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Token standing for the target database name.
pub const DATABASE_TOKEN: &str = "$database";

/// Token standing for the target schema name.
pub const SCHEMA_TOKEN: &str = "dbo";

static DATABASE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<bracket>\[\$database\])|(?P<quoted>'\$database')|(?P<dotted>\$database\.)")
        .expect("Invalid database placeholder regex")
});

static SCHEMA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)(?P<bracket>\[dbo\])|(?P<quoted>'dbo')|(?P<lead>^|[\s'"(,=.])dbo\."#)
        .expect("Invalid schema placeholder regex")
});

/// Replaces the database and schema placeholders in `batch`.
///
/// Bracket-quoted (`[dbo]`), string-quoted (`'dbo'`) and dot-qualified
/// (`dbo.Table`) occurrences are replaced; matching is case-insensitive.
#[must_use]
pub fn substitute(batch: &str, database: &str, schema: &str) -> String {
    let batch = DATABASE_PATTERN.replace_all(batch, |caps: &Captures<'_>| {
        if caps.name("bracket").is_some() {
            format!("[{database}]")
        } else if caps.name("quoted").is_some() {
            format!("'{database}'")
        } else {
            format!("{database}.")
        }
    });

    SCHEMA_PATTERN
        .replace_all(&batch, |caps: &Captures<'_>| {
            if caps.name("bracket").is_some() {
                format!("[{schema}]")
            } else if caps.name("quoted").is_some() {
                format!("'{schema}'")
            } else {
                let lead = caps.name("lead").map_or("", |m| m.as_str());
                format!("{lead}{schema}.")
            }
        })
        .into_owned()
}

//! Database dialects.
//!
//! A dialect knows which statements its engine refuses to run inside a
//! transaction and how to make sure the target schema exists before a
//! script runs.

mod sqlite;
mod sqlserver;

pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

use std::fmt;

/// Engine-specific rules used when building a [`Script`](crate::script::Script).
pub trait ScriptDialect: fmt::Debug + Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Statements that cannot be executed inside a transaction, as
    /// upper-case keyword sequences (e.g. `CREATE DATABASE`).
    fn non_transactional_statements(&self) -> &'static [&'static str];

    /// Idempotent batch creating the `dbo` placeholder schema, if the engine
    /// has creatable schemas.
    fn schema_guard(&self) -> Option<&'static str>;

    /// Returns the non-transactional statements found in `batch`.
    ///
    /// Keywords match case-insensitively on whole words, with any
    /// whitespace between them, and only where a statement can start.
    /// Comments, string literals and quoted identifiers are skipped.
    fn find_non_transactional(&self, batch: &str) -> Vec<&'static str> {
        let tokens = tokenize(batch);

        self.non_transactional_statements()
            .iter()
            .copied()
            .filter(|statement| {
                let keywords: Vec<&str> = statement.split_whitespace().collect();
                tokens
                    .windows(keywords.len())
                    .enumerate()
                    .any(|(start, window)| {
                        let previous = start.checked_sub(1).map(|i| tokens[i].as_str());
                        starts_statement(previous)
                            && window
                                .iter()
                                .zip(&keywords)
                                .all(|(token, keyword)| token == keyword)
                    })
            })
            .collect()
    }
}

/// Whether a statement can begin right after `previous`.
fn starts_statement(previous: Option<&str>) -> bool {
    matches!(
        previous,
        None | Some(";" | ")" | "BEGIN" | "ELSE" | "THEN")
    )
}

/// Splits `batch` into upper-cased words and single punctuation tokens.
///
/// Comments are dropped. String literals and quoted identifiers become a
/// single `_` token.
fn tokenize(batch: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = batch.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
            }
            '\'' | '"' | '[' => {
                let close = if c == '[' { ']' } else { c };
                while let Some(c) = chars.next() {
                    if c != close {
                        continue;
                    }
                    // A doubled closing character escapes itself
                    if chars.peek() == Some(&close) {
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push("_".to_string());
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !(next.is_alphanumeric() || next == '_') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(word.to_ascii_uppercase());
            }
            c if c.is_whitespace() => {}
            c => tokens.push(c.to_string()),
        }
    }

    tokens
}

#![allow(dead_code)]

use std::sync::Arc;

use meld::prelude::*;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub async fn create_test_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

/// Reconciler over SQLite scripts registered as `(resource name, body)`.
pub fn reconciler(scripts: &[(&str, &str)]) -> SchemaReconciler {
    let provider = scripts.iter().fold(
        EmbeddedScripts::new("shop 1.0.0").with_dialect(SqliteDialect::new()),
        |provider, (name, body)| provider.script(*name, *body),
    );
    SchemaReconciler::new(Arc::new(provider))
}

pub async fn table_exists(pool: &SqlitePool, name: &str) -> bool {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await
            .unwrap_or_else(|e| panic!("Failed to query sqlite_master: {e:?}"));
    row.is_some()
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap_or_else(|e| panic!("Failed to count rows of {table}: {e:?}"));
    row.0
}

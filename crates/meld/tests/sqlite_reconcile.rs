//! End-to-end reconciliation against an in-memory SQLite database.

mod common;

use common::{count_rows, create_test_pool, reconciler, table_exists};
use meld::prelude::*;

const WIDGETS: &str = "CREATE TABLE [$database].widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL);";

const GADGETS: &str = "\
CREATE TABLE gadgets (id INTEGER PRIMARY KEY, widget_id INTEGER NOT NULL);
GO
INSERT INTO dbo.widgets (id, name) VALUES (1, 'sprocket');
INSERT INTO gadgets (id, widget_id) VALUES (1, 1);
";

const VERSIONED: &str = "\
#if 3
CREATE INDEX widgets_name ON widgets (name);
#else
CREATE INDEX widgets_fallback ON widgets (name);
#endif
";

// The orphaned part is only caught at COMMIT, where deferred keys are checked.
const DEFERRED_ORPHAN: &str = "\
CREATE TABLE parts (id INTEGER PRIMARY KEY, widget_id INTEGER NOT NULL
    REFERENCES widgets (id) DEFERRABLE INITIALLY DEFERRED);
INSERT INTO widgets (id, name) VALUES (1, 'sprocket');
INSERT INTO parts (id, widget_id) VALUES (1, 99);
";

fn shop() -> Target {
    Target::new("Shop", "main")
}

#[tokio::test]
async fn test_full_migration() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");
    let reconciler = reconciler(&[
        ("Shop.1.sql", WIDGETS),
        ("Shop.2.sql", GADGETS),
        ("Shop.3.sql", VERSIONED),
    ]);

    let outcome = reconciler
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Migrated {
            from: 0,
            to: 3,
            scripts: 3
        }
    );

    assert!(table_exists(&pool, "widgets").await);
    assert!(table_exists(&pool, "gadgets").await);
    assert_eq!(count_rows(&pool, "gadgets").await, 1);

    let index: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?")
            .bind("widgets_name")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert!(index.is_some());

    let model = ledger.get_version(&shop()).await.unwrap();
    assert_eq!(model.number(), 3);
    assert_eq!(
        model.recorded_body(1),
        Some("CREATE TABLE [main].widgets (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
    );
    assert_eq!(
        model.recorded_body(3),
        Some("CREATE INDEX widgets_name ON widgets (name);\n")
    );

    let history = ledger.history(&shop()).await.unwrap();
    let versions: Vec<u32> = history.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert_eq!(history[2].description, "shop 1.0.0");
}

#[tokio::test]
async fn test_second_run_executes_nothing() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");
    let reconciler = reconciler(&[("Shop.1.sql", WIDGETS), ("Shop.2.sql", GADGETS)]);

    reconciler
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();
    let outcome = reconciler
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::UpToDate { version: 2 });
    // A second run would have failed on the duplicate primary key
    assert_eq!(count_rows(&pool, "widgets").await, 1);
}

#[tokio::test]
async fn test_upgrade_applies_only_new_scripts() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");

    reconciler(&[("Shop.1.sql", WIDGETS)])
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    let outcome = reconciler(&[("Shop.1.sql", WIDGETS), ("Shop.2.sql", GADGETS)])
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Migrated {
            from: 1,
            to: 2,
            scripts: 1
        }
    );
    assert_eq!(ledger.get_version(&shop()).await.unwrap().number(), 2);
}

#[tokio::test]
async fn test_failure_rolls_back_every_script() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");
    let reconciler = reconciler(&[
        ("Shop.1.sql", WIDGETS),
        ("Shop.2.sql", GADGETS),
        ("Shop.3.sql", "INSERT INTO missing_table (id) VALUES (1);"),
    ]);

    let err = reconciler
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap_err();

    assert!(matches!(err, MeldError::Database(_)));
    assert!(!table_exists(&pool, "widgets").await);
    assert!(!table_exists(&pool, "gadgets").await);
    assert!(matches!(
        ledger.get_version(&shop()).await,
        Err(MeldError::LedgerNotProvisioned)
    ));
}

#[tokio::test]
async fn test_failed_upgrade_keeps_previous_version() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");

    reconciler(&[("Shop.1.sql", WIDGETS)])
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    let result = reconciler(&[
        ("Shop.1.sql", WIDGETS),
        ("Shop.2.sql", GADGETS),
        ("Shop.3.sql", "SELECT * FROM;"),
    ])
    .initialize(&shop(), &mut connection, &ledger)
    .await;

    assert!(result.is_err());
    assert!(!table_exists(&pool, "gadgets").await);
    assert_eq!(count_rows(&pool, "widgets").await, 0);
    assert_eq!(ledger.get_version(&shop()).await.unwrap().number(), 1);
}

#[tokio::test]
async fn test_failure_at_commit_rolls_back() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");

    let err = reconciler(&[
        ("Shop.1.sql", WIDGETS),
        ("Shop.2.sql", DEFERRED_ORPHAN),
    ])
    .initialize(&shop(), &mut connection, &ledger)
    .await
    .unwrap_err();

    assert!(matches!(err, MeldError::Database(_)));
    assert!(!connection.in_transaction());
    assert!(!table_exists(&pool, "widgets").await);
    assert!(!table_exists(&pool, "parts").await);
    assert!(matches!(
        ledger.get_version(&shop()).await,
        Err(MeldError::LedgerNotProvisioned)
    ));

    let fixed = DEFERRED_ORPHAN.replace("(1, 99)", "(1, 1)");
    let outcome = reconciler(&[("Shop.1.sql", WIDGETS), ("Shop.2.sql", fixed.as_str())])
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Migrated { to: 2, .. }));
    assert_eq!(count_rows(&pool, "parts").await, 1);
}

#[tokio::test]
async fn test_vacuum_runs_outside_transaction() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");
    let reconciler = reconciler(&[
        ("Shop.1.sql", WIDGETS),
        ("Shop.2.sql", "VACUUM;"),
        ("Shop.3.sql", GADGETS),
    ]);

    let outcome = reconciler
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReconcileOutcome::Migrated {
            from: 0,
            to: 3,
            scripts: 3
        }
    );
    assert_eq!(count_rows(&pool, "gadgets").await, 1);

    let history = ledger.history(&shop()).await.unwrap();
    let versions: Vec<u32> = history.iter().map(|entry| entry.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_failure_after_vacuum_keeps_committed_versions() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");

    let err = reconciler(&[
        ("Shop.1.sql", WIDGETS),
        ("Shop.2.sql", "VACUUM;"),
        ("Shop.3.sql", "INSERT INTO missing_table (id) VALUES (1);"),
    ])
    .initialize(&shop(), &mut connection, &ledger)
    .await
    .unwrap_err();

    assert!(matches!(err, MeldError::Database(_)));
    assert!(table_exists(&pool, "widgets").await);
    assert_eq!(ledger.get_version(&shop()).await.unwrap().number(), 2);
}

#[tokio::test]
async fn test_ledger_ahead_of_scripts() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");

    reconciler(&[("Shop.1.sql", WIDGETS), ("Shop.2.sql", GADGETS)])
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    let err = reconciler(&[("Shop.1.sql", WIDGETS)])
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MeldError::VersionAhead {
            current: 2,
            supported: 1
        }
    ));
}

#[tokio::test]
async fn test_invalid_catalog_touches_nothing() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");

    let err = reconciler(&[
        ("Shop.1.sql", WIDGETS),
        ("Shop.2.sql", GADGETS),
        ("Shop.4.sql", "SELECT 4;"),
    ])
    .initialize(&shop(), &mut connection, &ledger)
    .await
    .unwrap_err();

    assert!(err.is_catalog_validation());
    assert!(!ledger.is_provisioned().await.unwrap());
    assert!(!table_exists(&pool, "widgets").await);
}

#[tokio::test]
async fn test_dry_run_leaves_database_alone() {
    let pool = create_test_pool().await;
    let ledger = SqliteVersionLedger::new(pool.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");

    let outcome = reconciler(&[("Shop.1.sql", WIDGETS), ("Shop.2.sql", GADGETS)])
        .with_config(MeldConfig::new().dry_run(true))
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    match outcome {
        ReconcileOutcome::DryRun { from, to, batches } => {
            assert_eq!((from, to), (0, 2));
            assert_eq!(batches.len(), 3);
            assert!(batches[2].sql.contains("INSERT INTO main.widgets"));
        }
        other => panic!("Expected DryRun, got {other:?}"),
    }
    assert!(!table_exists(&pool, "widgets").await);
    assert!(!ledger.is_provisioned().await.unwrap());
}

#[tokio::test]
async fn test_custom_ledger_table() {
    let pool = create_test_pool().await;
    let config = MeldConfig::from_json(r#"{ "ledger_table": "shop_versions" }"#).unwrap();
    let ledger = SqliteVersionLedger::new(pool.clone()).with_table(config.ledger_table.clone());
    let mut connection = SqliteTarget::new(pool.clone(), "memory");

    reconciler(&[("Shop.1.sql", WIDGETS)])
        .with_config(config)
        .initialize(&shop(), &mut connection, &ledger)
        .await
        .unwrap();

    assert!(table_exists(&pool, "shop_versions").await);
    assert!(!table_exists(&pool, "meld_versions").await);
}

//! Forward migration against a real SQLite database

use std::sync::Arc;
use strata_migrate::{MemoryFileSystem, MigrationConfig, MigrationError, MigrationRunner};
use strata_testing::prelude::*;

const A_UP: &str = "-- migration:up\nCREATE TABLE t(x int);\n-- migration:down\nDROP TABLE t;\n";
const B_UP: &str = "-- migration:up\nALTER TABLE t ADD COLUMN y int;\n-- migration:down\nALTER TABLE t DROP COLUMN y;\n";

#[tokio::test]
async fn test_applies_pending_migrations_in_name_order() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230102_b.sql", B_UP).unwrap();
    fixture.write("20230101_a.sql", A_UP).unwrap();
    let db = TestDatabase::new().await.unwrap();

    let result = fixture.runner().unwrap().migrate(&db).await.unwrap();

    assert_eq!(result.applied_migrations, vec!["20230101_a", "20230102_b"]);
    db.assert_columns("t", &["x", "y"]).await.unwrap();
    db.assert_ledger(&["20230101_a", "20230102_b"]).await.unwrap();
}

#[tokio::test]
async fn test_second_run_is_a_noop() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", A_UP).unwrap();
    let db = TestDatabase::new().await.unwrap();
    let runner = fixture.runner().unwrap();

    runner.migrate(&db).await.unwrap();
    let second = runner.migrate(&db).await.unwrap();

    assert!(second.is_up_to_date());
    assert_eq!(second.skipped_count, 1);
    db.assert_ledger(&["20230101_a"]).await.unwrap();
}

#[tokio::test]
async fn test_empty_directory_and_ledger_issue_no_migration_sql() {
    let fixture = MigrationFixture::new().unwrap();
    let db = FakeDatabase::new();

    let result = fixture.runner().unwrap().migrate(&db).await.unwrap();

    assert!(result.is_up_to_date());
    assert!(db.scripts().is_empty());
    assert!(!db.events().contains(&FakeEvent::Begin));
}

#[tokio::test]
async fn test_only_unrecorded_migrations_run() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", A_UP).unwrap();
    let db = TestDatabase::new().await.unwrap();
    let runner = fixture.runner().unwrap();
    runner.migrate(&db).await.unwrap();

    fixture.write("20230102_b.sql", B_UP).unwrap();
    let result = runner.migrate(&db).await.unwrap();

    assert_eq!(result.applied_migrations, vec!["20230102_b"]);
    assert_eq!(result.skipped_count, 1);
}

#[tokio::test]
async fn test_invalid_sql_stops_the_run_and_keeps_earlier_migrations() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", A_UP).unwrap();
    fixture
        .write("20230102_b.sql", "-- migration:up\nCREATE TABLE u(z int);\nCREAT TABLE broken;\n")
        .unwrap();
    fixture.write("20230103_c.sql", "-- migration:up\nCREATE TABLE v(w int);\n").unwrap();
    let db = TestDatabase::new().await.unwrap();

    let err = fixture.runner().unwrap().migrate(&db).await.unwrap_err();

    assert!(matches!(err, MigrationError::SqlExecution { .. }));
    assert_eq!(err.failed_migration(), Some("20230102_b"));
    db.assert_ledger(&["20230101_a"]).await.unwrap();
    db.assert_table_exists("t").await.unwrap();
    db.assert_table_missing("u").await.unwrap();
    db.assert_table_missing("v").await.unwrap();
}

#[tokio::test]
async fn test_failed_migration_is_rolled_back_not_committed() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", "-- migration:up\nBROKEN\n").unwrap();
    let db = FakeDatabase::new();
    db.fail_script_containing("BROKEN");

    fixture.runner().unwrap().migrate(&db).await.unwrap_err();

    let tail: Vec<FakeEvent> = db
        .events()
        .into_iter()
        .skip_while(|event| *event != FakeEvent::Begin)
        .collect();
    assert_eq!(
        tail,
        vec![
            FakeEvent::Begin,
            FakeEvent::Script("\nBROKEN\n".to_string()),
            FakeEvent::Rollback,
        ]
    );
}

#[tokio::test]
async fn test_commit_failure_is_transaction_error() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", A_UP).unwrap();
    let db = FakeDatabase::new();
    db.fail_commit();

    let err = fixture.runner().unwrap().migrate(&db).await.unwrap_err();
    assert!(matches!(err, MigrationError::Transaction { .. }));
}

#[tokio::test]
async fn test_empty_up_body_is_still_recorded() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", "-- migration:down\nDROP TABLE t;\n").unwrap();
    fixture.write("20230102_b.sql", "-- migration:up\n   \n").unwrap();
    let db = TestDatabase::new().await.unwrap();

    let result = fixture.runner().unwrap().migrate(&db).await.unwrap();

    assert_eq!(result.applied_count(), 2);
    db.assert_ledger(&["20230101_a", "20230102_b"]).await.unwrap();
}

#[tokio::test]
async fn test_duplicate_name_prefix_fails_on_the_ledger() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", "-- migration:up\nCREATE TABLE t(x int);\n").unwrap();
    fixture.write("20230101_a.extra.sql", "-- migration:up\nCREATE TABLE u(x int);\n").unwrap();
    let db = TestDatabase::new().await.unwrap();

    let err = fixture.runner().unwrap().migrate(&db).await.unwrap_err();

    assert!(err.is_ledger());
    db.assert_ledger(&["20230101_a"]).await.unwrap();
    let created = [db.table_exists("t").await.unwrap(), db.table_exists("u").await.unwrap()];
    assert_eq!(created.iter().filter(|exists| **exists).count(), 1);
}

#[tokio::test]
async fn test_unreadable_file_aborts_before_any_execution() {
    let fs = MemoryFileSystem::new()
        .with_file("migrations/20230101_a.sql", A_UP)
        .with_file("migrations/20230102_b.sql", B_UP);
    fs.deny("migrations/20230102_b.sql");
    let runner = MigrationRunner::with_file_system(MigrationConfig::new("migrations"), Arc::new(fs)).unwrap();
    let db = TestDatabase::new().await.unwrap();

    let err = runner.migrate(&db).await.unwrap_err();

    assert!(matches!(err, MigrationError::Io { .. }));
    db.assert_table_missing("t").await.unwrap();
    db.assert_ledger(&[]).await.unwrap();
}

#[tokio::test]
async fn test_missing_directory_is_discovery_error() {
    let fixture = MigrationFixture::uninitialized().unwrap();
    let db = TestDatabase::new().await.unwrap();

    let err = fixture.runner().unwrap().migrate(&db).await.unwrap_err();
    assert!(matches!(err, MigrationError::Discovery { .. }));
}

#[tokio::test]
async fn test_custom_ledger_table() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", A_UP).unwrap();
    let db = TestDatabase::new().await.unwrap();

    let runner = MigrationRunner::new(fixture.config().with_table("schema_history")).unwrap();
    runner.migrate(&db).await.unwrap();

    assert_eq!(db.ledger_names_in("schema_history").await.unwrap(), vec!["20230101_a"]);
    db.assert_table_missing("migrations").await.unwrap();
}

#[tokio::test]
async fn test_migrations_persist_in_a_file_database() {
    let fixture = MigrationFixture::new().unwrap();
    fixture.write("20230101_a.sql", A_UP).unwrap();
    let db_path = fixture.root().join("app.db");
    let url = format!("sqlite://{}", db_path.display());

    {
        let db = TestDatabase::from_url(&url).await.unwrap();
        fixture.runner().unwrap().migrate(&db).await.unwrap();
        db.close().await;
    }

    assert!(db_path.exists());
    let db = TestDatabase::from_url(&url).await.unwrap();
    db.assert_ledger(&["20230101_a"]).await.unwrap();
    db.assert_table_exists("t").await.unwrap();
}

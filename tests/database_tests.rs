#![cfg(feature = "server")]

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;

use activator::activation_code::{generate_activation_codes, CodeBatchConfig};
use activator::errors::{LicenseError, LicenseResult};
use activator::server::database::Database;

/// Helper: create an in-memory SQLite Database with the schema applied.
async fn setup_in_memory_db() -> LicenseResult<Arc<Database>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| LicenseError::StorageError(format!("db connect failed: {e}")))?;

    let db = Database::SQLite(pool);
    db.migrate().await?;
    Ok(Arc::new(db))
}

fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn migrate_is_idempotent() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.migrate().await?;
    db.migrate().await?;
    assert_eq!(db.count_available().await?, 0);
    Ok(())
}

#[tokio::test]
async fn inserted_codes_start_unbound_and_unused() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;

    let inserted = db
        .insert_activation_codes(&codes(&["ACT-1", "ACT-2", "ACT-3"]))
        .await?;
    assert_eq!(inserted, 3);

    let first = db
        .find_by_activation_code("ACT-1")
        .await?
        .expect("ACT-1 should exist");
    let last = db
        .find_by_activation_code("ACT-3")
        .await?
        .expect("ACT-3 should exist");

    assert!(!first.is_bound());
    assert!(!first.used);
    assert!(first.deleted_at.is_none());
    // One batch shares its timestamps.
    assert_eq!(first.created_at, last.created_at);
    assert_eq!(first.updated_at, last.updated_at);
    assert_eq!(first.created_at, first.updated_at);

    assert_eq!(db.count_available().await?, 3);
    Ok(())
}

#[tokio::test]
async fn find_unknown_code_returns_none() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_activation_codes(&codes(&["ACT-1"])).await?;

    assert!(db.find_by_activation_code("NOPE").await?.is_none());
    assert!(db.find_by_activation_code("").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_code_is_rejected_by_unique_index() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_activation_codes(&codes(&["ACT-1"])).await?;

    let result = db.insert_activation_codes(&codes(&["ACT-2", "ACT-1"])).await;
    assert!(matches!(result, Err(LicenseError::StorageError(_))));

    // The failed batch rolled back as a whole.
    assert!(db.find_by_activation_code("ACT-2").await?.is_none());
    assert_eq!(db.count_available().await?, 1);
    Ok(())
}

#[tokio::test]
async fn bind_machine_is_first_write_wins() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_activation_codes(&codes(&["ACT-1"])).await?;
    let record = db.find_by_activation_code("ACT-1").await?.unwrap();

    assert!(db.bind_machine(record.id, "machine-a").await?);
    assert!(!db.bind_machine(record.id, "machine-b").await?);
    assert!(!db.bind_machine(record.id, "machine-a").await?);

    let bound = db.find_by_activation_code("ACT-1").await?.unwrap();
    assert_eq!(bound.protected_machine_code, "machine-a");
    assert!(bound.is_bound_to("machine-a"));
    assert!(!bound.is_bound_to("machine-b"));
    assert!(bound.updated_at >= bound.created_at);

    // A bound code is no longer issuable.
    assert_eq!(db.count_available().await?, 0);
    Ok(())
}

#[tokio::test]
async fn claim_marks_code_used_and_never_repeats() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_activation_codes(&codes(&["ACT-1", "ACT-2"])).await?;

    let first = db.claim_unused_code().await?.expect("pool has codes");
    let second = db.claim_unused_code().await?.expect("pool has codes");
    assert_eq!(first, "ACT-1");
    assert_eq!(second, "ACT-2");

    assert!(db.claim_unused_code().await?.is_none());

    let record = db.find_by_activation_code("ACT-1").await?.unwrap();
    assert!(record.used);
    assert!(!record.is_bound());
    Ok(())
}

#[tokio::test]
async fn claim_skips_bound_codes() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_activation_codes(&codes(&["ACT-1", "ACT-2"])).await?;
    let bound = db.find_by_activation_code("ACT-1").await?.unwrap();
    db.bind_machine(bound.id, "machine-a").await?;

    assert_eq!(db.claim_unused_code().await?.as_deref(), Some("ACT-2"));
    assert!(db.claim_unused_code().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn used_code_can_still_be_bound() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_activation_codes(&codes(&["ACT-1"])).await?;

    let issued = db.claim_unused_code().await?.unwrap();
    let record = db.find_by_activation_code(&issued).await?.unwrap();
    assert!(db.bind_machine(record.id, "machine-a").await?);

    let record = db.find_by_activation_code(&issued).await?.unwrap();
    assert!(record.used);
    assert!(record.is_bound_to("machine-a"));
    Ok(())
}

#[tokio::test]
async fn soft_deleted_codes_are_invisible() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    db.insert_activation_codes(&codes(&["ACT-1", "ACT-2"])).await?;

    #[allow(irrefutable_let_patterns)]
    if let Database::SQLite(pool) = db.as_ref() {
        sqlx::query("UPDATE licenses SET deleted_at = updated_at WHERE activation_code = 'ACT-1'")
            .execute(pool)
            .await
            .map_err(|e| LicenseError::StorageError(e.to_string()))?;
    }

    assert!(db.find_by_activation_code("ACT-1").await?.is_none());
    assert_eq!(db.count_available().await?, 1);
    assert_eq!(db.claim_unused_code().await?.as_deref(), Some("ACT-2"));
    assert!(db.claim_unused_code().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn generated_batch_is_stored_whole() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    let batch = generate_activation_codes(&CodeBatchConfig::default());

    let inserted = db.insert_activation_codes(&batch).await?;
    assert_eq!(inserted, 1000);
    assert_eq!(db.count_available().await?, 1000);

    let unique: HashSet<_> = batch.iter().collect();
    assert_eq!(unique.len(), 1000);
    Ok(())
}

#[tokio::test]
async fn ping_and_db_type() -> LicenseResult<()> {
    let db = setup_in_memory_db().await?;
    assert!(db.ping().await);
    assert_eq!(db.db_type(), "sqlite");
    Ok(())
}

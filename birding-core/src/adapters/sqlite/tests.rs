//! Unit tests for the SQLite adapter against in-memory databases.

use super::*;
use crate::adapters::BIRD_QUERY_LIMIT;

async fn adapter_with_table() -> SqliteAdapter {
    let adapter = SqliteAdapter::new(ConnectionConfig::new(":memory:")).unwrap();
    sqlx::query("CREATE TABLE birds (species TEXT NOT NULL, description TEXT NOT NULL)")
        .execute(&adapter.pool)
        .await
        .unwrap();
    adapter
}

#[tokio::test]
async fn test_new_is_lazy() {
    let adapter = SqliteAdapter::new(ConnectionConfig::new(":memory:")).unwrap();

    assert_eq!(adapter.pool.size(), 0);
    assert!(adapter.is_in_memory());
    assert_eq!(adapter.target.database.as_deref(), Some(":memory:"));
    assert_eq!(adapter.database_type(), DatabaseType::SQLite);
}

#[tokio::test]
async fn test_new_rejects_other_schemes() {
    let result = SqliteAdapter::new(ConnectionConfig::new("birds"));
    assert!(matches!(result, Err(BirdingError::Configuration { .. })));
}

#[tokio::test]
async fn test_ping_in_memory() {
    let adapter = SqliteAdapter::new(ConnectionConfig::new("sqlite::memory:")).unwrap();
    adapter.ping().await.unwrap();
    adapter.close().await;
}

#[tokio::test]
async fn test_in_memory_database_survives_between_statements() {
    let adapter = adapter_with_table().await;

    assert_eq!(adapter.insert_bird(&Bird::rooster()).await.unwrap(), 1);

    let mut birds = Vec::new();
    adapter.query().await.unwrap().drain(&mut birds).await.unwrap();
    assert_eq!(birds, vec![Bird::rooster()]);
}

#[tokio::test]
async fn test_query_is_capped() {
    let adapter = adapter_with_table().await;
    for i in 0..15 {
        adapter
            .insert_bird(&Bird::new(format!("bird-{}", i), "flies"))
            .await
            .unwrap();
    }

    let mut birds = Vec::new();
    let drained = adapter.query().await.unwrap().drain(&mut birds).await.unwrap();

    assert_eq!(drained, BIRD_QUERY_LIMIT);
    assert_eq!(birds.len(), BIRD_QUERY_LIMIT);
}

#[tokio::test]
async fn test_null_description_is_decode_error() {
    let adapter = SqliteAdapter::new(ConnectionConfig::new(":memory:")).unwrap();
    sqlx::query("CREATE TABLE birds (species TEXT, description TEXT)")
        .execute(&adapter.pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO birds (species, description) VALUES ('owl', 'hoots'), ('dodo', NULL)",
    )
    .execute(&adapter.pool)
    .await
    .unwrap();

    let mut birds = Vec::new();
    let err = adapter
        .query()
        .await
        .unwrap()
        .drain(&mut birds)
        .await
        .unwrap_err();

    assert!(matches!(err, BirdingError::RowDecode { .. }));
    assert_eq!(birds, vec![Bird::new("owl", "hoots")]);
}

#[tokio::test]
async fn test_null_species_is_not_an_empty_string() {
    let adapter = SqliteAdapter::new(ConnectionConfig::new(":memory:")).unwrap();
    sqlx::query("CREATE TABLE birds (species TEXT, description TEXT)")
        .execute(&adapter.pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO birds (species, description) VALUES (NULL, 'x'), ('dodo', NULL)")
        .execute(&adapter.pool)
        .await
        .unwrap();

    let mut birds = Vec::new();
    let err = adapter
        .query()
        .await
        .unwrap()
        .drain(&mut birds)
        .await
        .unwrap_err();

    assert!(matches!(err, BirdingError::RowDecode { .. }));
    assert!(err.to_string().contains("row 0: column 'species'"));
    assert!(birds.is_empty());
}

#[tokio::test]
async fn test_empty_text_still_decodes() {
    let adapter = adapter_with_table().await;
    adapter.insert_bird(&Bird::new("", "")).await.unwrap();

    let mut birds = Vec::new();
    adapter.query().await.unwrap().drain(&mut birds).await.unwrap();

    assert_eq!(birds, vec![Bird::new("", "")]);
}

#[tokio::test]
async fn test_missing_table_is_query_error() {
    let adapter = SqliteAdapter::new(ConnectionConfig::new(":memory:")).unwrap();

    assert!(matches!(
        adapter.query().await,
        Err(BirdingError::QueryExecution { .. })
    ));
    assert!(matches!(
        adapter.insert_bird(&Bird::rooster()).await,
        Err(BirdingError::QueryExecution { .. })
    ));
}

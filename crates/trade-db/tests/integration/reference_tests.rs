use trade_core::models::{DuplicatePolicy, TradeFilter};
use trade_core::reference;
use trade_core::testutil::record;
use trade_db::{Database, DatabaseConfig};

use crate::common::setup_test_db;

#[tokio::test]
async fn reference_tables_are_populated() {
    let (_db, repo) = setup_test_db().await;

    let countries = repo.countries().await.unwrap();
    assert_eq!(countries.len(), reference::COUNTRIES.len());
    let usa = countries.iter().find(|c| c.code == "USA").unwrap();
    assert_eq!(usa.name, "United States of America");
    assert_eq!(usa.region, "Americas");

    let hs = repo.hs_codes().await.unwrap();
    assert_eq!(hs.len(), reference::HS_CATEGORIES.len());
    assert!(hs.iter().any(|h| h.code == "TOTAL"));
}

#[tokio::test]
async fn initialize_is_idempotent_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: dir.path().join("nested/trade.db").to_string_lossy().into_owned(),
        max_connections: 2,
        duplicate_policy: DuplicatePolicy::Append,
    };

    let db = Database::connect(&config).await.unwrap();
    db.initialize().await.unwrap();
    db.trade_repo()
        .insert_batch(&[record("USA", "DEU", 2023, "84")], DuplicatePolicy::Append)
        .await
        .unwrap();
    db.close().await;

    let db = Database::connect(&config).await.unwrap();
    db.initialize().await.unwrap();
    let repo = db.trade_repo();

    let stats = repo.summary_stats(&TradeFilter::default()).await.unwrap();
    assert_eq!(stats.record_count, 1);
    assert_eq!(repo.countries().await.unwrap().len(), reference::COUNTRIES.len());
}

#[tokio::test]
async fn in_memory_config_connects() {
    let db = Database::connect(&DatabaseConfig::in_memory()).await.unwrap();
    db.initialize().await.unwrap();
    db.trade_repo().health_check().await.unwrap();
}

use trade_db::{Database, TradeRepository};

/// Fresh in-memory database with the schema and reference data loaded.
///
/// The `Database` owns the only connection; keep it alive for the test.
pub async fn setup_test_db() -> (Database, TradeRepository) {
    let db = Database::in_memory()
        .await
        .expect("Failed to open in-memory database");
    db.initialize().await.expect("Failed to initialize schema");
    let repo = db.trade_repo();
    (db, repo)
}

use trade_core::models::{DuplicatePolicy, TradeFilter, TradeFlow};
use trade_core::sample::SampleGenerator;
use trade_core::testutil::record;
use trade_core::{AppError, TradeStore};

use crate::common::setup_test_db;

#[tokio::test]
async fn insert_and_query_round_trip() {
    let (_db, repo) = setup_test_db().await;

    let mut annual = record("USA", "CHN", 2022, "84");
    annual.month = None;
    annual.quantity = None;
    annual.unit = None;
    let rows = vec![record("DEU", "USA", 2023, "01"), annual.clone()];

    let outcome = repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap();
    assert_eq!(outcome.inserted, 2);

    let stored = repo.query(&TradeFilter::default()).await.unwrap();
    // Ordered by year first.
    assert_eq!(stored, vec![annual, rows[0].clone()]);
}

#[tokio::test]
async fn invalid_record_rejects_whole_batch() {
    let (_db, repo) = setup_test_db().await;

    let mut bad = record("USA", "DEU", 2023, "84");
    bad.trade_value = -1.0;
    let rows = vec![record("USA", "DEU", 2022, "84"), bad];

    let err = repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let stats = repo.summary_stats(&TradeFilter::default()).await.unwrap();
    assert_eq!(stats.record_count, 0);
}

#[tokio::test]
async fn implausible_year_is_rejected_before_storage() {
    let (_db, repo) = setup_test_db().await;

    let rows = vec![record("USA", "DEU", 2022, "84"), record("USA", "DEU", 1500, "84")];
    let err = repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let mut lowercase = record("USA", "DEU", 2022, "84");
    lowercase.reporter_code = "usa".into();
    assert!(repo.insert_batch(&[lowercase], DuplicatePolicy::Append).await.is_err());

    assert!(repo.query(&TradeFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn failure_mid_transaction_rolls_back_earlier_rows() {
    let (db, repo) = setup_test_db().await;
    sqlx::query(
        "CREATE TRIGGER fail_on_electronics BEFORE INSERT ON trade_data \
         WHEN NEW.hs_code = '85' BEGIN SELECT RAISE(ABORT, 'electronics rejected'); END",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let rows = vec![record("USA", "DEU", 2023, "84"), record("USA", "DEU", 2023, "85")];
    let err = repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap_err();
    match err {
        AppError::StorageError(msg) => assert!(msg.contains("electronics rejected")),
        other => panic!("expected storage error, got {other:?}"),
    }

    assert!(repo.query(&TradeFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn append_keeps_duplicates() {
    let (_db, repo) = setup_test_db().await;
    let row = record("USA", "DEU", 2023, "84");

    repo.insert_batch(&[row.clone()], DuplicatePolicy::Append).await.unwrap();
    repo.insert_batch(&[row], DuplicatePolicy::Append).await.unwrap();

    assert_eq!(repo.query(&TradeFilter::default()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn replace_overwrites_same_key() {
    let (_db, repo) = setup_test_db().await;
    let old = record("USA", "DEU", 2023, "84");
    let mut new = old.clone();
    new.trade_value = 42.0;
    let other = record("USA", "DEU", 2023, "85");

    repo.insert_batch(&[old, other], DuplicatePolicy::Append).await.unwrap();
    let outcome = repo.insert_batch(&[new.clone()], DuplicatePolicy::Replace).await.unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.replaced, 1);

    let stored = repo.query(&TradeFilter::default()).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.contains(&new));
}

#[tokio::test]
async fn replace_keeps_same_key_rows_within_batch() {
    let (_db, repo) = setup_test_db().await;
    let a = record("USA", "DEU", 2023, "84");
    let mut b = a.clone();
    b.trade_value = 7.0;

    let outcome = repo.insert_batch(&[a, b], DuplicatePolicy::Replace).await.unwrap();
    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.replaced, 0);
}

#[tokio::test]
async fn skip_keeps_existing_row() {
    let (_db, repo) = setup_test_db().await;
    let old = record("USA", "DEU", 2023, "84");
    let mut new = old.clone();
    new.trade_value = 42.0;

    repo.insert_batch(&[old.clone()], DuplicatePolicy::Append).await.unwrap();
    let outcome = repo
        .insert_batch(&[new, record("USA", "DEU", 2022, "84")], DuplicatePolicy::Skip)
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.skipped, 1);

    let stored = repo.query(&TradeFilter { year: Some(2023), ..Default::default() }).await.unwrap();
    assert_eq!(stored, vec![old]);
}

#[tokio::test]
async fn skip_drops_repeated_keys_within_batch() {
    let (_db, repo) = setup_test_db().await;
    let first = record("USA", "DEU", 2023, "84");
    let mut repeat = first.clone();
    repeat.trade_value = 7.0;

    let outcome = repo
        .insert_batch(&[first.clone(), repeat], DuplicatePolicy::Skip)
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(repo.query(&TradeFilter::default()).await.unwrap(), vec![first]);
}

#[tokio::test]
async fn null_month_is_part_of_the_key() {
    let (_db, repo) = setup_test_db().await;
    let mut annual = record("USA", "DEU", 2023, "84");
    annual.month = None;
    let monthly = record("USA", "DEU", 2023, "84");

    repo.insert_batch(&[annual.clone(), monthly.clone()], DuplicatePolicy::Append)
        .await
        .unwrap();

    let mut updated = annual.clone();
    updated.trade_value = 1.0;
    let outcome = repo.insert_batch(&[updated], DuplicatePolicy::Replace).await.unwrap();
    assert_eq!(outcome.replaced, 1);

    let stored = repo.query(&TradeFilter::default()).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.contains(&monthly));
}

#[tokio::test]
async fn filters_select_exactly() {
    let (_db, repo) = setup_test_db().await;
    let mut export = record("CHN", "USA", 2022, "8471");
    export.trade_flow = TradeFlow::Export;
    let rows = vec![
        record("USA", "CHN", 2022, "84"),
        record("USA", "DEU", 2023, "01"),
        export,
        record("DEU", "USA", 2023, "85"),
    ];
    repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap();

    let usa = repo.query(&TradeFilter::reporter("USA")).await.unwrap();
    assert_eq!(usa.len(), 2);
    assert!(usa.iter().all(|r| r.reporter_code == "USA"));

    let partner = TradeFilter { partner_code: Some("USA".into()), ..Default::default() };
    assert_eq!(repo.query(&partner).await.unwrap().len(), 2);

    let chapter = TradeFilter { hs_code: Some("84".into()), ..Default::default() };
    let machinery = repo.query(&chapter).await.unwrap();
    assert_eq!(machinery.len(), 2);
    assert!(machinery.iter().all(|r| r.hs_code.starts_with("84")));

    let exports = TradeFilter { trade_flow: Some(TradeFlow::Export), ..Default::default() };
    assert_eq!(repo.query(&exports).await.unwrap().len(), 1);

    let year = TradeFilter { year: Some(2023), reporter_code: Some("USA".into()), ..Default::default() };
    assert_eq!(repo.query(&year).await.unwrap().len(), 1);

    assert!(repo.query(&TradeFilter::reporter("XXX")).await.unwrap().is_empty());
}

#[tokio::test]
async fn invalid_filter_is_rejected() {
    let (_db, repo) = setup_test_db().await;
    let err = repo
        .query(&TradeFilter { hs_code: Some("8%".into()), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn query_limited_caps_rows() {
    let (_db, repo) = setup_test_db().await;
    let rows: Vec<_> = (2015..2023).map(|y| record("USA", "DEU", y, "84")).collect();
    repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap();

    let first = repo.query_limited(&TradeFilter::default(), Some(3)).await.unwrap();
    assert_eq!(first.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2015, 2016, 2017]);
}

#[tokio::test]
async fn summary_of_empty_store() {
    let (_db, repo) = setup_test_db().await;
    let stats = repo.summary_stats(&TradeFilter::default()).await.unwrap();
    assert_eq!(stats.record_count, 0);
    assert_eq!(stats.total_trade_value, 0.0);
    assert_eq!(stats.distinct_country_count, 0);
    assert_eq!(stats.year_range(), "No data");
}

#[tokio::test]
async fn summary_of_sample_batch() {
    let (_db, repo) = setup_test_db().await;
    let rows = SampleGenerator::new(3)
        .generate(&["USA", "DEU"], &[2023], &["01", "84"], 50)
        .unwrap();
    let expected_total: f64 = rows.iter().map(|r| r.trade_value).sum();

    repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap();
    let stats = repo.summary_stats(&TradeFilter::default()).await.unwrap();

    assert_eq!(stats.record_count, 50);
    assert_eq!(stats.distinct_country_count, 2);
    assert_eq!(stats.unique_reporters, 2);
    assert!(stats.distinct_hs_count <= 2);
    assert_eq!(stats.year_range(), "2023-2023");
    assert!((stats.total_trade_value - expected_total).abs() < 1e-3);
}

#[tokio::test]
async fn summary_respects_filter() {
    let (_db, repo) = setup_test_db().await;
    let rows = vec![
        record("USA", "CHN", 2021, "84"),
        record("USA", "JPN", 2023, "85"),
        record("DEU", "FRA", 2022, "84"),
    ];
    repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap();

    let stats = repo.summary_stats(&TradeFilter::reporter("USA")).await.unwrap();
    assert_eq!(stats.record_count, 2);
    assert_eq!(stats.distinct_country_count, 3);
    assert_eq!(stats.unique_partners, 2);
    assert_eq!(stats.year_range(), "2021-2023");
    assert_eq!(stats.total_trade_value, 2_000_000.0);
}

#[tokio::test]
async fn top_traders_rank_by_value() {
    let (_db, repo) = setup_test_db().await;
    let mut big = record("CHN", "USA", 2023, "85");
    big.trade_value = 9_000_000.0;
    big.trade_flow = TradeFlow::Export;
    let mut small = record("DEU", "USA", 2023, "85");
    small.trade_flow = TradeFlow::Export;
    let import = record("USA", "CHN", 2023, "85");
    repo.insert_batch(&[small, big, import], DuplicatePolicy::Append).await.unwrap();

    let exporters = repo.top_traders(Some(TradeFlow::Export), 10).await.unwrap();
    assert_eq!(exporters.len(), 2);
    assert_eq!(exporters[0].reporter_code, "CHN");
    assert_eq!(exporters[0].reporter_name, "China");
    assert_eq!(exporters[0].record_count, 1);

    let all = repo.top_traders(None, 1).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn trends_group_by_year_and_flow() {
    let (_db, repo) = setup_test_db().await;
    let mut export = record("USA", "CHN", 2022, "84");
    export.trade_flow = TradeFlow::Export;
    let rows = vec![
        record("USA", "CHN", 2022, "84"),
        record("USA", "DEU", 2022, "85"),
        export,
        record("USA", "CHN", 2023, "84"),
        record("DEU", "USA", 2023, "84"),
    ];
    repo.insert_batch(&rows, DuplicatePolicy::Append).await.unwrap();

    let trends = repo.trade_trends(Some("USA")).await.unwrap();
    assert_eq!(trends.len(), 3);
    assert_eq!(trends[0].year, 2022);
    assert_eq!(trends[0].trade_flow, TradeFlow::Export);
    assert_eq!(trends[1].trade_flow, TradeFlow::Import);
    assert_eq!(trends[1].total_value, 2_000_000.0);

    let everyone = repo.trade_trends(None).await.unwrap();
    assert_eq!(everyone.last().unwrap().total_value, 2_000_000.0);
}

#[tokio::test]
async fn cleanup_removes_only_old_rows() {
    let (db, repo) = setup_test_db().await;
    repo.insert_batch(
        &[record("USA", "DEU", 2021, "84"), record("USA", "DEU", 2022, "84")],
        DuplicatePolicy::Append,
    )
    .await
    .unwrap();

    sqlx::query("UPDATE trade_data SET created_at = datetime('now', '-40 days') WHERE year = 2021")
        .execute(db.pool())
        .await
        .unwrap();

    assert_eq!(repo.cleanup_old_data(30).await.unwrap(), 1);
    let left = repo.query(&TradeFilter::default()).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].year, 2022);
}

#[tokio::test]
async fn works_through_the_store_trait() {
    async fn count<S: TradeStore>(store: &S) -> i64 {
        store.summary_stats(&TradeFilter::default()).await.unwrap().record_count
    }

    let (_db, repo) = setup_test_db().await;
    TradeStore::insert_batch(&repo, &[record("USA", "DEU", 2023, "84")], DuplicatePolicy::Skip)
        .await
        .unwrap();
    assert_eq!(count(&repo).await, 1);
    repo.health_check().await.unwrap();
}

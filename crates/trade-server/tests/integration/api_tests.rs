use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use http_body_util::BodyExt;

use trade_core::models::TradeFlow;
use trade_core::testutil::record;

use crate::common::setup_test_app;

async fn json(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn records_are_filtered_by_reporter() {
    let app = setup_test_app().await;
    app.seed(&[
        record("USA", "CHN", 2022, "84"),
        record("DEU", "USA", 2023, "85"),
        record("USA", "DEU", 2023, "01"),
    ])
    .await;

    let response = app.get("/v1/records?reporter=usa").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json(response).await;
    assert_eq!(json["total"], 2);
    let records = json["records"].as_array().unwrap();
    assert!(records.iter().all(|r| r["reporter_code"] == "USA"));
    assert_eq!(records[0]["year"], 2022);
    assert_eq!(records[0]["trade_flow"], "Import");
}

#[tokio::test]
async fn records_respect_limit() {
    let app = setup_test_app().await;
    let rows: Vec<_> = (2018..2024).map(|y| record("USA", "DEU", y, "84")).collect();
    app.seed(&rows).await;

    let json = json(app.get("/v1/records?limit=2").await).await;
    assert_eq!(json["total"], 2);
}

#[tokio::test]
async fn invalid_filter_returns_400() {
    let app = setup_test_app().await;

    let response = app.get("/v1/records?flow=sideways").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json(response).await;
    assert_eq!(json["error"], "validation_error");

    let response = app.get("/v1/summary?hs_code=8a").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn csv_export_has_header_and_rows() {
    let app = setup_test_app().await;
    app.seed(&[record("USA", "DEU", 2023, "84")]).await;

    let response = app.get("/v1/records.csv?year=2023").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        trade_core::export::CSV_HEADER.join(",")
    );
    assert!(lines.next().unwrap().starts_with("2023,6,USA,United States of America,DEU,Germany,Import,84,"));
    assert!(lines.next().is_none());
}

#[tokio::test]
async fn summary_reports_aggregates() {
    let app = setup_test_app().await;
    app.seed(&[
        record("USA", "CHN", 2021, "84"),
        record("USA", "JPN", 2023, "85"),
    ])
    .await;

    let json = json(app.get("/v1/summary").await).await;
    assert_eq!(json["record_count"], 2);
    assert_eq!(json["distinct_country_count"], 3);
    assert_eq!(json["year_range"], "2021-2023");
    assert_eq!(json["total_trade_value"], 2_000_000.0);
}

#[tokio::test]
async fn summary_of_empty_store() {
    let app = setup_test_app().await;

    let json = json(app.get("/v1/summary").await).await;
    assert_eq!(json["record_count"], 0);
    assert_eq!(json["total_trade_value"], 0.0);
    assert_eq!(json["year_range"], "No data");
}

#[tokio::test]
async fn top_traders_by_flow() {
    let app = setup_test_app().await;
    let mut chn = record("CHN", "USA", 2023, "85");
    chn.trade_flow = TradeFlow::Export;
    chn.trade_value = 5_000_000.0;
    let mut deu = record("DEU", "USA", 2023, "85");
    deu.trade_flow = TradeFlow::Export;
    app.seed(&[deu, chn, record("USA", "CHN", 2023, "85")]).await;

    let json = json(app.get("/v1/top-traders?flow=Export&limit=5").await).await;
    let traders = json["traders"].as_array().unwrap();
    assert_eq!(traders.len(), 2);
    assert_eq!(traders[0]["reporter_code"], "CHN");
    assert_eq!(traders[0]["reporter_name"], "China");
}

#[tokio::test]
async fn trends_for_one_country() {
    let app = setup_test_app().await;
    app.seed(&[
        record("USA", "CHN", 2022, "84"),
        record("USA", "CHN", 2023, "84"),
        record("DEU", "USA", 2023, "84"),
    ])
    .await;

    let json = json(app.get("/v1/trends?country=USA").await).await;
    let points = json["points"].as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0]["year"], 2022);
    assert_eq!(points[1]["total_value"], 1_000_000.0);
}

#[tokio::test]
async fn reference_endpoints_list_static_data() {
    let app = setup_test_app().await;

    let countries = json(app.get("/v1/countries").await).await;
    let countries = countries.as_array().unwrap();
    assert_eq!(countries.len(), trade_core::reference::COUNTRIES.len());
    assert!(countries.iter().any(|c| c["code"] == "DEU" && c["name"] == "Germany"));

    let codes = json(app.get("/v1/hs-codes").await).await;
    assert!(codes
        .as_array()
        .unwrap()
        .iter()
        .any(|h| h["code"] == "84"));
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app.get("/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = json(response).await;
    assert!(json["paths"]["/v1/records"].is_object());
    assert!(json["paths"]["/v1/summary"].is_object());
}

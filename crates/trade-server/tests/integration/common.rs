use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use tower::ServiceExt;

use trade_core::models::{DuplicatePolicy, TradeRecord};
use trade_db::{Database, TradeRepository};
use trade_server::routes;
use trade_server::state::AppState;

pub struct TestApp {
    pub router: Router,
    pub repo: TradeRepository,
}

impl TestApp {
    pub async fn seed(&self, records: &[TradeRecord]) {
        self.repo
            .insert_batch(records, DuplicatePolicy::Append)
            .await
            .expect("Failed to seed records");
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

/// Router over a fresh in-memory database with reference data loaded.
pub async fn setup_test_app() -> TestApp {
    let db = Database::in_memory()
        .await
        .expect("Failed to open in-memory database");
    db.initialize().await.expect("Failed to initialize schema");
    let repo = db.trade_repo();

    let state = Arc::new(AppState { db });
    TestApp {
        router: routes::router(state),
        repo,
    }
}

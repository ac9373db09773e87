use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use trade_core::export;

use crate::dto::{
    CountryResponse, HealthResponse, HsCodeResponse, RecordListResponse, RecordsQuery,
    SummaryResponse, TopTradersQuery, TopTradersResponse, TradeRecordResponse, TraderResponse,
    TrendPointResponse, TrendsQuery, TrendsResponse, parse_flow,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

const DEFAULT_TOP_TRADERS: u32 = 10;
const MAX_TOP_TRADERS: u32 = 100;

/// Build the full router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/records", get(list_records))
        .route("/v1/records.csv", get(export_records))
        .route("/v1/summary", get(summary))
        .route("/v1/top-traders", get(top_traders))
        .route("/v1/trends", get(trends))
        .route("/v1/countries", get(list_countries))
        .route("/v1/hs-codes", get(list_hs_codes));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/records",
    params(RecordsQuery),
    responses(
        (status = 200, description = "Matching records", body = RecordListResponse),
        (status = 400, description = "Invalid filter", body = crate::dto::ErrorResponse),
    ),
    tag = "records"
)]
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.to_filter()?;
    let records = state
        .db
        .trade_repo()
        .query_limited(&filter, Some(query.limit()))
        .await?;

    let response = RecordListResponse {
        total: records.len(),
        records: records.into_iter().map(TradeRecordResponse::from).collect(),
    };

    Ok(axum::Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/records.csv",
    params(RecordsQuery),
    responses(
        (status = 200, description = "Matching records as CSV", content_type = "text/csv"),
        (status = 400, description = "Invalid filter", body = crate::dto::ErrorResponse),
    ),
    tag = "records"
)]
pub async fn export_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.to_filter()?;
    let records = state
        .db
        .trade_repo()
        .query_limited(&filter, Some(query.limit()))
        .await?;
    let body = export::to_csv_string(&records)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"trade_data.csv\"",
            ),
        ],
        body,
    ))
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/summary",
    params(RecordsQuery),
    responses(
        (status = 200, description = "Aggregate statistics", body = SummaryResponse),
        (status = 400, description = "Invalid filter", body = crate::dto::ErrorResponse),
    ),
    tag = "analytics"
)]
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.to_filter()?;
    let stats = state.db.trade_repo().summary_stats(&filter).await?;
    Ok(axum::Json(SummaryResponse::from(stats)))
}

#[utoipa::path(
    get,
    path = "/v1/top-traders",
    params(TopTradersQuery),
    responses(
        (status = 200, description = "Reporters ranked by trade value", body = TopTradersResponse),
        (status = 400, description = "Invalid flow", body = crate::dto::ErrorResponse),
    ),
    tag = "analytics"
)]
pub async fn top_traders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopTradersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let flow = parse_flow(query.flow.as_deref())?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_TRADERS)
        .clamp(1, MAX_TOP_TRADERS);

    let traders = state.db.trade_repo().top_traders(flow, limit).await?;

    let response = TopTradersResponse {
        traders: traders.into_iter().map(TraderResponse::from).collect(),
    };
    Ok(axum::Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/trends",
    params(TrendsQuery),
    responses(
        (status = 200, description = "Total value per year and flow", body = TrendsResponse),
    ),
    tag = "analytics"
)]
pub async fn trends(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let country = query.country.map(|c| c.trim().to_uppercase());
    let points = state
        .db
        .trade_repo()
        .trade_trends(country.as_deref())
        .await?;

    let response = TrendsResponse {
        points: points.into_iter().map(TrendPointResponse::from).collect(),
    };
    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/countries",
    responses(
        (status = 200, description = "Known countries", body = Vec<CountryResponse>),
    ),
    tag = "reference"
)]
pub async fn list_countries(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let countries = state.db.trade_repo().countries().await?;
    let response: Vec<CountryResponse> = countries.into_iter().map(Into::into).collect();
    Ok(axum::Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/hs-codes",
    responses(
        (status = 200, description = "Known HS chapters", body = Vec<HsCodeResponse>),
    ),
    tag = "reference"
)]
pub async fn list_hs_codes(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let codes = state.db.trade_repo().hs_codes().await?;
    let response: Vec<HsCodeResponse> = codes.into_iter().map(Into::into).collect();
    Ok(axum::Json(response))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let db_status = match state.db.trade_repo().health_check().await {
        Ok(()) => "ok",
        Err(_) => "error",
    };

    let status = if db_status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if db_status == "ok" {
            "healthy"
        } else {
            "unhealthy"
        },
        database: db_status,
    };

    (status, axum::Json(response))
}

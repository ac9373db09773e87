use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tradewatch API",
        version = "0.1.0",
        description = "Read-only access to stored UN Comtrade trade statistics."
    ),
    paths(
        crate::routes::list_records,
        crate::routes::export_records,
        crate::routes::summary,
        crate::routes::top_traders,
        crate::routes::trends,
        crate::routes::list_countries,
        crate::routes::list_hs_codes,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::TradeRecordResponse,
        crate::dto::RecordListResponse,
        crate::dto::SummaryResponse,
        crate::dto::TraderResponse,
        crate::dto::TopTradersResponse,
        crate::dto::TrendPointResponse,
        crate::dto::TrendsResponse,
        crate::dto::CountryResponse,
        crate::dto::HsCodeResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "records", description = "Stored trade records"),
        (name = "analytics", description = "Aggregates over stored records"),
        (name = "reference", description = "Country and HS code reference data"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;

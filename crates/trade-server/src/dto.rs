use serde::{Deserialize, Serialize};

use trade_core::error::AppError;
use trade_core::models::{
    Country, HsCategory, SummaryStats, TradeFilter, TradeFlow, TradeRecord, TraderTotal,
    TrendPoint,
};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct RecordsQuery {
    pub year: Option<i32>,
    /// Reporter country code (ISO alpha-3).
    pub reporter: Option<String>,
    /// Partner country code (ISO alpha-3).
    pub partner: Option<String>,
    /// Import, Export, Re-Import, Re-Export, or M/X/RM/RX.
    pub flow: Option<String>,
    /// HS code prefix; "84" also matches "8471".
    pub hs_code: Option<String>,
    /// Maximum rows returned (default 1000, capped at 10000).
    pub limit: Option<u32>,
}

impl RecordsQuery {
    pub const DEFAULT_LIMIT: u32 = 1_000;
    pub const MAX_LIMIT: u32 = 10_000;

    /// Validated storage filter for these parameters.
    pub fn to_filter(&self) -> Result<TradeFilter, AppError> {
        let filter = TradeFilter {
            year: self.year,
            reporter_code: self.reporter.as_deref().map(normalize_code),
            partner_code: self.partner.as_deref().map(normalize_code),
            trade_flow: parse_flow(self.flow.as_deref())?,
            hs_code: self.hs_code.as_deref().map(normalize_code),
        };
        filter.validate()?;
        Ok(filter)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn parse_flow(raw: Option<&str>) -> Result<Option<TradeFlow>, AppError> {
    raw.map(|f| f.parse().map_err(AppError::ValidationError))
        .transpose()
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TradeRecordResponse {
    pub year: i32,
    pub month: Option<u32>,
    pub reporter_code: String,
    pub reporter_name: String,
    pub partner_code: String,
    pub partner_name: String,
    pub trade_flow: String,
    pub hs_code: String,
    pub hs_description: String,
    pub trade_value: f64,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

impl From<TradeRecord> for TradeRecordResponse {
    fn from(r: TradeRecord) -> Self {
        Self {
            year: r.year,
            month: r.month,
            reporter_code: r.reporter_code,
            reporter_name: r.reporter_name,
            partner_code: r.partner_code,
            partner_name: r.partner_name,
            trade_flow: r.trade_flow.to_string(),
            hs_code: r.hs_code,
            hs_description: r.hs_description,
            trade_value: r.trade_value,
            quantity: r.quantity,
            unit: r.unit,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RecordListResponse {
    pub records: Vec<TradeRecordResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SummaryResponse {
    pub record_count: i64,
    pub total_trade_value: f64,
    pub distinct_country_count: i64,
    pub distinct_hs_count: i64,
    pub unique_reporters: i64,
    pub unique_partners: i64,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    /// "2020-2023", or "No data".
    pub year_range: String,
}

impl From<SummaryStats> for SummaryResponse {
    fn from(s: SummaryStats) -> Self {
        let year_range = s.year_range();
        Self {
            record_count: s.record_count,
            total_trade_value: s.total_trade_value,
            distinct_country_count: s.distinct_country_count,
            distinct_hs_count: s.distinct_hs_count,
            unique_reporters: s.unique_reporters,
            unique_partners: s.unique_partners,
            min_year: s.min_year,
            max_year: s.max_year,
            year_range,
        }
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct TopTradersQuery {
    /// Restrict to one trade flow.
    pub flow: Option<String>,
    /// Number of reporters (default 10, capped at 100).
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TraderResponse {
    pub reporter_code: String,
    pub reporter_name: String,
    pub total_value: f64,
    pub record_count: i64,
}

impl From<TraderTotal> for TraderResponse {
    fn from(t: TraderTotal) -> Self {
        Self {
            reporter_code: t.reporter_code,
            reporter_name: t.reporter_name,
            total_value: t.total_value,
            record_count: t.record_count,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TopTradersResponse {
    pub traders: Vec<TraderResponse>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct TrendsQuery {
    /// Reporter country code; all reporters when omitted.
    pub country: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TrendPointResponse {
    pub year: i32,
    pub trade_flow: String,
    pub total_value: f64,
}

impl From<TrendPoint> for TrendPointResponse {
    fn from(p: TrendPoint) -> Self {
        Self {
            year: p.year,
            trade_flow: p.trade_flow.to_string(),
            total_value: p.total_value,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TrendsResponse {
    pub points: Vec<TrendPointResponse>,
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CountryResponse {
    pub code: String,
    pub name: String,
    pub region: String,
}

impl From<Country> for CountryResponse {
    fn from(c: Country) -> Self {
        Self {
            code: c.code,
            name: c.name,
            region: c.region,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HsCodeResponse {
    pub code: String,
    pub description: String,
}

impl From<HsCategory> for HsCodeResponse {
    fn from(h: HsCategory) -> Self {
        Self {
            code: h.code,
            description: h.description,
        }
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

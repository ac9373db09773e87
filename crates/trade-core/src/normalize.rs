//! Turns raw API payloads into canonical [`TradeRecord`]s.
//!
//! Accepts both the canonical snake_case field names (so a stored record can
//! be normalized again unchanged) and the camelCase names returned by the
//! Comtrade API. Rows that cannot be salvaged are logged and dropped; a bad
//! row never aborts its batch.

use serde_json::Value;

use crate::error::AppError;
use crate::models::{
    RawTradeRecord, TradeFlow, TradeRecord, YearRange, is_country_code, is_hs_code,
};
use crate::reference;

const YEAR_KEYS: &[&str] = &["year", "refYear", "period"];
const MONTH_KEYS: &[&str] = &["month", "refMonth"];
const REPORTER_CODE_KEYS: &[&str] = &["reporter_code", "reporterISO", "reporterCode"];
const REPORTER_NAME_KEYS: &[&str] = &["reporter_name", "reporterDesc"];
const PARTNER_CODE_KEYS: &[&str] = &["partner_code", "partnerISO", "partnerCode"];
const PARTNER_NAME_KEYS: &[&str] = &["partner_name", "partnerDesc"];
const FLOW_KEYS: &[&str] = &["trade_flow", "flowCode", "flowDesc"];
const HS_CODE_KEYS: &[&str] = &["hs_code", "cmdCode"];
const VALUE_KEYS: &[&str] = &["trade_value", "primaryValue", "tradeValue"];
const QUANTITY_KEYS: &[&str] = &["quantity", "qty"];
const UNIT_KEYS: &[&str] = &["unit", "qtyUnitAbbr"];

/// HS code used when a row carries none.
pub const DEFAULT_HS_CODE: &str = "TOTAL";

/// Outcome of normalizing a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<TradeRecord>,
    pub dropped: usize,
}

/// Stateless record normalizer, parameterised by the plausible year range.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    years: YearRange,
}

impl Normalizer {
    pub fn new(years: YearRange) -> Self {
        Self { years }
    }

    /// Normalize one row; `None` (with a warning logged) if it is unusable.
    pub fn normalize(&self, raw: &RawTradeRecord) -> Option<TradeRecord> {
        match self.try_normalize(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, record = %summarize(raw), "Dropping trade record");
                None
            }
        }
    }

    /// Normalize every row, counting the ones that were dropped.
    pub fn normalize_batch(&self, raws: &[RawTradeRecord]) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for raw in raws {
            match self.normalize(raw) {
                Some(record) => batch.records.push(record),
                None => batch.dropped += 1,
            }
        }
        if batch.dropped > 0 {
            tracing::info!(
                kept = batch.records.len(),
                dropped = batch.dropped,
                "Normalized batch with dropped rows"
            );
        }
        batch
    }

    /// Normalize one row, explaining why it was rejected.
    pub fn try_normalize(&self, raw: &RawTradeRecord) -> Result<TradeRecord, AppError> {
        let (year, period_month) = raw
            .first(YEAR_KEYS)
            .and_then(parse_period)
            .ok_or_else(|| invalid("missing or invalid year"))?;
        if !self.years.contains(year) {
            return Err(invalid(format!(
                "year {year} outside {}-{}",
                self.years.min, self.years.max
            )));
        }

        let month = match raw.first(MONTH_KEYS) {
            Some(v) => as_integer(v).and_then(|m| u32::try_from(m).ok()),
            None => period_month,
        }
        .filter(|m| (1..=12).contains(m));

        let reporter_code =
            country_code(raw, REPORTER_CODE_KEYS).ok_or_else(|| invalid("missing reporter"))?;
        let partner_code =
            country_code(raw, PARTNER_CODE_KEYS).ok_or_else(|| invalid("missing partner"))?;

        let trade_flow = FLOW_KEYS
            .iter()
            .filter_map(|k| raw.get(k).and_then(Value::as_str))
            .find_map(|s| s.parse::<TradeFlow>().ok())
            .ok_or_else(|| invalid("missing or unknown trade flow"))?;

        let trade_value = raw
            .first(VALUE_KEYS)
            .and_then(as_number)
            .ok_or_else(|| invalid("missing or non-numeric trade value"))?;
        if !trade_value.is_finite() || trade_value < 0.0 {
            return Err(invalid(format!("negative trade value {trade_value}")));
        }

        let hs_code = match raw.first(HS_CODE_KEYS) {
            Some(value) => hs_code(value)?,
            None => DEFAULT_HS_CODE.to_string(),
        };

        let quantity = raw
            .first(QUANTITY_KEYS)
            .and_then(as_number)
            .filter(|q| q.is_finite() && *q >= 0.0);

        let unit = raw
            .first(UNIT_KEYS)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(TradeRecord {
            year,
            month,
            reporter_name: country_name(&reporter_code, raw, REPORTER_NAME_KEYS),
            reporter_code,
            partner_name: country_name(&partner_code, raw, PARTNER_NAME_KEYS),
            partner_code,
            trade_flow,
            hs_description: reference::hs_description(&hs_code).to_string(),
            hs_code,
            trade_value,
            quantity,
            unit,
        })
    }
}

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::ValidationError(msg.into())
}

/// Year, plus month when the period is `YYYYMM`.
fn parse_period(value: &Value) -> Option<(i32, Option<u32>)> {
    let n = as_integer(value)?;
    if (100_000..=999_999).contains(&n) {
        let year = i32::try_from(n / 100).ok()?;
        let month = u32::try_from(n % 100).ok();
        Some((year, month))
    } else {
        Some((i32::try_from(n).ok()?, None))
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// First key that yields a usable country code. Numeric M49 codes are
/// mapped through the reference table.
fn country_code(raw: &RawTradeRecord, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| raw.get(k)).find_map(|v| match v {
        Value::Number(_) => as_integer(v)
            .and_then(|n| u16::try_from(n).ok())
            .and_then(reference::country_by_m49)
            .map(|c| c.code.to_string()),
        Value::String(s) => {
            let code = s.trim().to_uppercase();
            if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
                code.parse::<u16>()
                    .ok()
                    .and_then(reference::country_by_m49)
                    .map(|c| c.code.to_string())
            } else if is_country_code(&code) {
                Some(code)
            } else {
                None
            }
        }
        _ => None,
    })
}

fn country_name(code: &str, raw: &RawTradeRecord, keys: &[&str]) -> String {
    if let Some(known) = reference::country(code) {
        return known.name.to_string();
    }
    raw.first(keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| reference::country_name(code))
}

/// Blank means `TOTAL`; anything else must be digits or `TOTAL`.
fn hs_code(value: &Value) -> Result<String, AppError> {
    let code = match value {
        Value::String(s) if s.trim().is_empty() => return Ok(DEFAULT_HS_CODE.to_string()),
        Value::String(s) => s.trim().to_uppercase(),
        // A numeric code has lost its leading zero.
        Value::Number(_) => as_integer(value)
            .map(|n| format!("{n:02}"))
            .unwrap_or_default(),
        _ => String::new(),
    };
    if is_hs_code(&code) {
        Ok(code)
    } else {
        Err(invalid(format!("malformed HS code {value}")))
    }
}

/// Short identification of a raw row for log lines.
fn summarize(raw: &RawTradeRecord) -> String {
    let field = |keys: &[&str]| {
        raw.first(keys)
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "?".to_string())
    };
    format!(
        "{}/{}->{}/{}",
        field(YEAR_KEYS),
        field(REPORTER_CODE_KEYS),
        field(PARTNER_CODE_KEYS),
        field(HS_CODE_KEYS)
    )
}

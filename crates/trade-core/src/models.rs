use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Direction of a trade record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeFlow {
    Import,
    Export,
    #[serde(rename = "Re-Import")]
    ReImport,
    #[serde(rename = "Re-Export")]
    ReExport,
}

impl TradeFlow {
    pub const ALL: [TradeFlow; 4] = [
        TradeFlow::Import,
        TradeFlow::Export,
        TradeFlow::ReImport,
        TradeFlow::ReExport,
    ];

    /// Human-readable label, also the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeFlow::Import => "Import",
            TradeFlow::Export => "Export",
            TradeFlow::ReImport => "Re-Import",
            TradeFlow::ReExport => "Re-Export",
        }
    }

    /// Comtrade `flowCode` query value.
    pub fn code(&self) -> &'static str {
        match self {
            TradeFlow::Import => "M",
            TradeFlow::Export => "X",
            TradeFlow::ReImport => "RM",
            TradeFlow::ReExport => "RX",
        }
    }
}

impl fmt::Display for TradeFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradeFlow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "m" | "import" => Ok(TradeFlow::Import),
            "x" | "export" => Ok(TradeFlow::Export),
            "rm" | "re-import" | "reimport" | "re_import" => Ok(TradeFlow::ReImport),
            "rx" | "re-export" | "reexport" | "re_export" => Ok(TradeFlow::ReExport),
            _ => Err(format!("Unknown trade flow: {s}")),
        }
    }
}

/// A normalized trade statistic. Field order is also the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub year: i32,
    /// `None` for annual data.
    pub month: Option<u32>,
    pub reporter_code: String,
    pub reporter_name: String,
    pub partner_code: String,
    pub partner_name: String,
    pub trade_flow: TradeFlow,
    pub hs_code: String,
    pub hs_description: String,
    /// USD.
    pub trade_value: f64,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
}

impl TradeRecord {
    /// Check the record invariants against [`YearRange::default`].
    pub fn validate(&self) -> Result<(), AppError> {
        self.validate_within(&YearRange::default())
    }

    /// Check the record invariants with an explicit plausible year range.
    pub fn validate_within(&self, years: &YearRange) -> Result<(), AppError> {
        if !years.contains(self.year) {
            return Err(AppError::ValidationError(format!(
                "year {} outside {}-{}",
                self.year, years.min, years.max
            )));
        }
        if !self.trade_value.is_finite() || self.trade_value < 0.0 {
            return Err(AppError::ValidationError(format!(
                "trade_value must be a non-negative number, got {}",
                self.trade_value
            )));
        }
        if let Some(q) = self.quantity
            && (!q.is_finite() || q < 0.0)
        {
            return Err(AppError::ValidationError(format!(
                "quantity must be non-negative, got {q}"
            )));
        }
        if let Some(m) = self.month
            && !(1..=12).contains(&m)
        {
            return Err(AppError::ValidationError(format!(
                "month must be within 1-12, got {m}"
            )));
        }
        for (field, code) in [
            ("reporter_code", &self.reporter_code),
            ("partner_code", &self.partner_code),
        ] {
            if !is_country_code(code) {
                return Err(AppError::ValidationError(format!(
                    "{field} must be 3 uppercase alphanumerics, got '{code}'"
                )));
            }
        }
        if !is_hs_code(&self.hs_code) {
            return Err(AppError::ValidationError(format!(
                "hs_code must be digits or TOTAL, got '{}'",
                self.hs_code
            )));
        }
        Ok(())
    }

    /// Convert back into the untyped shape the normalizer accepts.
    pub fn to_raw(&self) -> RawTradeRecord {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => RawTradeRecord(map),
            _ => RawTradeRecord::default(),
        }
    }
}

/// An untyped record as returned by the API. Only the normalizer reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTradeRecord(pub serde_json::Map<String, serde_json::Value>);

impl RawTradeRecord {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// First non-null value among `keys`.
    pub fn first(&self, keys: &[&str]) -> Option<&serde_json::Value> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .find(|v| !v.is_null())
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for RawTradeRecord {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// Parameters of one live extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    pub reporter: String,
    /// `None` means all partners.
    pub partner: Option<String>,
    pub years: Vec<i32>,
    /// `None` means every flow.
    pub trade_flow: Option<TradeFlow>,
    /// Empty means `TOTAL`.
    pub hs_codes: Vec<String>,
}

impl FetchParams {
    pub fn new(reporter: impl Into<String>, years: Vec<i32>) -> Self {
        Self {
            reporter: reporter.into(),
            partner: None,
            years,
            trade_flow: None,
            hs_codes: Vec::new(),
        }
    }

    pub fn with_partner(mut self, partner: impl Into<String>) -> Self {
        self.partner = Some(partner.into());
        self
    }

    pub fn with_hs_codes(mut self, hs_codes: Vec<String>) -> Self {
        self.hs_codes = hs_codes;
        self
    }

    pub fn with_trade_flow(mut self, flow: TradeFlow) -> Self {
        self.trade_flow = Some(flow);
        self
    }
}

/// Inclusive range of plausible years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    /// Comtrade coverage starts in 1962.
    pub const EARLIEST: i32 = 1962;

    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// 1962 through next calendar year.
    pub fn up_to_current() -> Self {
        use chrono::Datelike;
        Self::new(Self::EARLIEST, chrono::Utc::now().year() + 1)
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self::up_to_current()
    }
}

/// What to do when an incoming row has the same key as a stored row.
///
/// The key is (year, month, reporter_code, partner_code, hs_code, trade_flow).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Always insert.
    #[default]
    Append,
    /// Delete stored rows with the same key, then insert.
    ///
    /// Keys are cleared once per batch, so every row of the batch is kept
    /// even when several share a key.
    Replace,
    /// Keep stored rows, drop the incoming one.
    ///
    /// Rows are checked in order against everything stored so far, including
    /// earlier rows of the same batch, so only the first of a repeated key
    /// is inserted.
    Skip,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::Append => "append",
            DuplicatePolicy::Replace => "replace",
            DuplicatePolicy::Skip => "skip",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "append" => Ok(DuplicatePolicy::Append),
            "replace" => Ok(DuplicatePolicy::Replace),
            "skip" => Ok(DuplicatePolicy::Skip),
            _ => Err(format!("Unknown duplicate policy: {s}")),
        }
    }
}

/// Result of a single `insert_batch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub inserted: u64,
    /// Stored rows removed because a new row took their key.
    pub replaced: u64,
    pub skipped: u64,
}

/// Optional equality filters over stored records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeFilter {
    pub year: Option<i32>,
    pub reporter_code: Option<String>,
    pub partner_code: Option<String>,
    pub trade_flow: Option<TradeFlow>,
    /// Matches hierarchically: "84" also selects "8471".
    pub hs_code: Option<String>,
}

impl TradeFilter {
    pub fn reporter(code: impl Into<String>) -> Self {
        Self {
            reporter_code: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &TradeFilter::default()
    }

    /// Fail fast on values that could never match a stored record.
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(year) = self.year
            && !YearRange::default().contains(year)
        {
            return Err(AppError::ValidationError(format!(
                "year filter out of range: {year}"
            )));
        }
        for (field, code) in [
            ("reporter_code", &self.reporter_code),
            ("partner_code", &self.partner_code),
        ] {
            if let Some(code) = code
                && !is_country_code(code)
            {
                return Err(AppError::ValidationError(format!(
                    "{field} must be 3 alphanumeric characters, got '{code}'"
                )));
            }
        }
        if let Some(hs) = &self.hs_code
            && !is_hs_code(hs)
        {
            return Err(AppError::ValidationError(format!(
                "hs_code must be digits or TOTAL, got '{hs}'"
            )));
        }
        Ok(())
    }
}

/// `USA`, `W00`, ...
pub fn is_country_code(code: &str) -> bool {
    code.len() == 3
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// `01`, `8471`, `TOTAL`.
pub fn is_hs_code(code: &str) -> bool {
    code == "TOTAL"
        || (!code.is_empty() && code.len() <= 10 && code.chars().all(|c| c.is_ascii_digit()))
}

/// Aggregates over the records matching a filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub record_count: i64,
    pub total_trade_value: f64,
    /// Union of reporter and partner codes.
    pub distinct_country_count: i64,
    pub distinct_hs_count: i64,
    pub unique_reporters: i64,
    pub unique_partners: i64,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

impl SummaryStats {
    /// "2020-2023", or "No data".
    pub fn year_range(&self) -> String {
        match (self.min_year, self.max_year) {
            (Some(min), Some(max)) => format!("{min}-{max}"),
            _ => "No data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderTotal {
    pub reporter_code: String,
    pub reporter_name: String,
    pub total_value: f64,
    pub record_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub year: i32,
    pub trade_flow: TradeFlow,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub code: String,
    pub name: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsCategory {
    pub code: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::record;

    #[test]
    fn test_trade_flow_parses_codes_and_labels() {
        assert_eq!("M".parse::<TradeFlow>().unwrap(), TradeFlow::Import);
        assert_eq!("x".parse::<TradeFlow>().unwrap(), TradeFlow::Export);
        assert_eq!("RM".parse::<TradeFlow>().unwrap(), TradeFlow::ReImport);
        assert_eq!("Re-Export".parse::<TradeFlow>().unwrap(), TradeFlow::ReExport);
        assert_eq!("re-import".parse::<TradeFlow>().unwrap(), TradeFlow::ReImport);
        assert!("Transit".parse::<TradeFlow>().is_err());
    }

    #[test]
    fn test_trade_flow_serializes_as_label() {
        let json = serde_json::to_string(&TradeFlow::ReExport).unwrap();
        assert_eq!(json, "\"Re-Export\"");
        for flow in TradeFlow::ALL {
            assert_eq!(flow.as_str().parse::<TradeFlow>().unwrap(), flow);
        }
    }

    #[test]
    fn test_validate_rejects_negative_value() {
        let mut r = record("USA", "DEU", 2023, "84");
        r.trade_value = -1.0;
        assert!(matches!(r.validate(), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_validate_rejects_bad_month() {
        let mut r = record("USA", "DEU", 2023, "84");
        r.month = Some(13);
        assert!(r.validate().is_err());
        r.month = None;
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_implausible_year() {
        let mut r = record("USA", "DEU", 1500, "84");
        assert!(matches!(r.validate(), Err(AppError::ValidationError(_))));
        r.year = YearRange::EARLIEST;
        assert!(r.validate().is_ok());
        assert!(r.validate_within(&YearRange::new(2000, 2010)).is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_codes() {
        let mut r = record("USA", "DEU", 2023, "84");
        r.reporter_code = "usa".into();
        assert!(r.validate().is_err());

        let mut r = record("USA", "DEU", 2023, "84");
        r.partner_code = "Germany".into();
        assert!(r.validate().is_err());

        let mut r = record("USA", "DEU", 2023, "84");
        r.hs_code = "-5".into();
        assert!(r.validate().is_err());
        r.hs_code = "TOTAL".into();
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_to_raw_uses_field_names() {
        let raw = record("USA", "DEU", 2023, "84").to_raw();
        assert_eq!(raw.get("reporter_code").unwrap(), "USA");
        assert_eq!(raw.get("trade_flow").unwrap(), "Import");
    }

    #[test]
    fn test_filter_validation() {
        assert!(TradeFilter::default().validate().is_ok());
        assert!(TradeFilter::reporter("DEU").validate().is_ok());
        assert!(TradeFilter::reporter("germany").validate().is_err());
        let f = TradeFilter {
            hs_code: Some("84; DROP".into()),
            ..Default::default()
        };
        assert!(f.validate().is_err());
        let f = TradeFilter {
            year: Some(20230),
            ..Default::default()
        };
        assert!(f.validate().is_err());
        let f = TradeFilter {
            year: Some(1500),
            ..Default::default()
        };
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_duplicate_policy_round_trip() {
        for p in [
            DuplicatePolicy::Append,
            DuplicatePolicy::Replace,
            DuplicatePolicy::Skip,
        ] {
            assert_eq!(p.as_str().parse::<DuplicatePolicy>().unwrap(), p);
        }
        assert_eq!(DuplicatePolicy::default(), DuplicatePolicy::Append);
    }

    #[test]
    fn test_summary_year_range() {
        let stats = SummaryStats::default();
        assert_eq!(stats.year_range(), "No data");
        let stats = SummaryStats {
            min_year: Some(2020),
            max_year: Some(2023),
            ..Default::default()
        };
        assert_eq!(stats.year_range(), "2020-2023");
    }
}

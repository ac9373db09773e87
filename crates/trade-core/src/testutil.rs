//! Test utilities: mock implementations of the core traits and record builders.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{
    BatchOutcome, DuplicatePolicy, FetchParams, RawTradeRecord, SummaryStats, TradeFilter,
    TradeFlow, TradeRecord,
};
use crate::reference;
use crate::traits::{TradeSource, TradeStore};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A valid annual import record with reference names filled in.
pub fn record(reporter: &str, partner: &str, year: i32, hs_code: &str) -> TradeRecord {
    TradeRecord {
        year,
        month: Some(6),
        reporter_code: reporter.to_string(),
        reporter_name: reference::country_name(reporter),
        partner_code: partner.to_string(),
        partner_name: reference::country_name(partner),
        trade_flow: TradeFlow::Import,
        hs_code: hs_code.to_string(),
        hs_description: reference::hs_description(hs_code).to_string(),
        trade_value: 1_000_000.0,
        quantity: Some(2_500.0),
        unit: Some("KG".to_string()),
    }
}

/// A row shaped like a Comtrade API `data` entry.
pub fn comtrade_row(reporter: &str, partner: &str, year: i32, value: f64) -> RawTradeRecord {
    let value = serde_json::json!({
        "period": year.to_string(),
        "reporterISO": reporter,
        "partnerISO": partner,
        "flowCode": "X",
        "cmdCode": "TOTAL",
        "primaryValue": value,
    });
    match value {
        serde_json::Value::Object(map) => RawTradeRecord(map),
        _ => RawTradeRecord::default(),
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Mock source that replays queued responses and records every call.
#[derive(Clone, Default)]
pub struct MockSource {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns no rows.
    responses: Arc<Mutex<Vec<Result<Vec<RawTradeRecord>, AppError>>>>,
    pub calls: Arc<Mutex<Vec<FetchParams>>>,
}

impl MockSource {
    pub fn new(rows: Vec<RawTradeRecord>) -> Self {
        Self::with_responses(vec![Ok(rows)])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<Vec<RawTradeRecord>, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl TradeSource for MockSource {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawTradeRecord>, AppError> {
        self.calls.lock().unwrap().push(params.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Vec::new())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store honouring duplicate policies and filters.
#[derive(Clone, Default)]
pub struct MockStore {
    pub records: Arc<Mutex<Vec<TradeRecord>>>,
    /// Policy of every `insert_batch` call, in order.
    pub policies: Arc<Mutex<Vec<DuplicatePolicy>>>,
    insert_error: Arc<Mutex<Option<AppError>>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The next `insert_batch` fails with `error`.
    pub fn with_insert_error(error: AppError) -> Self {
        let store = Self::default();
        *store.insert_error.lock().unwrap() = Some(error);
        store
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn same_key(a: &TradeRecord, b: &TradeRecord) -> bool {
    a.year == b.year
        && a.month == b.month
        && a.reporter_code == b.reporter_code
        && a.partner_code == b.partner_code
        && a.hs_code == b.hs_code
        && a.trade_flow == b.trade_flow
}

/// Filter semantics shared with the SQL store.
pub fn matches_filter(record: &TradeRecord, filter: &TradeFilter) -> bool {
    filter.year.is_none_or(|y| record.year == y)
        && filter
            .reporter_code
            .as_ref()
            .is_none_or(|c| &record.reporter_code == c)
        && filter
            .partner_code
            .as_ref()
            .is_none_or(|c| &record.partner_code == c)
        && filter.trade_flow.is_none_or(|f| record.trade_flow == f)
        && filter
            .hs_code
            .as_ref()
            .is_none_or(|c| record.hs_code.starts_with(c.as_str()))
}

impl TradeStore for MockStore {
    async fn insert_batch(
        &self,
        records: &[TradeRecord],
        policy: DuplicatePolicy,
    ) -> Result<BatchOutcome, AppError> {
        if let Some(e) = self.insert_error.lock().unwrap().take() {
            return Err(e);
        }
        for r in records {
            r.validate()?;
        }
        self.policies.lock().unwrap().push(policy);

        let mut stored = self.records.lock().unwrap();
        let mut outcome = BatchOutcome::default();
        if policy == DuplicatePolicy::Replace {
            let before = stored.len();
            stored.retain(|s| !records.iter().any(|r| same_key(s, r)));
            outcome.replaced = (before - stored.len()) as u64;
        }
        for r in records {
            if policy == DuplicatePolicy::Skip && stored.iter().any(|s| same_key(s, r)) {
                outcome.skipped += 1;
                continue;
            }
            stored.push(r.clone());
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn query(&self, filter: &TradeFilter) -> Result<Vec<TradeRecord>, AppError> {
        filter.validate()?;
        let mut rows: Vec<TradeRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.year, &a.reporter_code, &a.partner_code).cmp(&(
                b.year,
                &b.reporter_code,
                &b.partner_code,
            ))
        });
        Ok(rows)
    }

    async fn summary_stats(&self, filter: &TradeFilter) -> Result<SummaryStats, AppError> {
        use std::collections::HashSet;

        let rows = self.query(filter).await?;
        let reporters: HashSet<&str> = rows.iter().map(|r| r.reporter_code.as_str()).collect();
        let partners: HashSet<&str> = rows.iter().map(|r| r.partner_code.as_str()).collect();
        let hs: HashSet<&str> = rows.iter().map(|r| r.hs_code.as_str()).collect();

        Ok(SummaryStats {
            record_count: rows.len() as i64,
            total_trade_value: rows.iter().map(|r| r.trade_value).sum(),
            distinct_country_count: reporters.union(&partners).count() as i64,
            distinct_hs_count: hs.len() as i64,
            unique_reporters: reporters.len() as i64,
            unique_partners: partners.len() as i64,
            min_year: rows.iter().map(|r| r.year).min(),
            max_year: rows.iter().map(|r| r.year).max(),
        })
    }
}

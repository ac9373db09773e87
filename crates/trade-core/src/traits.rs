use std::future::Future;

use crate::error::AppError;
use crate::models::{
    BatchOutcome, DuplicatePolicy, FetchParams, RawTradeRecord, SummaryStats, TradeFilter,
    TradeRecord,
};

/// Fetches raw trade rows from a remote statistics API.
pub trait TradeSource: Send + Sync + Clone {
    /// Fetch every row matching `params`, chunking requests as needed.
    fn fetch(
        &self,
        params: &FetchParams,
    ) -> impl Future<Output = Result<Vec<RawTradeRecord>, AppError>> + Send;
}

/// Persists and queries normalized trade records.
pub trait TradeStore: Send + Sync + Clone {
    /// Insert all records in one transaction, or none on failure.
    fn insert_batch(
        &self,
        records: &[TradeRecord],
        policy: DuplicatePolicy,
    ) -> impl Future<Output = Result<BatchOutcome, AppError>> + Send;

    /// Records matching `filter`, ordered by year, reporter, partner.
    fn query(
        &self,
        filter: &TradeFilter,
    ) -> impl Future<Output = Result<Vec<TradeRecord>, AppError>> + Send;

    /// Aggregates over the records matching `filter`.
    fn summary_stats(
        &self,
        filter: &TradeFilter,
    ) -> impl Future<Output = Result<SummaryStats, AppError>> + Send;
}

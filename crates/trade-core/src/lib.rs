pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod rate_limit;
pub mod reference;
pub mod retry;
pub mod sample;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use error::AppError;
pub use models::{
    BatchOutcome, DuplicatePolicy, FetchParams, RawTradeRecord, SummaryStats, TradeFilter,
    TradeFlow, TradeRecord, YearRange,
};
pub use normalize::Normalizer;
pub use pipeline::{ExtractionPlan, ExtractionService, RunReport, SampleSettings};
pub use rate_limit::{ApiTier, RateLimitConfig, RateLimiter};
pub use retry::RetryPolicy;
pub use sample::SampleGenerator;
pub use traits::{TradeSource, TradeStore};

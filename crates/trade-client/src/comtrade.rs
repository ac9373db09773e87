use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use trade_core::error::AppError;
use trade_core::models::{FetchParams, RawTradeRecord};
use trade_core::rate_limit::{ApiTier, RateLimiter};
use trade_core::reference;
use trade_core::retry::RetryPolicy;
use trade_core::traits::TradeSource;
use url::Url;

pub const DEFAULT_DATA_URL: &str = "https://comtradeapi.un.org/data/v1/get/C/A/HS";
pub const DEFAULT_PREVIEW_URL: &str = "https://comtradeapi.un.org/public/v1/preview/C/A/HS";
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Connection settings for the UN Comtrade API.
#[derive(Debug, Clone)]
pub struct ComtradeConfig {
    /// Keyed endpoint, used when `api_key` is set.
    pub data_url: String,
    /// Public endpoint, used without a key.
    pub preview_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ComtradeConfig {
    fn default() -> Self {
        Self {
            data_url: DEFAULT_DATA_URL.to_string(),
            preview_url: DEFAULT_PREVIEW_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl ComtradeConfig {
    /// Read configuration from environment variables.
    ///
    /// - `COMTRADE_API_KEY` (optional, enables the premium tier)
    /// - `COMTRADE_DATA_URL` / `COMTRADE_PREVIEW_URL` (optional endpoint overrides)
    /// - `COMTRADE_TIMEOUT_SECS` (optional, defaults to 30)
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let api_key = std::env::var("COMTRADE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let timeout = match std::env::var("COMTRADE_TIMEOUT_SECS") {
            Err(_) => defaults.timeout,
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid COMTRADE_TIMEOUT_SECS '{raw}': must be a positive integer"
                    ))
                })?;
                if secs == 0 {
                    return Err(AppError::ConfigError(
                        "COMTRADE_TIMEOUT_SECS must be at least 1".into(),
                    ));
                }
                Duration::from_secs(secs)
            }
        };

        Ok(Self {
            data_url: std::env::var("COMTRADE_DATA_URL").unwrap_or(defaults.data_url),
            preview_url: std::env::var("COMTRADE_PREVIEW_URL").unwrap_or(defaults.preview_url),
            api_key,
            timeout,
            retry: defaults.retry,
        })
    }

    pub fn tier(&self) -> ApiTier {
        ApiTier::from_api_key(self.api_key.as_deref())
    }

    fn endpoint(&self) -> &str {
        match self.tier() {
            ApiTier::Premium => &self.data_url,
            ApiTier::Free => &self.preview_url,
        }
    }
}

/// Comtrade API client.
///
/// Issues one request per year of a [`FetchParams`], each gated by the
/// shared [`RateLimiter`] and retried on transient failures.
#[derive(Clone)]
pub struct ComtradeClient {
    client: Client,
    config: ComtradeConfig,
    limiter: RateLimiter,
}

impl ComtradeClient {
    /// Client with a limiter sized for the configured tier.
    pub fn new(config: ComtradeConfig) -> Result<Self, AppError> {
        let limiter = RateLimiter::for_tier(config.tier());
        Self::with_limiter(config, limiter)
    }

    pub fn with_limiter(config: ComtradeConfig, limiter: RateLimiter) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("tradewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    pub fn tier(&self) -> ApiTier {
        self.config.tier()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    fn request_url(&self, params: &FetchParams, year: i32) -> Result<Url, AppError> {
        let mut url = Url::parse(self.config.endpoint())
            .map_err(|e| AppError::ConfigError(format!("Invalid Comtrade URL: {e}")))?;

        let cmd_code = if params.hs_codes.is_empty() {
            "TOTAL".to_string()
        } else {
            params.hs_codes.join(",")
        };

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("reporterCode", &api_country_code(&params.reporter));
            if let Some(partner) = &params.partner {
                query.append_pair("partnerCode", &api_country_code(partner));
            }
            query.append_pair("period", &year.to_string());
            query.append_pair("cmdCode", &cmd_code);
            if let Some(flow) = params.trade_flow {
                query.append_pair("flowCode", flow.code());
            }
        }
        Ok(url)
    }

    async fn fetch_year(
        &self,
        params: &FetchParams,
        year: i32,
    ) -> Result<Vec<RawTradeRecord>, AppError> {
        let url = self.request_url(params, year)?;
        self.limiter.acquire().await;
        tracing::debug!(reporter = %params.reporter, year, "Requesting Comtrade data");

        let mut request = self.client.get(url);
        if let Some(key) = &self.config.api_key {
            request = request.header(SUBSCRIPTION_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::TransientNetworkError(format!(
                    "Request timed out after {}s",
                    self.config.timeout.as_secs()
                ))
            } else if e.is_connect() {
                AppError::TransientNetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::TransientNetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(map_status(status, retry_after));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::TransientNetworkError(format!("Failed to read response body: {e}")))?;

        let rows = parse_rows(&body)?;
        tracing::info!(reporter = %params.reporter, year, records = rows.len(), "Fetched Comtrade rows");
        Ok(rows)
    }
}

impl TradeSource for ComtradeClient {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawTradeRecord>, AppError> {
        let mut rows = Vec::new();
        for &year in &params.years {
            let chunk = self
                .config
                .retry
                .retry(|| self.fetch_year(params, year))
                .await?;
            rows.extend(chunk);
        }
        Ok(rows)
    }
}

/// M49 code for known ISO codes; anything else is passed through.
fn api_country_code(code: &str) -> String {
    match reference::country(code) {
        Some(c) => c.m49.to_string(),
        None => code.to_string(),
    }
}

fn map_status(status: StatusCode, retry_after: Option<Duration>) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::AuthError(format!("Comtrade rejected credentials (HTTP {})", status.as_u16()))
        }
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimitError { retry_after },
        s if s.is_server_error() => {
            AppError::TransientNetworkError(format!("Comtrade server error (HTTP {})", s.as_u16()))
        }
        s => AppError::MalformedResponseError(format!("Unexpected HTTP {}", s.as_u16())),
    }
}

/// Extract the `data` array of a Comtrade response.
fn parse_rows(body: &[u8]) -> Result<Vec<RawTradeRecord>, AppError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::MalformedResponseError(format!("Response is not JSON: {e}")))?;

    let data = match value.get("data") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => {
            return Err(AppError::MalformedResponseError(
                "Response has no 'data' array".into(),
            ));
        }
        Some(_) => {
            return Err(AppError::MalformedResponseError(
                "'data' is not an array".into(),
            ));
        }
    };

    data.iter()
        .map(|item| match item {
            Value::Object(map) => Ok(RawTradeRecord(map.clone())),
            _ => Err(AppError::MalformedResponseError(
                "'data' contains a non-object row".into(),
            )),
        })
        .collect()
}

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DuplicatePolicy, FetchParams, TradeFlow};
use crate::normalize::Normalizer;
use crate::reference;
use crate::sample::SampleGenerator;
use crate::traits::{TradeSource, TradeStore};

/// Which (reporter, year) shards a run pulls from the live API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub reporters: Vec<String>,
    /// `None` means all partners.
    pub partner: Option<String>,
    pub years: Vec<i32>,
    pub hs_codes: Vec<String>,
    pub trade_flow: Option<TradeFlow>,
}

impl ExtractionPlan {
    /// First three default reporters, 2022 and 2023, all commodities.
    pub fn full_default() -> Self {
        Self {
            reporters: to_owned(&reference::DEFAULT_COUNTRIES[..3]),
            partner: None,
            years: vec![2022, 2023],
            hs_codes: vec!["TOTAL".to_string()],
            trade_flow: None,
        }
    }

    /// First five default reporters over the two years before `current_year`.
    pub fn recent(current_year: i32) -> Self {
        Self {
            reporters: to_owned(&reference::DEFAULT_COUNTRIES[..5]),
            partner: None,
            years: vec![current_year - 2, current_year - 1],
            hs_codes: vec!["TOTAL".to_string()],
            trade_flow: None,
        }
    }

    /// One reporter, one year, optionally narrowed to a partner and HS code.
    pub fn specific(
        reporter: impl Into<String>,
        partner: Option<String>,
        year: i32,
        hs_code: Option<String>,
    ) -> Self {
        Self {
            reporters: vec![reporter.into()],
            partner,
            years: vec![year],
            hs_codes: vec![hs_code.unwrap_or_else(|| "TOTAL".to_string())],
            trade_flow: None,
        }
    }

    /// One fetch per (reporter, year), reporters outermost.
    pub fn shards(&self) -> Vec<FetchParams> {
        let mut shards = Vec::with_capacity(self.reporters.len() * self.years.len());
        for reporter in &self.reporters {
            for &year in &self.years {
                let mut params =
                    FetchParams::new(reporter.clone(), vec![year]).with_hs_codes(self.hs_codes.clone());
                if let Some(partner) = &self.partner {
                    params = params.with_partner(partner.clone());
                }
                if let Some(flow) = self.trade_flow {
                    params = params.with_trade_flow(flow);
                }
                shards.push(params);
            }
        }
        shards
    }
}

fn to_owned(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

/// Inputs of the synthetic fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSettings {
    pub countries: Vec<String>,
    pub years: Vec<i32>,
    pub hs_codes: Vec<String>,
    pub count: usize,
    /// Fixed seed for reproducible samples; random when `None`.
    pub seed: Option<u64>,
    /// Below this many live rows a run tops up with samples.
    pub min_live_records: u64,
    /// How sample rows treat stored rows with the same key.
    pub policy: DuplicatePolicy,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            countries: to_owned(reference::DEFAULT_COUNTRIES),
            years: reference::DEFAULT_YEARS.to_vec(),
            hs_codes: to_owned(reference::DEFAULT_HS_CODES),
            count: 500,
            seed: None,
            min_live_records: 100,
            policy: DuplicatePolicy::Append,
        }
    }
}

/// What one extraction run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub live_records: u64,
    pub sample_records: u64,
    /// Raw rows the normalizer rejected.
    pub dropped: usize,
    pub failed_shards: usize,
    /// Seed of the sample fallback, when it ran.
    pub sample_seed: Option<u64>,
    pub cancelled: bool,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            live_records: 0,
            sample_records: 0,
            dropped: 0,
            failed_shards: 0,
            sample_seed: None,
            cancelled: false,
        }
    }

    pub fn total_records(&self) -> u64 {
        self.live_records + self.sample_records
    }
}

/// Orchestrates a run: fetch → normalize → store, then top up with samples.
///
/// Generic over the source and store so runs can be tested without
/// network or database.
pub struct ExtractionService<S, T>
where
    S: TradeSource,
    T: TradeStore,
{
    source: S,
    store: T,
    normalizer: Normalizer,
    samples: SampleSettings,
}

impl<S, T> ExtractionService<S, T>
where
    S: TradeSource,
    T: TradeStore,
{
    pub fn new(source: S, store: T, normalizer: Normalizer, samples: SampleSettings) -> Self {
        Self {
            source,
            store,
            normalizer,
            samples,
        }
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Execute `plan` shard by shard.
    ///
    /// Each shard is committed on its own, replacing previously stored rows
    /// with the same key. Source failures are logged and counted; auth and
    /// rate-limit failures end live extraction early. Storage failures abort
    /// the run. Cancellation is honoured between shards and while waiting on
    /// the source, never in the middle of a write.
    pub async fn run(
        &self,
        plan: &ExtractionPlan,
        cancel: &CancellationToken,
    ) -> Result<RunReport, AppError> {
        let mut report = RunReport::new();
        let run_id = report.run_id;
        let shards = plan.shards();
        tracing::info!(%run_id, shards = shards.len(), "Starting extraction run");

        for params in &shards {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let fetched = tokio::select! {
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                res = self.source.fetch(params) => res,
            };

            let raws = match fetched {
                Ok(raws) => raws,
                Err(e) if e.should_fall_back() => {
                    report.failed_shards += 1;
                    tracing::warn!(
                        %run_id,
                        reporter = %params.reporter,
                        years = ?params.years,
                        error = %e,
                        "Live extraction failed for shard"
                    );
                    if e.stops_live_extraction() {
                        tracing::warn!(%run_id, "Skipping remaining shards");
                        break;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            let batch = self.normalizer.normalize_batch(&raws);
            report.dropped += batch.dropped;
            if batch.records.is_empty() {
                tracing::info!(%run_id, reporter = %params.reporter, "Shard returned no usable rows");
                continue;
            }

            let outcome = self
                .store
                .insert_batch(&batch.records, DuplicatePolicy::Replace)
                .await?;
            report.live_records += outcome.inserted;
            tracing::info!(
                %run_id,
                reporter = %params.reporter,
                years = ?params.years,
                inserted = outcome.inserted,
                replaced = outcome.replaced,
                "Stored shard"
            );
        }

        if report.cancelled {
            tracing::warn!(%run_id, live = report.live_records, "Extraction run cancelled");
            return Ok(report);
        }

        if report.live_records < self.samples.min_live_records {
            tracing::info!(
                %run_id,
                live = report.live_records,
                threshold = self.samples.min_live_records,
                "Insufficient live data, generating samples"
            );
            let (inserted, seed) = self.insert_samples().await?;
            report.sample_records = inserted;
            report.sample_seed = Some(seed);
        }

        tracing::info!(
            %run_id,
            live = report.live_records,
            samples = report.sample_records,
            dropped = report.dropped,
            failed_shards = report.failed_shards,
            "Extraction run complete"
        );
        Ok(report)
    }

    /// Generate and store a sample batch without touching the source.
    pub async fn generate_sample(&self) -> Result<RunReport, AppError> {
        let mut report = RunReport::new();
        let (inserted, seed) = self.insert_samples().await?;
        report.sample_records = inserted;
        report.sample_seed = Some(seed);
        tracing::info!(run_id = %report.run_id, inserted, seed, "Stored sample records");
        Ok(report)
    }

    async fn insert_samples(&self) -> Result<(u64, u64), AppError> {
        let generator = self
            .samples
            .seed
            .map(SampleGenerator::new)
            .unwrap_or_else(SampleGenerator::from_entropy);
        let records = generator.generate(
            &self.samples.countries,
            &self.samples.years,
            &self.samples.hs_codes,
            self.samples.count,
        )?;
        let outcome = self
            .store
            .insert_batch(&records, self.samples.policy)
            .await?;
        Ok((outcome.inserted, generator.seed()))
    }
}

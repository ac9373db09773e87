//! Synthetic trade rows for when live data is unavailable.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::error::AppError;
use crate::models::{TradeFlow, TradeRecord, YearRange, is_country_code, is_hs_code};
use crate::reference;

const MIN_TRADE_VALUE: f64 = 1_000_000.0;
const MAX_TRADE_VALUE: f64 = 1_000_000_000.0;
const MIN_QUANTITY: f64 = 1_000.0;
const MAX_QUANTITY: f64 = 100_000.0;
const QUANTITY_PROBABILITY: f64 = 0.9;
const SAMPLE_UNIT: &str = "KG";

/// Seeded generator of schema-valid sample records.
///
/// The same seed and inputs always produce the same rows.
#[derive(Debug, Clone)]
pub struct SampleGenerator {
    seed: u64,
}

impl SampleGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Generator with a random seed.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Produce `count` rows drawn from the given countries, years and HS codes.
    ///
    /// Needs at least two distinct countries so reporter and partner differ.
    /// Codes are trimmed and uppercased; malformed codes and years outside
    /// [`YearRange::default`] are rejected.
    pub fn generate<C, H>(
        &self,
        countries: &[C],
        years: &[i32],
        hs_codes: &[H],
        count: usize,
    ) -> Result<Vec<TradeRecord>, AppError>
    where
        C: AsRef<str>,
        H: AsRef<str>,
    {
        let mut countries = canonical_codes(countries, is_country_code, "country")?;
        countries.sort_unstable();
        countries.dedup();
        if countries.len() < 2 {
            return Err(AppError::ValidationError(
                "sample generation needs at least two distinct countries".into(),
            ));
        }
        if years.is_empty() {
            return Err(AppError::ValidationError(
                "sample generation needs at least one year".into(),
            ));
        }
        let plausible = YearRange::default();
        if let Some(year) = years.iter().find(|y| !plausible.contains(**y)) {
            return Err(AppError::ValidationError(format!(
                "sample year {year} outside {}-{}",
                plausible.min, plausible.max
            )));
        }
        let hs_codes = canonical_codes(hs_codes, is_hs_code, "HS")?;
        if hs_codes.is_empty() {
            return Err(AppError::ValidationError(
                "sample generation needs at least one HS code".into(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let (ln_min, ln_max) = (MIN_TRADE_VALUE.ln(), MAX_TRADE_VALUE.ln());
        let mut records = Vec::with_capacity(count);

        for _ in 0..count {
            let reporter = pick(&countries, &mut rng).as_str();
            let partners: Vec<&str> = countries
                .iter()
                .map(String::as_str)
                .filter(|c| *c != reporter)
                .collect();
            let partner = *pick(&partners, &mut rng);
            let hs_code = pick(&hs_codes, &mut rng).as_str();
            let year = *pick(years, &mut rng);
            let trade_flow = *pick(&TradeFlow::ALL, &mut rng);

            let trade_value = round_cents(rng.random_range(ln_min..ln_max).exp());
            let quantity = rng
                .random_bool(QUANTITY_PROBABILITY)
                .then(|| round_cents(rng.random_range(MIN_QUANTITY..MAX_QUANTITY)));

            records.push(TradeRecord {
                year,
                month: Some(rng.random_range(1..=12)),
                reporter_code: reporter.to_string(),
                reporter_name: reference::country_name(reporter),
                partner_code: partner.to_string(),
                partner_name: reference::country_name(partner),
                trade_flow,
                hs_code: hs_code.to_string(),
                hs_description: reference::hs_description(hs_code).to_string(),
                trade_value,
                unit: quantity.map(|_| SAMPLE_UNIT.to_string()),
                quantity,
            });
        }

        tracing::debug!(count, seed = self.seed, "Generated sample records");
        Ok(records)
    }
}

fn canonical_codes<T: AsRef<str>>(
    codes: &[T],
    is_valid: fn(&str) -> bool,
    kind: &str,
) -> Result<Vec<String>, AppError> {
    codes
        .iter()
        .map(|code| {
            let canonical = code.as_ref().trim().to_uppercase();
            if is_valid(&canonical) {
                Ok(canonical)
            } else {
                Err(AppError::ValidationError(format!(
                    "invalid {kind} code for sample generation: '{}'",
                    code.as_ref()
                )))
            }
        })
        .collect()
}

fn pick<'a, T>(items: &'a [T], rng: &mut StdRng) -> &'a T {
    // Callers check non-emptiness up front.
    items.choose(rng).unwrap_or_else(|| &items[0])
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

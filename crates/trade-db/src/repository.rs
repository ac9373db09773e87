use std::collections::HashSet;

use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use trade_core::error::AppError;
use trade_core::models::{
    BatchOutcome, Country, DuplicatePolicy, HsCategory, SummaryStats, TradeFilter, TradeFlow,
    TradeRecord, TraderTotal, TrendPoint,
};
use trade_core::reference;

const RECORD_COLUMNS: &str = "year, month, reporter_code, reporter_name, partner_code, \
     partner_name, trade_flow, hs_code, hs_description, trade_value, quantity, unit";

/// Repository for trade record persistence in SQLite.
#[derive(Clone)]
pub struct TradeRepository {
    pool: SqlitePool,
}

type DedupKey<'a> = (i32, Option<u32>, &'a str, &'a str, &'a str, TradeFlow);

fn dedup_key(r: &TradeRecord) -> DedupKey<'_> {
    (
        r.year,
        r.month,
        r.reporter_code.as_str(),
        r.partner_code.as_str(),
        r.hs_code.as_str(),
        r.trade_flow,
    )
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::StorageError(e.to_string())
}

impl TradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a batch in one transaction.
    ///
    /// Every record is validated before anything is written. With
    /// [`DuplicatePolicy::Replace`] stored rows sharing a key with the batch
    /// are deleted first; with [`DuplicatePolicy::Skip`] incoming rows whose
    /// key is already stored, or appeared earlier in the batch, are dropped.
    pub async fn insert_batch(
        &self,
        records: &[TradeRecord],
        policy: DuplicatePolicy,
    ) -> Result<BatchOutcome, AppError> {
        for record in records {
            record.validate()?;
        }

        let mut outcome = BatchOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        if policy == DuplicatePolicy::Replace {
            let mut seen = HashSet::new();
            for record in records {
                if seen.insert(dedup_key(record)) {
                    outcome.replaced += delete_key(&mut tx, record).await?;
                }
            }
        }

        for record in records {
            if policy == DuplicatePolicy::Skip && key_exists(&mut tx, record).await? {
                outcome.skipped += 1;
                continue;
            }
            insert_one(&mut tx, record).await?;
            outcome.inserted += 1;
        }

        tx.commit().await.map_err(db_err)?;

        tracing::debug!(
            policy = %policy,
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            skipped = outcome.skipped,
            "Committed trade batch"
        );
        Ok(outcome)
    }

    /// Records matching `filter`, ordered by year, reporter, partner.
    pub async fn query(&self, filter: &TradeFilter) -> Result<Vec<TradeRecord>, AppError> {
        self.query_limited(filter, None).await
    }

    /// Like [`query`](Self::query), returning at most `limit` rows.
    pub async fn query_limited(
        &self,
        filter: &TradeFilter,
        limit: Option<u32>,
    ) -> Result<Vec<TradeRecord>, AppError> {
        filter.validate()?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {RECORD_COLUMNS} FROM trade_data"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY year, reporter_code, partner_code, hs_code, trade_flow, id");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows: Vec<TradeRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Aggregates over the records matching `filter`, computed in SQL.
    pub async fn summary_stats(&self, filter: &TradeFilter) -> Result<SummaryStats, AppError> {
        filter.validate()?;

        let mut qb = QueryBuilder::<Sqlite>::new("WITH filtered AS (SELECT * FROM trade_data");
        push_filter(&mut qb, filter);
        qb.push(
            r#")
            SELECT
                COUNT(*) AS record_count,
                TOTAL(trade_value) AS total_trade_value,
                (SELECT COUNT(*) FROM (
                    SELECT reporter_code FROM filtered
                    UNION
                    SELECT partner_code FROM filtered
                )) AS distinct_country_count,
                COUNT(DISTINCT hs_code) AS distinct_hs_count,
                COUNT(DISTINCT reporter_code) AS unique_reporters,
                COUNT(DISTINCT partner_code) AS unique_partners,
                MIN(year) AS min_year,
                MAX(year) AS max_year
            FROM filtered"#,
        );

        let row: SummaryRow = qb
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.into())
    }

    /// Reporters ranked by total trade value, optionally for one flow.
    pub async fn top_traders(
        &self,
        flow: Option<TradeFlow>,
        limit: u32,
    ) -> Result<Vec<TraderTotal>, AppError> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT reporter_code, MAX(reporter_name) AS reporter_name, \
             TOTAL(trade_value) AS total_value, COUNT(*) AS record_count FROM trade_data",
        );
        if let Some(flow) = flow {
            qb.push(" WHERE trade_flow = ").push_bind(flow.as_str());
        }
        qb.push(" GROUP BY reporter_code ORDER BY total_value DESC, reporter_code LIMIT ")
            .push_bind(i64::from(limit));

        let rows: Vec<TraderRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Total value per (year, flow), optionally for one reporter.
    pub async fn trade_trends(
        &self,
        country_code: Option<&str>,
    ) -> Result<Vec<TrendPoint>, AppError> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT year, trade_flow, TOTAL(trade_value) AS total_value FROM trade_data",
        );
        if let Some(code) = country_code {
            qb.push(" WHERE reporter_code = ").push_bind(code.to_string());
        }
        qb.push(" GROUP BY year, trade_flow ORDER BY year, trade_flow");

        let rows: Vec<TrendRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Upsert the static country and HS tables.
    pub async fn sync_reference_data(&self) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for c in reference::COUNTRIES {
            sqlx::query("INSERT OR REPLACE INTO countries (code, name, region) VALUES (?, ?, ?)")
                .bind(c.code)
                .bind(c.name)
                .bind(c.region)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        for (code, description) in reference::HS_CATEGORIES {
            sqlx::query("INSERT OR REPLACE INTO hs_codes (code, description) VALUES (?, ?)")
                .bind(*code)
                .bind(*description)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    pub async fn countries(&self) -> Result<Vec<Country>, AppError> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT code, name, region FROM countries ORDER BY code")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(code, name, region)| Country { code, name, region })
            .collect())
    }

    pub async fn hs_codes(&self) -> Result<Vec<HsCategory>, AppError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT code, description FROM hs_codes ORDER BY code")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(code, description)| HsCategory { code, description })
            .collect())
    }

    /// Delete records stored more than `days` days ago. Returns the count.
    pub async fn cleanup_old_data(&self, days: u32) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM trade_data WHERE created_at < datetime('now', ?)")
            .bind(format!("-{days} days"))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        let deleted = result.rows_affected();
        tracing::info!(days, deleted, "Cleaned up old trade records");
        Ok(deleted)
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

// -- Statement helpers --

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &TradeFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(year) = filter.year {
        qb.push(" AND year = ").push_bind(year);
    }
    if let Some(code) = &filter.reporter_code {
        qb.push(" AND reporter_code = ").push_bind(code.clone());
    }
    if let Some(code) = &filter.partner_code {
        qb.push(" AND partner_code = ").push_bind(code.clone());
    }
    if let Some(flow) = filter.trade_flow {
        qb.push(" AND trade_flow = ").push_bind(flow.as_str());
    }
    if let Some(hs) = &filter.hs_code {
        // Validated as digits or TOTAL, so no LIKE wildcards can sneak in.
        qb.push(" AND hs_code LIKE ").push_bind(format!("{hs}%"));
    }
}

const KEY_PREDICATE: &str = "year = ? AND month IS ? AND reporter_code = ? \
     AND partner_code = ? AND hs_code = ? AND trade_flow = ?";

async fn delete_key(tx: &mut Transaction<'_, Sqlite>, r: &TradeRecord) -> Result<u64, AppError> {
    let result = sqlx::query(&format!("DELETE FROM trade_data WHERE {KEY_PREDICATE}"))
        .bind(r.year)
        .bind(r.month.map(i64::from))
        .bind(&r.reporter_code)
        .bind(&r.partner_code)
        .bind(&r.hs_code)
        .bind(r.trade_flow.as_str())
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    Ok(result.rows_affected())
}

async fn key_exists(tx: &mut Transaction<'_, Sqlite>, r: &TradeRecord) -> Result<bool, AppError> {
    let found: Option<i64> =
        sqlx::query_scalar(&format!("SELECT 1 FROM trade_data WHERE {KEY_PREDICATE} LIMIT 1"))
            .bind(r.year)
            .bind(r.month.map(i64::from))
            .bind(&r.reporter_code)
            .bind(&r.partner_code)
            .bind(&r.hs_code)
            .bind(r.trade_flow.as_str())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?;
    Ok(found.is_some())
}

async fn insert_one(tx: &mut Transaction<'_, Sqlite>, r: &TradeRecord) -> Result<(), AppError> {
    sqlx::query(&format!(
        "INSERT INTO trade_data ({RECORD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(r.year)
    .bind(r.month.map(i64::from))
    .bind(&r.reporter_code)
    .bind(&r.reporter_name)
    .bind(&r.partner_code)
    .bind(&r.partner_name)
    .bind(r.trade_flow.as_str())
    .bind(&r.hs_code)
    .bind(&r.hs_description)
    .bind(r.trade_value)
    .bind(r.quantity)
    .bind(&r.unit)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct TradeRow {
    year: i64,
    month: Option<i64>,
    reporter_code: String,
    reporter_name: String,
    partner_code: String,
    partner_name: String,
    trade_flow: String,
    hs_code: String,
    hs_description: String,
    trade_value: f64,
    quantity: Option<f64>,
    unit: Option<String>,
}

fn parse_flow(raw: &str) -> Result<TradeFlow, AppError> {
    raw.parse()
        .map_err(|e: String| AppError::StorageError(format!("Corrupt trade_flow column: {e}")))
}

impl TryFrom<TradeRow> for TradeRecord {
    type Error = AppError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        Ok(TradeRecord {
            year: row.year as i32,
            month: row.month.map(|m| m as u32),
            reporter_code: row.reporter_code,
            reporter_name: row.reporter_name,
            partner_code: row.partner_code,
            partner_name: row.partner_name,
            trade_flow: parse_flow(&row.trade_flow)?,
            hs_code: row.hs_code,
            hs_description: row.hs_description,
            trade_value: row.trade_value,
            quantity: row.quantity,
            unit: row.unit,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    record_count: i64,
    total_trade_value: f64,
    distinct_country_count: i64,
    distinct_hs_count: i64,
    unique_reporters: i64,
    unique_partners: i64,
    min_year: Option<i64>,
    max_year: Option<i64>,
}

impl From<SummaryRow> for SummaryStats {
    fn from(row: SummaryRow) -> Self {
        SummaryStats {
            record_count: row.record_count,
            total_trade_value: row.total_trade_value,
            distinct_country_count: row.distinct_country_count,
            distinct_hs_count: row.distinct_hs_count,
            unique_reporters: row.unique_reporters,
            unique_partners: row.unique_partners,
            min_year: row.min_year.map(|y| y as i32),
            max_year: row.max_year.map(|y| y as i32),
        }
    }
}

#[derive(sqlx::FromRow)]
struct TraderRow {
    reporter_code: String,
    reporter_name: String,
    total_value: f64,
    record_count: i64,
}

impl From<TraderRow> for TraderTotal {
    fn from(row: TraderRow) -> Self {
        TraderTotal {
            reporter_code: row.reporter_code,
            reporter_name: row.reporter_name,
            total_value: row.total_value,
            record_count: row.record_count,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TrendRow {
    year: i64,
    trade_flow: String,
    total_value: f64,
}

impl TryFrom<TrendRow> for TrendPoint {
    type Error = AppError;

    fn try_from(row: TrendRow) -> Result<Self, Self::Error> {
        Ok(TrendPoint {
            year: row.year as i32,
            trade_flow: parse_flow(&row.trade_flow)?,
            total_value: row.total_value,
        })
    }
}

// -- Trait implementation --

impl trade_core::traits::TradeStore for TradeRepository {
    async fn insert_batch(
        &self,
        records: &[TradeRecord],
        policy: DuplicatePolicy,
    ) -> Result<BatchOutcome, AppError> {
        TradeRepository::insert_batch(self, records, policy).await
    }

    async fn query(&self, filter: &TradeFilter) -> Result<Vec<TradeRecord>, AppError> {
        TradeRepository::query(self, filter).await
    }

    async fn summary_stats(&self, filter: &TradeFilter) -> Result<SummaryStats, AppError> {
        TradeRepository::summary_stats(self, filter).await
    }
}

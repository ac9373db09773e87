use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use trade_core::AppError;

use crate::config::DatabaseConfig;
use crate::repository::TradeRepository;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema statements, executed one at a time. All are idempotent.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS trade_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        year INTEGER NOT NULL,
        month INTEGER,
        reporter_code TEXT NOT NULL,
        reporter_name TEXT NOT NULL,
        partner_code TEXT NOT NULL,
        partner_name TEXT NOT NULL,
        trade_flow TEXT NOT NULL,
        hs_code TEXT NOT NULL,
        hs_description TEXT NOT NULL,
        trade_value REAL NOT NULL CHECK (trade_value >= 0),
        quantity REAL,
        unit TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS countries (
        code TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        region TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS hs_codes (
        code TEXT PRIMARY KEY,
        description TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_trade_year ON trade_data(year)",
    "CREATE INDEX IF NOT EXISTS idx_trade_reporter ON trade_data(reporter_code)",
    "CREATE INDEX IF NOT EXISTS idx_trade_partner ON trade_data(partner_code)",
    "CREATE INDEX IF NOT EXISTS idx_trade_hs_code ON trade_data(hs_code)",
    "CREATE INDEX IF NOT EXISTS idx_trade_flow ON trade_data(trade_flow)",
    r#"CREATE INDEX IF NOT EXISTS idx_trade_year_reporter_partner
        ON trade_data(year, reporter_code, partner_code)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_trade_dedup_key
        ON trade_data(year, reporter_code, partner_code, hs_code, trade_flow, month)"#,
    "CREATE INDEX IF NOT EXISTS idx_trade_created_at ON trade_data(created_at)",
];

/// Central database facade: owns the connection pool, creates the schema,
/// and vends repository instances.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the SQLite database described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        if config.is_in_memory() {
            return Self::in_memory().await;
        }

        if let Some(parent) = Path::new(&config.url).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::StorageError(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.url)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to connect: {e}")))?;

        tracing::debug!(path = %config.url, "Opened SQLite database");
        Ok(Self { pool })
    }

    /// A private in-memory database.
    ///
    /// Uses a single connection that is never recycled, since each SQLite
    /// memory connection is its own database.
    pub async fn in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::StorageError(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::StorageError(format!("Failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing, then sync reference data.
    pub async fn initialize(&self) -> Result<(), AppError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::StorageError(format!("Schema setup failed: {e}")))?;
        }
        self.trade_repo().sync_reference_data().await?;
        tracing::info!("Database initialized");
        Ok(())
    }

    /// Get a [`TradeRepository`] backed by this pool.
    pub fn trade_repo(&self) -> TradeRepository {
        TradeRepository::new(self.pool.clone())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

use trade_core::AppError;
use trade_core::models::DuplicatePolicy;

/// Path that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

pub const DEFAULT_DATABASE_PATH: &str = "data/trade_data.db";

/// Configuration for the SQLite connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path, or [`IN_MEMORY`].
    pub url: String,
    pub max_connections: u32,
    /// Policy used for manual imports and sample runs.
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_PATH.to_string(),
            max_connections: 5,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl DatabaseConfig {
    /// Read configuration from environment variables.
    ///
    /// - `DATABASE_PATH` (optional, defaults to `data/trade_data.db`)
    /// - `DATABASE_MAX_CONNECTIONS` (optional, defaults to 5)
    /// - `DUPLICATE_POLICY` (optional, `append` | `replace` | `skip`)
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let url = std::env::var("DATABASE_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(defaults.url);

        let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Err(_) => defaults.max_connections,
            Ok(raw) => {
                let parsed: u32 = raw.parse().map_err(|_| {
                    AppError::ConfigError(format!(
                        "Invalid DATABASE_MAX_CONNECTIONS '{raw}': must be a positive integer"
                    ))
                })?;
                if parsed == 0 {
                    return Err(AppError::ConfigError(
                        "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
                    ));
                }
                parsed
            }
        };

        let duplicate_policy = match std::env::var("DUPLICATE_POLICY") {
            Err(_) => defaults.duplicate_policy,
            Ok(raw) => raw.parse().map_err(AppError::ConfigError)?,
        };

        Ok(Self {
            url,
            max_connections,
            duplicate_policy,
        })
    }

    /// A private database that lives as long as the pool.
    pub fn in_memory() -> Self {
        Self {
            url: IN_MEMORY.to_string(),
            max_connections: 1,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url == IN_MEMORY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory() {
        let cfg = DatabaseConfig::in_memory();
        assert!(cfg.is_in_memory());
        assert_eq!(cfg.max_connections, 1);
        assert!(!DatabaseConfig::default().is_in_memory());
    }
}

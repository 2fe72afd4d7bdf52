use std::env;

use serde::Deserialize;
use syncline_common::error::{SynclineError, SynclineResult};

/// Runtime configuration for the crawler, loaded from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub mcp_base_url: String,
    pub page_size: usize,
    pub max_items: Option<usize>,
    pub include_archived: bool,
    pub page_delay_ms: u64,
    pub record_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> SynclineResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            mcp_base_url: get_var_or("MCP_BASE_URL", "http://localhost:9000"),
            page_size: parse_var_or("CRAWL_PAGE_SIZE", 50)?,
            max_items: match env::var("CRAWL_MAX_ITEMS").ok() {
                Some(v) => Some(v.parse().map_err(|e| {
                    SynclineError::Config(format!("invalid CRAWL_MAX_ITEMS: {e}"))
                })?),
                None => None,
            },
            include_archived: env::var("CRAWL_INCLUDE_ARCHIVED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            page_delay_ms: parse_var_or("CRAWL_PAGE_DELAY_MS", 1000)?,
            record_delay_ms: parse_var_or("CRAWL_RECORD_DELAY_MS", 200)?,
            request_timeout_secs: parse_var_or("MCP_TIMEOUT_SECS", 30)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }
}

fn get_var(key: &str) -> SynclineResult<String> {
    env::var(key).map_err(|_| SynclineError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_var_or<T: std::str::FromStr>(key: &str, default: T) -> SynclineResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key).ok() {
        Some(v) => v
            .parse()
            .map_err(|e| SynclineError::Config(format!("invalid {key}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn config_from_env_succeeds_with_required_vars() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/syncline_test");
        env::remove_var("CRAWL_PAGE_SIZE");
        env::remove_var("CRAWL_MAX_ITEMS");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.database_url, "postgres://localhost/syncline_test");
        assert_eq!(cfg.page_size, 50);
        assert!(cfg.max_items.is_none());
        assert!(!cfg.include_archived);
        assert_eq!(cfg.page_delay_ms, 1000);
        assert_eq!(cfg.log_level, "info");

        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_from_env_fails_without_database_url() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::remove_var("DATABASE_URL");
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn config_parses_numeric_overrides() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/syncline_test");
        env::set_var("CRAWL_PAGE_SIZE", "25");
        env::set_var("CRAWL_MAX_ITEMS", "500");
        env::set_var("CRAWL_INCLUDE_ARCHIVED", "true");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.page_size, 25);
        assert_eq!(cfg.max_items, Some(500));
        assert!(cfg.include_archived);

        env::remove_var("DATABASE_URL");
        env::remove_var("CRAWL_PAGE_SIZE");
        env::remove_var("CRAWL_MAX_ITEMS");
        env::remove_var("CRAWL_INCLUDE_ARCHIVED");
    }

    #[test]
    fn config_rejects_invalid_page_size() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/syncline_test");
        env::set_var("CRAWL_PAGE_SIZE", "not-a-number");

        let result = AppConfig::from_env();
        assert!(result.is_err());

        env::remove_var("DATABASE_URL");
        env::remove_var("CRAWL_PAGE_SIZE");
    }
}

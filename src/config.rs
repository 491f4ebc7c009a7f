//! Configuration management for the index synchronization server.
//!
//! This module handles loading and validating configuration from environment variables.
//! The `.env` file is loaded through `dotenvy`, which never writes to stdout (MCP uses
//! stdout for protocol traffic).

use crate::error::{ConfigError, ConfigResult};
use chrono::{Local, Offset};
use std::env;

/// Configuration for the index synchronization server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Search engine base URL; `None` selects the in-memory engine
    pub search_engine_url: Option<String>,

    /// Search engine API key, sent as `Authorization: ApiKey <key>`
    pub search_engine_api_key: Option<String>,

    /// HTTP request timeout in seconds (default: 10)
    pub request_timeout: u64,

    /// Concurrent entries per reconciler pass (default: 4)
    pub reconciler_workers: usize,

    /// Maximum entries handled by one periodic pass (default: 500)
    pub reconciler_batch_size: usize,

    /// Period of the background pass in milliseconds (default: 2000)
    pub reconciler_interval_ms: u64,

    /// Capacity of the notification channel (default: 1024)
    pub reconciler_queue_capacity: usize,

    pub default_page_size: usize,

    pub max_page_size: usize,

    /// Upper bound on documents fetched from the engine per search (default: 10000)
    pub max_search_candidates: usize,

    /// Offset stored in the `*TimeZone` fields, in [-12, 12]
    pub timezone_offset_hours: i32,

    /// Log level (default: "error")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `SEARCH_ENGINE_URL`: Elasticsearch-compatible base URL
    /// - `SEARCH_ENGINE_API_KEY`: API key for the search engine
    /// - `REQUEST_TIMEOUT`: HTTP timeout in seconds (default: 10)
    /// - `RECONCILER_WORKERS`, `RECONCILER_BATCH_SIZE`, `RECONCILER_INTERVAL_MS`,
    ///   `RECONCILER_QUEUE_CAPACITY`: background indexing tuning
    /// - `DEFAULT_PAGE_SIZE` / `MAX_PAGE_SIZE`: search pagination (default: 20 / 100)
    /// - `MAX_SEARCH_CANDIDATES`: candidate cap per search (default: 10000)
    /// - `TIMEZONE_OFFSET_HOURS`: defaults to the host's UTC offset
    /// - `LOG_LEVEL`: Logging level (default: "error")
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();

        let search_engine_url = Self::optional_var("SEARCH_ENGINE_URL");
        if let Some(url) = &search_engine_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    var: "SEARCH_ENGINE_URL".to_string(),
                    reason: "Must start with http:// or https://".to_string(),
                });
            }
        }
        let search_engine_api_key = Self::optional_var("SEARCH_ENGINE_API_KEY");

        let defaults = Config::default();
        let request_timeout = Self::parse_env_u64("REQUEST_TIMEOUT", defaults.request_timeout)?;
        let reconciler_workers =
            Self::parse_env_usize("RECONCILER_WORKERS", defaults.reconciler_workers)?;
        let reconciler_batch_size =
            Self::parse_env_usize("RECONCILER_BATCH_SIZE", defaults.reconciler_batch_size)?;
        let reconciler_interval_ms =
            Self::parse_env_u64("RECONCILER_INTERVAL_MS", defaults.reconciler_interval_ms)?;
        let reconciler_queue_capacity = Self::parse_env_usize(
            "RECONCILER_QUEUE_CAPACITY",
            defaults.reconciler_queue_capacity,
        )?;
        let default_page_size =
            Self::parse_env_usize("DEFAULT_PAGE_SIZE", defaults.default_page_size)?;
        let max_page_size = Self::parse_env_usize("MAX_PAGE_SIZE", defaults.max_page_size)?;
        let max_search_candidates =
            Self::parse_env_usize("MAX_SEARCH_CANDIDATES", defaults.max_search_candidates)?;
        let timezone_offset_hours = Self::parse_env_i32("TIMEZONE_OFFSET_HOURS", local_offset_hours())?;

        for (var, value) in [
            ("RECONCILER_WORKERS", reconciler_workers),
            ("RECONCILER_BATCH_SIZE", reconciler_batch_size),
            ("RECONCILER_QUEUE_CAPACITY", reconciler_queue_capacity),
            ("DEFAULT_PAGE_SIZE", default_page_size),
            ("MAX_PAGE_SIZE", max_page_size),
            ("MAX_SEARCH_CANDIDATES", max_search_candidates),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    var: var.to_string(),
                    reason: "Must be greater than 0".to_string(),
                });
            }
        }

        if default_page_size > max_page_size {
            return Err(ConfigError::InvalidValue {
                var: "DEFAULT_PAGE_SIZE".to_string(),
                reason: format!("Cannot exceed MAX_PAGE_SIZE ({})", max_page_size),
            });
        }

        if !(-12..=12).contains(&timezone_offset_hours) {
            return Err(ConfigError::InvalidValue {
                var: "TIMEZONE_OFFSET_HOURS".to_string(),
                reason: "Must be between -12 and 12".to_string(),
            });
        }

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "error".to_string());

        Ok(Config {
            search_engine_url,
            search_engine_api_key,
            request_timeout,
            reconciler_workers,
            reconciler_batch_size,
            reconciler_interval_ms,
            reconciler_queue_capacity,
            default_page_size,
            max_page_size,
            max_search_candidates,
            timezone_offset_hours,
            log_level,
        })
    }

    /// Read a variable, treating empty or whitespace-only values as unset.
    fn optional_var(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Parse an environment variable as u64 with a default value.
    fn parse_env_u64(var_name: &str, default: u64) -> ConfigResult<u64> {
        match env::var(var_name) {
            Ok(val) => val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as usize with a default value.
    fn parse_env_usize(var_name: &str, default: usize) -> ConfigResult<usize> {
        match env::var(var_name) {
            Ok(val) => val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    fn parse_env_i32(var_name: &str, default: i32) -> ConfigResult<i32> {
        match env::var(var_name) {
            Ok(val) => val.parse::<i32>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a whole number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }
}

/// Host UTC offset in whole hours, clamped to [-12, 12].
fn local_offset_hours() -> i32 {
    let seconds = Local::now().offset().fix().local_minus_utc();
    (seconds / 3600).clamp(-12, 12)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            search_engine_url: None,
            search_engine_api_key: None,
            request_timeout: 10,
            reconciler_workers: 4,
            reconciler_batch_size: 500,
            reconciler_interval_ms: 2000,
            reconciler_queue_capacity: 1024,
            default_page_size: 20,
            max_page_size: 100,
            max_search_candidates: 10_000,
            timezone_offset_hours: 0,
            log_level: "error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ALL_VARS: &[&str] = &[
        "SEARCH_ENGINE_URL",
        "SEARCH_ENGINE_API_KEY",
        "REQUEST_TIMEOUT",
        "RECONCILER_WORKERS",
        "RECONCILER_BATCH_SIZE",
        "RECONCILER_INTERVAL_MS",
        "RECONCILER_QUEUE_CAPACITY",
        "DEFAULT_PAGE_SIZE",
        "MAX_PAGE_SIZE",
        "MAX_SEARCH_CANDIDATES",
        "TIMEZONE_OFFSET_HOURS",
    ];

    // Helper to set and unset env vars for testing
    struct EnvGuard {
        vars: Vec<String>,
    }

    impl EnvGuard {
        /// Start from a clean slate, even if a local .env set something.
        fn new() -> Self {
            let _ = dotenvy::dotenv();
            for var in ALL_VARS {
                env::remove_var(var);
            }
            EnvGuard { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            env::set_var(key, value);
            self.vars.push(key.to_string());
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for var in &self.vars {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.search_engine_url.is_none());
        assert_eq!(config.request_timeout, 10);
        assert_eq!(config.reconciler_workers, 4);
        assert_eq!(config.reconciler_batch_size, 500);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        let _guard = EnvGuard::new();

        let config = Config::from_env().unwrap();
        assert!(config.search_engine_url.is_none());
        assert_eq!(config.reconciler_interval_ms, 2000);
        assert_eq!(config.reconciler_queue_capacity, 1024);
        assert_eq!(config.max_search_candidates, 10_000);
        assert!((-12..=12).contains(&config.timezone_offset_hours));
    }

    #[test]
    #[serial]
    fn test_config_from_env_valid() {
        let mut guard = EnvGuard::new();
        guard.set("SEARCH_ENGINE_URL", "http://localhost:9200");
        guard.set("SEARCH_ENGINE_API_KEY", "secret");
        guard.set("RECONCILER_WORKERS", "8");
        guard.set("MAX_PAGE_SIZE", "50");
        guard.set("TIMEZONE_OFFSET_HOURS", "-5");

        let config = Config::from_env().unwrap();
        assert_eq!(
            config.search_engine_url.as_deref(),
            Some("http://localhost:9200")
        );
        assert_eq!(config.search_engine_api_key.as_deref(), Some("secret"));
        assert_eq!(config.reconciler_workers, 8);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.timezone_offset_hours, -5);
    }

    #[test]
    #[serial]
    fn test_config_from_env_invalid_url() {
        let mut guard = EnvGuard::new();
        guard.set("SEARCH_ENGINE_URL", "localhost:9200");

        match Config::from_env() {
            Err(ConfigError::InvalidValue { var, .. }) => assert_eq!(var, "SEARCH_ENGINE_URL"),
            other => panic!("Expected InvalidValue error, got: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_config_blank_url_means_in_memory() {
        let mut guard = EnvGuard::new();
        guard.set("SEARCH_ENGINE_URL", "   ");

        let config = Config::from_env().unwrap();
        assert!(config.search_engine_url.is_none());
    }

    #[test]
    #[serial]
    fn test_config_timezone_out_of_range() {
        let mut guard = EnvGuard::new();
        guard.set("TIMEZONE_OFFSET_HOURS", "13");

        match Config::from_env() {
            Err(ConfigError::InvalidValue { var, .. }) => {
                assert_eq!(var, "TIMEZONE_OFFSET_HOURS")
            }
            other => panic!("Expected InvalidValue error, got: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_config_zero_workers_rejected() {
        let mut guard = EnvGuard::new();
        guard.set("RECONCILER_WORKERS", "0");

        match Config::from_env() {
            Err(ConfigError::InvalidValue { var, .. }) => assert_eq!(var, "RECONCILER_WORKERS"),
            other => panic!("Expected InvalidValue error, got: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_config_default_page_size_bounded() {
        let mut guard = EnvGuard::new();
        guard.set("DEFAULT_PAGE_SIZE", "200");

        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_parse_env_u64() {
        let mut guard = EnvGuard::new();
        guard.set("TEST_U64", "42");

        assert_eq!(Config::parse_env_u64("TEST_U64", 10).unwrap(), 42);
        assert_eq!(Config::parse_env_u64("NONEXISTENT", 10).unwrap(), 10);
    }

    #[test]
    #[serial]
    fn test_parse_env_invalid() {
        let mut guard = EnvGuard::new();
        guard.set("TEST_U64_INVALID", "not-a-number");
        guard.set("TEST_I32_INVALID", "1.5");

        assert!(Config::parse_env_u64("TEST_U64_INVALID", 10).is_err());
        assert!(Config::parse_env_i32("TEST_I32_INVALID", 0).is_err());
    }
}
